//! Layered configuration store
//!
//! Loads config fragments (global file, local file, explicit files, in-memory
//! overrides) and deep-merges them in order. Later fragments win at the leaf
//! level.
//!
//! # Configuration Format
//!
//! ```toml
//! # .scanhub.toml
//!
//! [scan]
//! tools = ["semgrep", "bandit:quick"]
//! languages = ["python"]
//! reporters = ["console", "sarif"]
//!
//! [scan.ci.bandit]
//! IGNORE_BELOW_SEVERITY = "medium"
//!
//! [bandit]
//! DEFAULT_SEVERITY = "low"
//! EXCLUDE = ["tests/"]
//!
//! [bandit.quick]
//! TIMEOUT = 60
//!
//! [python]
//! tools = ["bandit"]
//! ```
//!
//! # Plugin lookup
//!
//! [`ConfigStore::get_plugin_config`] cascades, each step merged over the
//! previous one:
//!
//! 1. `config[plugin]`
//! 2. `config[plugin][run_type]`, then `config["<plugin>_<run_type>"]`
//! 3. the same three lookups inside `config.scan[scan_type]`
//! 4. the same three lookups inside `config[language]`

use std::path::{Path, PathBuf};
use tracing::debug;

use super::paths;
use super::tree::{deep_merge, parse_fragment, ConfigMap, ConfigValue, FragmentFormat};
use crate::error::ConfigError;

/// One input to [`ConfigStore::load`]
#[derive(Debug, Clone)]
pub enum ConfigFragment {
    /// In-memory fragment (CLI overrides, tests)
    Map(ConfigMap),
    /// File on disk; format picked by extension
    File(PathBuf),
}

impl From<ConfigMap> for ConfigFragment {
    fn from(map: ConfigMap) -> Self {
        ConfigFragment::Map(map)
    }
}

impl From<PathBuf> for ConfigFragment {
    fn from(path: PathBuf) -> Self {
        ConfigFragment::File(path)
    }
}

/// A plugin identifier split into its plugin name and optional run type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginId {
    pub plugin: String,
    pub run_type: Option<String>,
}

impl PluginId {
    pub fn new(plugin: impl Into<String>, run_type: Option<String>) -> Self {
        Self {
            plugin: plugin.into(),
            run_type: run_type.filter(|r| !r.is_empty()),
        }
    }
}

impl std::fmt::Display for PluginId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.run_type {
            Some(run_type) => write!(f, "{}:{}", self.plugin, run_type),
            None => write!(f, "{}", self.plugin),
        }
    }
}

/// Validated `scan` section
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Tool identifiers, each optionally suffixed with `:run_type`
    pub tools: Vec<String>,
    /// Languages whose `tools` lists run in language scope
    pub languages: Vec<String>,
    /// Reporter identifiers
    pub reporters: Vec<String>,
    /// Exit non-zero when a non-ignored finding is at or above this severity
    pub fail_on_severity: Option<String>,
    /// The merged section as loaded
    pub raw: ConfigMap,
}

/// Merged configuration tree
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    tree: ConfigMap,
    sources: Vec<PathBuf>,
    warnings: Vec<String>,
    /// Registered tool and reporter names, used to split `plugin_run`
    plugins: Vec<String>,
}

impl ConfigStore {
    /// Merge the given fragments left to right.
    ///
    /// Missing files are empty fragments. Unreadable or malformed files are
    /// skipped with a warning and loading carries on.
    pub fn load<I, F>(fragments: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<ConfigFragment>,
    {
        let mut store = Self::default();
        for fragment in fragments {
            store.merge_fragment(fragment.into());
        }
        store
    }

    /// Store built from one in-memory tree
    pub fn from_map(map: ConfigMap) -> Self {
        Self::load([ConfigFragment::Map(map)])
    }

    /// Global file, then local file, then each explicit file, then overrides
    pub fn load_default(explicit_files: &[PathBuf], overrides: Vec<ConfigMap>) -> Self {
        let mut fragments: Vec<ConfigFragment> = Vec::new();
        if let Some(global) = paths::global_config_path() {
            fragments.push(ConfigFragment::File(global));
        }
        if let Some(local) = paths::local_config_path() {
            fragments.push(ConfigFragment::File(local));
        }
        fragments.extend(explicit_files.iter().cloned().map(ConfigFragment::File));
        fragments.extend(overrides.into_iter().map(ConfigFragment::Map));
        Self::load(fragments)
    }

    /// Merge one more fragment on top of the current tree
    pub fn merge_fragment(&mut self, fragment: ConfigFragment) {
        match fragment {
            ConfigFragment::Map(map) => {
                let expanded = super::tree::expand_dotted_keys(map);
                deep_merge(&mut self.tree, &expanded);
            }
            ConfigFragment::File(path) => match load_file(&path) {
                Ok(Some(map)) => {
                    debug!("Loaded config from {}", path.display());
                    deep_merge(&mut self.tree, &map);
                    self.sources.push(path);
                }
                Ok(None) => {
                    debug!("No config at {}, skipping", path.display());
                }
                Err(e) => {
                    debug!("Skipping config fragment: {}", e);
                    self.warnings.push(e.to_string());
                }
            },
        }
    }

    /// The merged tree
    pub fn tree(&self) -> &ConfigMap {
        &self.tree
    }

    /// Files that were loaded successfully, in merge order
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Warnings for fragments that were skipped
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Resolve and validate the `scan` section.
    ///
    /// `scan.<scan_type>` is merged over `scan` when a scan type is given.
    /// Fails when neither `scan.tools` nor `scan.languages` exists, or when
    /// `scan.reporters` is absent.
    pub fn get_scan_config(&self, scan_type: Option<&str>) -> Result<ScanConfig, ConfigError> {
        let scan = self
            .tree
            .get("scan")
            .and_then(ConfigValue::as_map)
            .ok_or_else(|| ConfigError::missing_key("scan.tools"))?;

        let mut merged = scan.clone();
        if let Some(profile) = scan_type.and_then(|st| scan.get(st)).and_then(ConfigValue::as_map) {
            deep_merge(&mut merged, profile);
        }

        if !merged.contains_key("tools") && !merged.contains_key("languages") {
            return Err(ConfigError::missing_key("scan.tools"));
        }
        if !merged.contains_key("reporters") {
            return Err(ConfigError::missing_key("scan.reporters"));
        }

        let list = |key: &str| merged.get(key).map(ConfigValue::as_string_list).unwrap_or_default();
        Ok(ScanConfig {
            tools: list("tools"),
            languages: list("languages"),
            reporters: list("reporters"),
            fail_on_severity: merged
                .get("FAIL_ON_SEVERITY")
                .and_then(ConfigValue::as_str)
                .map(str::to_string),
            raw: merged,
        })
    }

    /// Tools configured for a language (`config[language].tools`)
    pub fn language_tools(&self, language: &str) -> Vec<String> {
        self.tree
            .get(language)
            .and_then(ConfigValue::as_map)
            .and_then(|m| m.get("tools"))
            .map(ConfigValue::as_string_list)
            .unwrap_or_default()
    }

    /// Make `names` known as plugins even when no config section exists
    pub fn register_plugins<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.plugins.contains(&name) {
                self.plugins.push(name);
            }
        }
    }

    /// Whether `name` is a registered plugin or has a section in any scope:
    /// top level, a language section or a scan profile
    fn is_known_plugin(&self, name: &str) -> bool {
        if self.plugins.iter().any(|p| p == name) {
            return true;
        }
        if self.tree.get(name).is_some_and(ConfigValue::is_map) {
            return true;
        }
        let has_section = |scope: &ConfigMap| scope.get(name).is_some_and(ConfigValue::is_map);
        self.tree.iter().filter_map(|(key, value)| value.as_map().map(|m| (key, m))).any(
            |(key, scope)| {
                if key == "scan" {
                    scope.values().filter_map(ConfigValue::as_map).any(has_section)
                } else {
                    has_section(scope)
                }
            },
        )
    }

    /// Split an identifier into plugin name and run type.
    ///
    /// `plugin:run` splits at the colon. `plugin_run` splits at the longest
    /// prefix that is a known plugin, unless the whole identifier is one. An
    /// explicit `run_type` wins over both.
    pub fn parse_plugin_id(&self, identifier: &str, run_type: Option<&str>) -> PluginId {
        if let Some((plugin, suffix)) = identifier.split_once(':') {
            let run = run_type.unwrap_or(suffix);
            return PluginId::new(plugin, Some(run.to_string()));
        }
        if let Some(run) = run_type {
            return PluginId::new(identifier, Some(run.to_string()));
        }
        if self.plugins.iter().any(|p| p == identifier) {
            return PluginId::new(identifier, None);
        }

        for (idx, _) in identifier.rmatch_indices('_') {
            let prefix = &identifier[..idx];
            let suffix = &identifier[idx + 1..];
            if prefix.is_empty() || suffix.is_empty() {
                continue;
            }
            if self.is_known_plugin(prefix) {
                return PluginId::new(prefix, Some(suffix.to_string()));
            }
        }
        PluginId::new(identifier, None)
    }

    /// Resolve a plugin's config by cascading through run type, scan type and
    /// language scopes.
    pub fn get_plugin_config(
        &self,
        identifier: &str,
        scan_type: Option<&str>,
        run_type: Option<&str>,
        language: Option<&str>,
    ) -> ConfigMap {
        let id = self.parse_plugin_id(identifier, run_type);
        let mut resolved = ConfigMap::new();

        extend_from_scope(&mut resolved, &self.tree, &id);

        if let Some(scope) = scan_type.and_then(|st| self.scan_profile(st)) {
            extend_from_scope(&mut resolved, scope, &id);
        }

        if let Some(scope) = language
            .and_then(|lang| self.tree.get(lang))
            .and_then(ConfigValue::as_map)
        {
            extend_from_scope(&mut resolved, scope, &id);
        }

        resolved
    }

    fn scan_profile(&self, scan_type: &str) -> Option<&ConfigMap> {
        self.tree
            .get("scan")
            .and_then(ConfigValue::as_map)
            .and_then(|scan| scan.get(scan_type))
            .and_then(ConfigValue::as_map)
    }
}

/// Apply base, nested run-type and flat run-type sections from one scope.
/// Flat (`plugin_run`) is applied last so it wins over nested (`plugin.run`).
fn extend_from_scope(resolved: &mut ConfigMap, scope: &ConfigMap, id: &PluginId) {
    let base = scope.get(&id.plugin).and_then(ConfigValue::as_map);
    if let Some(base) = base {
        deep_merge(resolved, base);
    }

    let Some(run_type) = &id.run_type else {
        return;
    };

    if let Some(nested) = base.and_then(|b| b.get(run_type)).and_then(ConfigValue::as_map) {
        deep_merge(resolved, nested);
    }

    let flat_key = format!("{}_{}", id.plugin, run_type);
    if let Some(flat) = scope.get(&flat_key).and_then(ConfigValue::as_map) {
        deep_merge(resolved, flat);
    }
}

/// Read and parse one config file. `Ok(None)` when the file does not exist.
fn load_file(path: &Path) -> Result<Option<ConfigMap>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_fragment(&content, FragmentFormat::from_path(path))
        .map(Some)
        .map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
}

/// Example local config written by `scanhub init`
pub const EXAMPLE_LOCAL_CONFIG: &str = r#"# scanhub local configuration

[scan]
# Tools to run; append ":run_type" to pick a variant, e.g. "bandit:quick"
tools = ["semgrep"]
# Languages whose [<language>].tools lists should run
languages = ["python"]
# Report outputs
reporters = ["console"]
# Exit with code 1 when a non-ignored finding is at or above this severity
# FAIL_ON_SEVERITY = "high"

# Per scan type overrides, selected with --scan-type ci
[scan.ci]
reporters = ["console", "sarif"]

[python]
tools = ["bandit"]

[bandit]
# DEFAULT_SEVERITY = "medium"
# IGNORED_VULNERABILITIES = ["B101"]
# EXCLUDE = ["tests/"]
# IGNORE_BELOW_SEVERITY = "low"

[semgrep]
# CONFIGS = ["p/ci"]
# TIMEOUT = 300

[sarif]
REPORT_FILE = "scanhub.sarif"
"#;

/// Write [`EXAMPLE_LOCAL_CONFIG`] into `dir` unless a local config exists.
/// Returns the path and whether it was created.
pub fn write_example_config(dir: &Path) -> anyhow::Result<(PathBuf, bool)> {
    let path = paths::local_config_path_in(dir);
    if path.exists() {
        return Ok((path, false));
    }
    std::fs::write(&path, EXAMPLE_LOCAL_CONFIG)?;
    Ok((path, true))
}

#[cfg(test)]
mod tests;
