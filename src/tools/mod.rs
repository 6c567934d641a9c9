//! Scanner adapters
//!
//! Every tool implements [`ToolAdapter`]. The orchestrator resolves the tool's
//! plugin config, builds a [`ToolContext`] and calls:
//!
//! 1. `check_installed` - skip with a fatal error when missing
//! 2. `run_scan` - produce the raw report text
//! 3. `parse_report` - turn the report into [`ToolOutput`]
//!
//! Raw findings are handed to triage untouched, so adapters never apply
//! ignore or exclude rules themselves.

mod bandit;
pub mod external;
mod import;
mod semgrep;

pub use bandit::BanditTool;
pub use import::ImportTool;
pub use semgrep::SemgrepTool;

use anyhow::Result;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{ConfigMap, ConfigValue};
use crate::error::ToolError;
use crate::files::FileIndex;
use crate::models::{RawFinding, ToolType};

/// Timeout for external scanners when `TIMEOUT` is not configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Everything a tool needs for one run
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub scan_path: PathBuf,
    /// Resolved plugin config for this tool, run type and language
    pub config: ConfigMap,
    pub run_type: Option<String>,
    pub scan_type: Option<String>,
    pub language: Option<String>,
    pub files: Arc<FileIndex>,
}

impl ToolContext {
    pub fn new(scan_path: impl Into<PathBuf>, config: ConfigMap, files: Arc<FileIndex>) -> Self {
        Self {
            scan_path: scan_path.into(),
            config,
            run_type: None,
            scan_type: None,
            language: None,
            files,
        }
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(ConfigValue::as_str)
    }

    pub fn option_list(&self, key: &str) -> Vec<String> {
        self.config
            .get(key)
            .map(ConfigValue::as_string_list)
            .unwrap_or_default()
    }

    pub fn option_bool(&self, key: &str) -> bool {
        self.config
            .get(key)
            .and_then(ConfigValue::as_bool)
            .unwrap_or(false)
    }

    /// `TIMEOUT` in seconds, 0 disables it
    pub fn timeout_secs(&self) -> u64 {
        self.config
            .get("TIMEOUT")
            .and_then(ConfigValue::as_i64)
            .and_then(|t| u64::try_from(t).ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
    }
}

/// What a tool produced before triage
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub findings: Vec<RawFinding>,
    pub warnings: Vec<String>,
    pub fatal_errors: Vec<String>,
    pub bom: Option<JsonValue>,
    pub sboms: IndexMap<String, JsonValue>,
}

/// A security scanner the orchestrator can run
pub trait ToolAdapter: Send + Sync {
    /// Name used in `scan.tools` and as the plugin config section
    fn name(&self) -> &'static str;

    fn tool_type(&self) -> ToolType;

    fn short_description(&self) -> &'static str;

    /// How to install the tool, shown when it is missing
    fn install_help(&self) -> &'static str {
        ""
    }

    /// Installed version, `None` when the tool is unavailable
    fn check_installed(&self) -> Option<String>;

    /// Run the tool and return its raw report
    fn run_scan(&self, ctx: &ToolContext) -> Result<String>;

    /// Parse a raw report into findings and side outputs
    fn parse_report(&self, report: &str, ctx: &ToolContext) -> Result<ToolOutput>;
}

/// Constructor for a registered tool
pub type ToolFactory = fn() -> Box<dyn ToolAdapter>;

/// Tool name to constructor
#[derive(Clone, Default)]
pub struct ToolRegistry {
    factories: IndexMap<String, ToolFactory>,
}

impl ToolRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled tools
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("bandit", || Box::new(BanditTool));
        registry.register("semgrep", || Box::new(SemgrepTool));
        registry.register("import", || Box::new(ImportTool));
        registry
    }

    /// Register or replace a tool
    pub fn register(&mut self, name: impl Into<String>, factory: ToolFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn ToolAdapter>, ToolError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Registered names, in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_fragment, FragmentFormat};

    fn context(toml: &str) -> ToolContext {
        let config = parse_fragment(toml, FragmentFormat::Toml).unwrap();
        ToolContext::new("/repo", config, Arc::new(FileIndex::default()))
    }

    #[test]
    fn test_builtin_registry() {
        let registry = ToolRegistry::builtin();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["bandit", "semgrep", "import"]);
        assert_eq!(registry.create("bandit").unwrap().name(), "bandit");
        assert!(matches!(
            registry.create("nope"),
            Err(ToolError::UnknownTool(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register("scanner", || Box::new(ImportTool));
        registry.register("scanner", || Box::new(BanditTool));
        assert_eq!(registry.names().count(), 1);
        assert_eq!(registry.create("scanner").unwrap().name(), "bandit");
    }

    #[test]
    fn test_context_options() {
        let ctx = context("TIMEOUT = 12\nCONFIGS = 'p/ci'\nVERBOSE = true");
        assert_eq!(ctx.timeout_secs(), 12);
        assert_eq!(ctx.option_list("CONFIGS"), vec!["p/ci"]);
        assert_eq!(ctx.option_str("CONFIGS"), Some("p/ci"));
        assert!(ctx.option_bool("VERBOSE"));
        assert!(!ctx.option_bool("MISSING"));
    }

    #[test]
    fn test_context_default_timeout() {
        assert_eq!(context("").timeout_secs(), DEFAULT_TIMEOUT_SECS);
        assert_eq!(context("TIMEOUT = -1").timeout_secs(), DEFAULT_TIMEOUT_SECS);
    }
}
