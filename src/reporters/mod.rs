//! Reporters for scan results
//!
//! Built-in reporters:
//! - `console` - Terminal summary with colors
//! - `json` - Machine-readable JSON with per-tool summaries
//! - `sarif` - SARIF 2.1.0 for GitHub Code Scanning / VS Code
//!
//! Each reporter renders to a string. [`emit`] sends it to the reporter's
//! `REPORT_FILE` when configured, stdout otherwise.

mod console;
mod json;
mod sarif;

pub use self::console::ConsoleReporter;
pub use self::json::JsonReporter;
pub use self::sarif::SarifReporter;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{ConfigMap, ConfigValue};
use crate::error::ToolError;
use crate::models::ScanResult;

/// A sink for scan results
pub trait ReporterAdapter: Send + Sync {
    /// Name used in `scan.reporters` and as the plugin config section
    fn name(&self) -> &'static str;

    fn short_description(&self) -> &'static str;

    /// Render all results using the reporter's resolved plugin config
    fn run_report(&self, results: &[ScanResult], config: &ConfigMap) -> Result<String>;
}

pub type ReporterFactory = fn() -> Box<dyn ReporterAdapter>;

/// Reporter name to constructor
#[derive(Clone, Default)]
pub struct ReporterRegistry {
    factories: IndexMap<String, ReporterFactory>,
}

impl ReporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled reporters
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("console", || Box::new(ConsoleReporter));
        registry.register("json", || Box::new(JsonReporter));
        registry.register("sarif", || Box::new(SarifReporter));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: ReporterFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn ReporterAdapter>, ToolError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| ToolError::UnknownReporter(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ReporterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Where a reporter's output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportTarget {
    Stdout,
    File(PathBuf),
}

impl ReportTarget {
    /// `REPORT_FILE` from the reporter config, relative paths resolved against `base`
    pub fn from_config(config: &ConfigMap, base: &Path) -> Self {
        match config.get("REPORT_FILE").and_then(ConfigValue::as_str) {
            Some(file) if !file.trim().is_empty() => ReportTarget::File(base.join(file)),
            _ => ReportTarget::Stdout,
        }
    }
}

/// Write rendered output to its target
pub fn emit(output: &str, target: &ReportTarget) -> Result<()> {
    match target {
        ReportTarget::Stdout => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(output.as_bytes())?;
            if !output.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            stdout.flush()?;
        }
        ReportTarget::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{RunDetails, Severity, ToolType, Vulnerability};

    /// Two tool results: bandit with an ignored finding, semgrep that failed
    pub(crate) fn test_results() -> Vec<ScanResult> {
        let mut bandit = ScanResult::new(RunDetails::new("bandit", ToolType::Sast));
        bandit.run_details.duration_sec = 1.25;
        bandit.vulnerabilities = vec![
            Vulnerability::new("B602: subprocess_popen_with_shell_equals_true", Severity::High)
                .with_overview("subprocess call with shell=True identified")
                .with_identifier("bandit-code", "B602")
                .with_identifier("CWE", "CWE-78")
                .with_file_location("app/run.py", Some(7)),
            Vulnerability {
                is_ignored: true,
                ..Vulnerability::new("B101: assert_used", Severity::Low)
                    .with_identifier("bandit-code", "B101")
                    .with_file_location("app/check.py", Some(3))
            },
        ];
        bandit.warnings.push("broken.py: syntax error".into());

        let semgrep = ScanResult::failed(
            RunDetails::new("semgrep", ToolType::Sast),
            "semgrep is not installed. pip install semgrep",
        );
        vec![bandit, semgrep]
    }

    #[test]
    fn test_builtin_registry() {
        let registry = ReporterRegistry::builtin();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["console", "json", "sarif"]);
        assert_eq!(registry.create("sarif").unwrap().name(), "sarif");
        assert!(matches!(
            registry.create("pdf"),
            Err(ToolError::UnknownReporter(_))
        ));
    }

    #[test]
    fn test_report_target() {
        let base = Path::new("/work");
        let mut config = ConfigMap::new();
        assert_eq!(ReportTarget::from_config(&config, base), ReportTarget::Stdout);

        config.insert("REPORT_FILE".into(), ConfigValue::from(""));
        assert_eq!(ReportTarget::from_config(&config, base), ReportTarget::Stdout);

        config.insert("REPORT_FILE".into(), ConfigValue::from("out/scan.sarif"));
        assert_eq!(
            ReportTarget::from_config(&config, base),
            ReportTarget::File(PathBuf::from("/work/out/scan.sarif"))
        );
    }

    #[test]
    fn test_emit_to_file_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/out.json");
        emit("[]", &ReportTarget::File(path.clone())).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "[]");
    }
}
