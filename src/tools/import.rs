//! Import a report produced elsewhere
//!
//! `REPORT_FILE` (relative to the scan path) holds either a JSON list of raw
//! vulnerabilities or an object with `vulnerabilities`, `warnings`,
//! `fatal_errors`, `bom` and `sboms`. Findings go through the same triage as
//! live tool output, which makes this the tool for offline re-triage.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::path::PathBuf;

use super::{ToolAdapter, ToolContext, ToolOutput};
use crate::error::ToolError;
use crate::models::{RawFinding, ToolType};

pub struct ImportTool;

impl ImportTool {
    fn report_path(ctx: &ToolContext) -> Result<PathBuf, ToolError> {
        let file = ctx.option_str("REPORT_FILE").ok_or_else(|| ToolError::Failed {
            tool: "import".to_string(),
            message: "REPORT_FILE is not set".to_string(),
        })?;
        Ok(ctx.scan_path.join(file))
    }

    fn strings(value: Option<&JsonValue>) -> Vec<String> {
        match value {
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|item| match item {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(JsonValue::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

impl ToolAdapter for ImportTool {
    fn name(&self) -> &'static str {
        "import"
    }

    fn tool_type(&self) -> ToolType {
        ToolType::Misc
    }

    fn short_description(&self) -> &'static str {
        "Triage a JSON report from REPORT_FILE"
    }

    fn check_installed(&self) -> Option<String> {
        Some(env!("CARGO_PKG_VERSION").to_string())
    }

    fn run_scan(&self, ctx: &ToolContext) -> Result<String> {
        let path = Self::report_path(ctx)?;
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read report {}", path.display()))
    }

    fn parse_report(&self, report: &str, _ctx: &ToolContext) -> Result<ToolOutput> {
        let json: JsonValue =
            serde_json::from_str(report).context("imported report is not valid JSON")?;

        let output = match json {
            JsonValue::Array(items) => ToolOutput {
                findings: items.into_iter().map(RawFinding::Mapping).collect(),
                ..Default::default()
            },
            JsonValue::Object(mut obj) => {
                let findings = match obj.remove("vulnerabilities") {
                    Some(JsonValue::Array(items)) => {
                        items.into_iter().map(RawFinding::Mapping).collect()
                    }
                    _ => Vec::new(),
                };
                let sboms: IndexMap<String, JsonValue> = match obj.remove("sboms") {
                    Some(JsonValue::Object(map)) => map.into_iter().collect(),
                    _ => IndexMap::new(),
                };
                ToolOutput {
                    findings,
                    warnings: Self::strings(obj.get("warnings")),
                    fatal_errors: Self::strings(obj.get("fatal_errors")),
                    bom: obj.remove("bom").filter(|b| !b.is_null()),
                    sboms,
                }
            }
            other => anyhow::bail!(
                "imported report must be a list or an object, got {}",
                json_kind(&other)
            ),
        };
        Ok(output)
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigMap, ConfigValue};
    use crate::files::FileIndex;
    use std::sync::Arc;

    fn context(root: &std::path::Path, report_file: Option<&str>) -> ToolContext {
        let mut config = ConfigMap::new();
        if let Some(file) = report_file {
            config.insert("REPORT_FILE".into(), ConfigValue::from(file));
        }
        ToolContext::new(root, config, Arc::new(FileIndex::default()))
    }

    #[test]
    fn test_list_report() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("findings.json"),
            r#"[{"name": "CVE-1", "severity": "high"}, "odd record"]"#,
        )
        .unwrap();
        let ctx = context(dir.path(), Some("findings.json"));

        let report = ImportTool.run_scan(&ctx).unwrap();
        let output = ImportTool.parse_report(&report, &ctx).unwrap();
        assert_eq!(output.findings.len(), 2);
        assert!(output.bom.is_none());
    }

    #[test]
    fn test_object_report() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Some("r.json"));
        let report = r#"{
            "vulnerabilities": [{"name": "a"}],
            "warnings": ["partial results"],
            "fatal_errors": [],
            "bom": {"bomFormat": "CycloneDX"},
            "sboms": {"api": {"bomFormat": "CycloneDX"}, "web": {}}
        }"#;
        let output = ImportTool.parse_report(report, &ctx).unwrap();
        assert_eq!(output.findings.len(), 1);
        assert_eq!(output.warnings, vec!["partial results"]);
        assert!(output.fatal_errors.is_empty());
        assert_eq!(output.bom.unwrap()["bomFormat"], "CycloneDX");
        let projects: Vec<&str> = output.sboms.keys().map(String::as_str).collect();
        assert_eq!(projects, vec!["api", "web"]);
    }

    #[test]
    fn test_bad_reports() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Some("missing.json"));
        let err = ImportTool.run_scan(&ctx).unwrap_err();
        assert!(err.to_string().contains("missing.json"));

        let unset = context(dir.path(), None);
        let err = ImportTool.run_scan(&unset).unwrap_err();
        assert!(err.to_string().contains("REPORT_FILE"));

        assert!(ImportTool.parse_report("42", &ctx).is_err());
        assert!(ImportTool.parse_report("{", &ctx).is_err());
    }
}
