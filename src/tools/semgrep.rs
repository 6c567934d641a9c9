//! Semgrep adapter for pattern-based SAST across languages

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use tracing::debug;

use super::external::{relative_path, run_external_tool, tool_version};
use super::{ToolAdapter, ToolContext, ToolOutput};
use crate::models::{RawFinding, Severity, ToolType, Vulnerability, VulnerabilityType};
use crate::triage::TriageConfig;

pub struct SemgrepTool;

impl SemgrepTool {
    fn command(ctx: &ToolContext) -> Vec<String> {
        let mut cmd = vec![
            "semgrep".to_string(),
            "scan".to_string(),
            "--json".to_string(),
            "--quiet".to_string(),
            "--metrics=off".to_string(),
        ];

        let mut configs = ctx.option_list("CONFIGS");
        if configs.is_empty() {
            configs.push("auto".to_string());
        }
        for config in configs {
            cmd.push(format!("--config={}", config));
        }

        for pattern in ctx.option_list("EXCLUDE") {
            cmd.push("--exclude".to_string());
            cmd.push(pattern);
        }
        cmd.extend(ctx.option_list("ARGS"));
        cmd.push(ctx.scan_path.to_string_lossy().to_string());
        cmd
    }

    /// Semgrep's ERROR/WARNING/INFO scale, other values go through the
    /// usual severity aliases
    fn map_severity(severity: Option<&str>, default: Severity) -> Severity {
        match severity.map(str::to_uppercase).as_deref() {
            Some("ERROR") => Severity::High,
            Some("WARNING") => Severity::Medium,
            Some("INFO") => Severity::Low,
            other => Severity::coerce(other, default),
        }
    }

    /// Strings from a metadata field that may be a string or a list
    fn metadata_strings(metadata: Option<&JsonValue>, key: &str) -> Vec<String> {
        match metadata.and_then(|m| m.get(key)) {
            Some(JsonValue::String(s)) => vec![s.clone()],
            Some(JsonValue::Array(items)) => items
                .iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn to_vulnerability(result: &JsonValue, ctx: &ToolContext, default: Severity) -> Vulnerability {
        let check_id = result
            .get("check_id")
            .and_then(JsonValue::as_str)
            .unwrap_or("unknown");
        let extra = result.get("extra");
        let extra_str = |key: &str| extra.and_then(|e| e.get(key)).and_then(JsonValue::as_str);
        let metadata = extra.and_then(|e| e.get("metadata"));

        let severity = Self::map_severity(extra_str("severity"), default);
        let vulnerability_type = if check_id.contains("secrets") {
            VulnerabilityType::Secret
        } else {
            VulnerabilityType::Code
        };

        let mut vuln = Vulnerability::new(check_id, severity)
            .with_overview(extra_str("message").unwrap_or_default())
            .with_type(vulnerability_type)
            .with_identifier("semgrep-rule", check_id);

        if let Some(path) = result.get("path").and_then(JsonValue::as_str) {
            let line = result
                .get("start")
                .and_then(|s| s.get("line"))
                .and_then(JsonValue::as_u64)
                .and_then(|l| u32::try_from(l).ok());
            vuln = vuln.with_file_location(relative_path(path, &ctx.scan_path), line);
        }

        // "CWE-89: Improper Neutralization ..." -> "CWE-89"
        for cwe in Self::metadata_strings(metadata, "cwe") {
            let id = cwe.split(':').next().unwrap_or(&cwe).trim().to_string();
            vuln.add_identifier("CWE", id);
        }
        for owasp in Self::metadata_strings(metadata, "owasp") {
            vuln.add_identifier("OWASP", owasp);
        }
        for url in Self::metadata_strings(metadata, "references") {
            vuln = vuln.with_reference(url);
        }
        if let Some(source) = metadata.and_then(|m| m.get("source")).and_then(JsonValue::as_str) {
            vuln = vuln.with_reference(source);
        }

        if let Some(fix) = extra_str("fix").or_else(|| {
            metadata
                .and_then(|m| m.get("fix"))
                .and_then(JsonValue::as_str)
        }) {
            vuln = vuln.with_recommendation(fix);
        }

        vuln.confidence = metadata
            .and_then(|m| m.get("confidence"))
            .and_then(JsonValue::as_str)
            .map(str::to_lowercase);
        if let Some(language) = &ctx.language {
            vuln = vuln.with_language(language.as_str());
        }
        vuln
    }
}

impl ToolAdapter for SemgrepTool {
    fn name(&self) -> &'static str {
        "semgrep"
    }

    fn tool_type(&self) -> ToolType {
        ToolType::Sast
    }

    fn short_description(&self) -> &'static str {
        "Multi-language static analysis with community rules (SAST)"
    }

    fn install_help(&self) -> &'static str {
        "pip install semgrep"
    }

    fn check_installed(&self) -> Option<String> {
        tool_version("semgrep")
    }

    fn run_scan(&self, ctx: &ToolContext) -> Result<String> {
        let timeout = ctx.timeout_secs();
        let result = run_external_tool(&Self::command(ctx), "semgrep", timeout, Some(&ctx.scan_path));
        Ok(result.into_report("semgrep", timeout)?)
    }

    fn parse_report(&self, report: &str, ctx: &ToolContext) -> Result<ToolOutput> {
        let json: JsonValue =
            serde_json::from_str(report).context("semgrep report is not valid JSON")?;
        let default = TriageConfig::from_plugin_config(&ctx.config).default_severity;

        let findings: Vec<RawFinding> = json
            .get("results")
            .and_then(JsonValue::as_array)
            .map(|results| {
                results
                    .iter()
                    .map(|r| RawFinding::Parsed(Self::to_vulnerability(r, ctx, default)))
                    .collect()
            })
            .unwrap_or_default();

        let warnings: Vec<String> = json
            .get("errors")
            .and_then(JsonValue::as_array)
            .map(|errors| {
                errors
                    .iter()
                    .map(|e| {
                        e.get("message")
                            .or_else(|| e.get("type"))
                            .and_then(JsonValue::as_str)
                            .unwrap_or("semgrep error")
                            .to_string()
                    })
                    .collect()
            })
            .unwrap_or_default();

        debug!("semgrep reported {} findings", findings.len());
        Ok(ToolOutput {
            findings,
            warnings,
            ..Default::default()
        })
    }
}
