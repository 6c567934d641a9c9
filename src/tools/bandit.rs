//! Bandit adapter for Python SAST
//!
//! Bandit reports issues like:
//! - Shell and SQL injection
//! - Hardcoded passwords
//! - Weak cryptography and insecure deserialisation

use anyhow::{Context, Result};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use super::external::{relative_path, run_external_tool, tool_version};
use super::{ToolAdapter, ToolContext, ToolOutput};
use crate::models::{RawFinding, ToolType};

pub struct BanditTool;

impl BanditTool {
    fn command(ctx: &ToolContext) -> Vec<String> {
        let mut cmd = vec![
            "bandit".to_string(),
            "-r".to_string(),
            "-f".to_string(),
            "json".to_string(),
            "-q".to_string(),
        ];
        if let Some(level) = ctx.option_str("CONFIDENCE_LEVEL") {
            cmd.push("--confidence-level".to_string());
            cmd.push(level.to_lowercase());
        }
        if let Some(config) = ctx.option_str("CONFIG_FILE") {
            cmd.push("-c".to_string());
            cmd.push(config.to_string());
        }
        let excludes = ctx.option_list("EXCLUDE");
        if !excludes.is_empty() {
            cmd.push("-x".to_string());
            cmd.push(excludes.join(","));
        }
        cmd.extend(ctx.option_list("ARGS"));
        cmd.push(ctx.scan_path.to_string_lossy().to_string());
        cmd
    }

    /// CWE for common bandit checks, used when the report carries none
    fn fallback_cwe(test_id: &str) -> Option<&'static str> {
        match test_id {
            "B201" => Some("CWE-94"),
            "B301" | "B302" | "B506" => Some("CWE-502"),
            "B303" | "B304" | "B305" => Some("CWE-327"),
            "B311" => Some("CWE-330"),
            "B501" | "B502" | "B503" => Some("CWE-295"),
            "B601" | "B602" | "B603" | "B604" | "B605" => Some("CWE-78"),
            "B608" => Some("CWE-89"),
            "B105" | "B106" | "B107" => Some("CWE-259"),
            _ => None,
        }
    }

    fn recommendation(test_id: &str) -> Option<&'static str> {
        let text = match test_id {
            "B301" | "B302" => "Avoid pickle and marshal for untrusted data; use JSON",
            "B303" | "B304" => "Use SHA-256 or stronger instead of MD5/SHA1",
            "B311" => "Use the secrets module for security-sensitive randomness",
            "B501" => "Keep TLS certificate verification enabled",
            "B506" => "Use yaml.safe_load() instead of yaml.load()",
            "B602" | "B605" => "Pass argument lists to subprocess without shell=True",
            "B608" => "Use parameterised queries instead of string-built SQL",
            "B105" | "B106" | "B107" => "Load credentials from the environment or a secret store",
            _ => return None,
        };
        Some(text)
    }

    /// Raw vulnerability mapping for one entry of bandit's `results`
    fn to_mapping(result: &JsonValue, ctx: &ToolContext) -> JsonValue {
        let field = |key: &str| result.get(key).and_then(JsonValue::as_str).unwrap_or("");
        let test_id = field("test_id");
        let test_name = field("test_name");

        let path = relative_path(field("filename"), &ctx.scan_path);
        let line = result.get("line_number").and_then(JsonValue::as_u64);

        let cwe = result
            .get("issue_cwe")
            .and_then(|c| c.get("id"))
            .and_then(JsonValue::as_u64)
            .map(|id| format!("CWE-{}", id))
            .or_else(|| Self::fallback_cwe(test_id).map(str::to_string));

        let mut identifiers = serde_json::Map::new();
        identifiers.insert("bandit-code".into(), json!(test_id));
        if let Some(cwe) = cwe {
            identifiers.insert("CWE".into(), json!(cwe));
        }

        let mut references = Vec::new();
        if let Some(url) = result.get("more_info").and_then(JsonValue::as_str) {
            references.push(url.to_string());
        }
        if let Some(url) = result
            .get("issue_cwe")
            .and_then(|c| c.get("link"))
            .and_then(JsonValue::as_str)
        {
            references.push(url.to_string());
        }

        let name = if test_name.is_empty() {
            test_id.to_string()
        } else {
            format!("{}: {}", test_id, test_name)
        };

        json!({
            "name": name,
            "overview": field("issue_text"),
            "recommendation": Self::recommendation(test_id),
            "severity": result.get("issue_severity"),
            "confidence": result.get("issue_confidence"),
            "vulnerability_type": "code",
            "language": "python",
            "identifiers": identifiers,
            "references": references,
            "file_location": {"path": path, "line": line},
            "metadata": {"code": result.get("code")},
        })
    }
}

impl ToolAdapter for BanditTool {
    fn name(&self) -> &'static str {
        "bandit"
    }

    fn tool_type(&self) -> ToolType {
        ToolType::Sast
    }

    fn short_description(&self) -> &'static str {
        "Python security linter (SAST)"
    }

    fn install_help(&self) -> &'static str {
        "pip install bandit"
    }

    fn check_installed(&self) -> Option<String> {
        tool_version("bandit")
    }

    fn run_scan(&self, ctx: &ToolContext) -> Result<String> {
        let timeout = ctx.timeout_secs();
        let result = run_external_tool(&Self::command(ctx), "bandit", timeout, Some(&ctx.scan_path));
        Ok(result.into_report("bandit", timeout)?)
    }

    fn parse_report(&self, report: &str, ctx: &ToolContext) -> Result<ToolOutput> {
        let json: JsonValue =
            serde_json::from_str(report).context("bandit report is not valid JSON")?;

        let findings: Vec<RawFinding> = json
            .get("results")
            .and_then(JsonValue::as_array)
            .map(|results| {
                results
                    .iter()
                    .map(|r| RawFinding::Mapping(Self::to_mapping(r, ctx)))
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
                        let file = e.get("filename").and_then(JsonValue::as_str).unwrap_or("?");
                        let reason = e.get("reason").and_then(JsonValue::as_str).unwrap_or("error");
                        format!("{}: {}", relative_path(file, &ctx.scan_path), reason)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let output = ToolOutput {
            findings,
            warnings,
            ..Default::default()
        };
        debug!("bandit reported {} findings", output.findings.len());
        Ok(output)
    }
}
