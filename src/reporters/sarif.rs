//! SARIF 2.1.0 reporter for GitHub Code Scanning and VS Code integration
//!
//! One SARIF run per tool result. Ignored findings are kept and carry an
//! external suppression so viewers can hide them.
//!
//! Reference: https://docs.oasis-open.org/sarif/sarif/v2.1.0/sarif-v2.1.0.html

use anyhow::Result;
use chrono::Duration;
use indexmap::IndexMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::ReporterAdapter;
use crate::config::ConfigMap;
use crate::models::{ScanResult, Severity, Vulnerability};

/// SARIF schema URI
const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";
const SARIF_VERSION: &str = "2.1.0";
const FINGERPRINT_KEY: &str = "scanhub/v1";

fn severity_to_sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low | Severity::None | Severity::Na => "note",
    }
}

/// Map severity to security-severity score (0.0 - 10.0) for GitHub Code Scanning
fn severity_to_security_score(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 9.5,
        Severity::High => 7.5,
        Severity::Medium => 5.0,
        Severity::Low => 2.5,
        Severity::None => 1.0,
        Severity::Na => 0.0,
    }
}

// ============================================================================
// SARIF Data Structures
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifReport {
    #[serde(rename = "$schema")]
    schema: String,
    version: String,
    runs: Vec<SarifRun>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifRun {
    tool: SarifTool,
    results: Vec<SarifResult>,
    invocations: Vec<SarifInvocation>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifDriver {
    name: String,
    version: String,
    rules: Vec<SarifRule>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifRule {
    id: String,
    name: String,
    short_description: SarifMessage,
    default_configuration: SarifConfiguration,
    properties: SarifRuleProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    help_uri: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifConfiguration {
    level: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifRuleProperties {
    tags: Vec<String>,
    #[serde(rename = "security-severity")]
    security_severity: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifResult {
    rule_id: String,
    level: String,
    message: SarifMessage,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    locations: Vec<SarifLocation>,
    partial_fingerprints: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    suppressions: Vec<SarifSuppression>,
    properties: SarifResultProperties,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fixes: Vec<SarifFix>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifLocation {
    physical_location: SarifPhysicalLocation,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifPhysicalLocation {
    artifact_location: SarifArtifactLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<SarifRegion>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifArtifactLocation {
    uri: String,
    uri_base_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifRegion {
    start_line: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifMessage {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifSuppression {
    kind: String,
    justification: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifInvocation {
    execution_successful: bool,
    start_time_utc: String,
    end_time_utc: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_execution_notifications: Vec<SarifNotification>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifNotification {
    level: String,
    message: SarifMessage,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifResultProperties {
    severity: String,
    vulnerability_type: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    identifiers: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifFix {
    description: SarifMessage,
}

// ============================================================================
// Implementation
// ============================================================================

pub struct SarifReporter;

impl ReporterAdapter for SarifReporter {
    fn name(&self) -> &'static str {
        "sarif"
    }

    fn short_description(&self) -> &'static str {
        "SARIF 2.1.0 for code scanning integrations"
    }

    fn run_report(&self, results: &[ScanResult], _config: &ConfigMap) -> Result<String> {
        let sarif = SarifReport {
            schema: SARIF_SCHEMA.to_string(),
            version: SARIF_VERSION.to_string(),
            runs: results.iter().map(build_run).collect(),
        };
        Ok(serde_json::to_string_pretty(&sarif)?)
    }
}

/// Rule id for a finding: its first identifier, or its name
fn rule_id(vuln: &Vulnerability) -> String {
    vuln.identifiers
        .values()
        .next()
        .cloned()
        .unwrap_or_else(|| vuln.name.clone())
}

fn build_run(result: &ScanResult) -> SarifRun {
    let details = &result.run_details;
    let tool_name = details.display_name();

    // One rule per id; the most severe finding decides its level
    let mut representative: IndexMap<String, &Vulnerability> = IndexMap::new();
    for vuln in &result.vulnerabilities {
        let entry = representative.entry(rule_id(vuln)).or_insert(vuln);
        if vuln.severity > entry.severity {
            *entry = vuln;
        }
    }
    let rules = representative
        .iter()
        .map(|(id, vuln)| build_rule(id, vuln))
        .collect();

    let results = result
        .vulnerabilities
        .iter()
        .map(|v| build_result(&tool_name, v))
        .collect();

    let mut notifications: Vec<SarifNotification> = result
        .fatal_errors
        .iter()
        .map(|e| SarifNotification {
            level: "error".to_string(),
            message: SarifMessage { text: e.clone() },
        })
        .collect();
    notifications.extend(result.warnings.iter().map(|w| SarifNotification {
        level: "warning".to_string(),
        message: SarifMessage { text: w.clone() },
    }));

    let duration_ms = (details.duration_sec * 1000.0).round() as i64;
    let end_time = details.start_time + Duration::milliseconds(duration_ms);

    SarifRun {
        tool: SarifTool {
            driver: SarifDriver {
                name: tool_name,
                version: env!("CARGO_PKG_VERSION").to_string(),
                rules,
            },
        },
        results,
        invocations: vec![SarifInvocation {
            execution_successful: !result.has_fatal_errors(),
            start_time_utc: details.start_time.to_rfc3339(),
            end_time_utc: end_time.to_rfc3339(),
            tool_execution_notifications: notifications,
        }],
    }
}

fn score_text(severity: Severity) -> String {
    format!("{:.1}", severity_to_security_score(severity))
}

fn build_rule(id: &str, vuln: &Vulnerability) -> SarifRule {
    let mut tags = vec!["security".to_string(), vuln.vulnerability_type.to_string()];
    tags.extend(
        vuln.identifiers
            .iter()
            .filter(|(scheme, _)| scheme.as_str() == "CWE")
            .map(|(_, cwe)| cwe.clone()),
    );

    SarifRule {
        id: id.to_string(),
        name: vuln.name.clone(),
        short_description: SarifMessage {
            text: if vuln.overview.is_empty() {
                vuln.name.clone()
            } else {
                vuln.overview.clone()
            },
        },
        default_configuration: SarifConfiguration {
            level: severity_to_sarif_level(vuln.severity).to_string(),
        },
        properties: SarifRuleProperties {
            tags,
            security_severity: score_text(vuln.severity),
        },
        help_uri: vuln.references.first().cloned(),
    }
}

/// Stable across runs: depends on the tool, the rule, the location and the name
fn fingerprint(tool_name: &str, vuln: &Vulnerability) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tool_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(rule_id(vuln).as_bytes());
    hasher.update([0u8]);
    if let Some(loc) = &vuln.file_location {
        hasher.update(loc.path.as_bytes());
        hasher.update(loc.line.unwrap_or(0).to_le_bytes());
    }
    hasher.update([0u8]);
    hasher.update(vuln.name.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn build_result(tool_name: &str, vuln: &Vulnerability) -> SarifResult {
    let locations = vuln
        .file_location
        .as_ref()
        .map(|loc| {
            vec![SarifLocation {
                physical_location: SarifPhysicalLocation {
                    artifact_location: SarifArtifactLocation {
                        uri: loc.path.replace('\\', "/"),
                        uri_base_id: "%SRCROOT%".to_string(),
                    },
                    region: loc.line.filter(|&l| l > 0).map(|start_line| SarifRegion { start_line }),
                },
            }]
        })
        .unwrap_or_default();

    let suppressions = if vuln.is_ignored {
        vec![SarifSuppression {
            kind: "external".to_string(),
            justification: "Ignored by scanhub configuration".to_string(),
        }]
    } else {
        Vec::new()
    };

    let fixes = vuln
        .recommendation
        .as_ref()
        .map(|fix| {
            vec![SarifFix {
                description: SarifMessage { text: fix.clone() },
            }]
        })
        .unwrap_or_default();

    let mut partial_fingerprints = BTreeMap::new();
    partial_fingerprints.insert(FINGERPRINT_KEY.to_string(), fingerprint(tool_name, vuln));

    SarifResult {
        rule_id: rule_id(vuln),
        level: severity_to_sarif_level(vuln.severity).to_string(),
        message: SarifMessage {
            text: if vuln.overview.is_empty() {
                vuln.name.clone()
            } else {
                vuln.overview.clone()
            },
        },
        locations,
        partial_fingerprints,
        suppressions,
        properties: SarifResultProperties {
            severity: vuln.severity.to_string(),
            vulnerability_type: vuln.vulnerability_type.to_string(),
            identifiers: vuln.identifiers.clone(),
            confidence: vuln.confidence.clone(),
        },
        fixes,
    }
}
