//! A single normalised finding

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{Severity, VulnerabilityType};
use crate::triage::TriageConfig;

/// Where a finding was reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl FileLocation {
    pub fn new(path: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }
}

/// A security finding from any tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Vulnerability {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub overview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub vulnerability_type: VulnerabilityType,
    /// Scheme to id, e.g. `CVE` -> `CVE-2021-1234`. First id per scheme wins.
    #[serde(default)]
    pub identifiers: IndexMap<String, String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_location: Option<FileLocation>,
    /// Set by triage
    #[serde(default)]
    pub is_ignored: bool,
    /// Set by triage
    #[serde(default)]
    pub is_excluded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

/// What a tool adapter hands to triage
#[derive(Debug, Clone, PartialEq)]
pub enum RawFinding {
    /// Raw mapping straight from the tool's report
    Mapping(JsonValue),
    /// Already built by the adapter
    Parsed(Vulnerability),
}

impl From<JsonValue> for RawFinding {
    fn from(value: JsonValue) -> Self {
        RawFinding::Mapping(value)
    }
}

impl From<Vulnerability> for RawFinding {
    fn from(vulnerability: Vulnerability) -> Self {
        RawFinding::Parsed(vulnerability)
    }
}

impl Vulnerability {
    pub fn new(name: impl Into<String>, severity: Severity) -> Self {
        Self {
            name: name.into(),
            severity,
            ..Default::default()
        }
    }

    pub fn with_overview(mut self, overview: impl Into<String>) -> Self {
        self.overview = overview.into();
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    pub fn with_type(mut self, vulnerability_type: VulnerabilityType) -> Self {
        self.vulnerability_type = vulnerability_type;
        self
    }

    pub fn with_identifier(mut self, scheme: impl Into<String>, id: impl Into<String>) -> Self {
        self.add_identifier(scheme, id);
        self
    }

    pub fn with_reference(mut self, url: impl Into<String>) -> Self {
        self.references.push(url.into());
        self
    }

    pub fn with_file_location(mut self, path: impl Into<String>, line: Option<u32>) -> Self {
        self.file_location = Some(FileLocation::new(path, line));
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Record an identifier. The first id seen for a scheme is kept.
    pub fn add_identifier(&mut self, scheme: impl Into<String>, id: impl Into<String>) {
        self.identifiers.entry(scheme.into()).or_insert_with(|| id.into());
    }

    /// Build from a raw tool mapping.
    ///
    /// Never fails: wrong-typed fields fall back to defaults and an
    /// unrecognised or missing severity becomes `default_severity`.
    /// `is_excluded` is never taken from input.
    pub fn from_mapping(raw: &JsonValue, default_severity: Severity) -> Self {
        let Some(obj) = raw.as_object() else {
            return Self::new(raw.to_string(), default_severity);
        };

        let text = |key: &str| obj.get(key).and_then(json_text);

        let mut vuln = Vulnerability {
            name: text("name").unwrap_or_else(|| "unknown".to_string()),
            version: text("version"),
            overview: text("overview").unwrap_or_default(),
            recommendation: text("recommendation"),
            severity: Severity::coerce(text("severity").as_deref(), default_severity),
            vulnerability_type: text("vulnerability_type")
                .and_then(|t| t.parse().ok())
                .unwrap_or_default(),
            identifiers: IndexMap::new(),
            references: Vec::new(),
            file_location: obj.get("file_location").and_then(parse_file_location),
            is_ignored: obj
                .get("is_ignored")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false),
            is_excluded: false,
            confidence: text("confidence"),
            language: text("language"),
            metadata: obj.get("metadata").filter(|m| !m.is_null()).cloned(),
        };

        if let Some(identifiers) = obj.get("identifiers") {
            for (scheme, id) in parse_identifiers(identifiers) {
                vuln.add_identifier(scheme, id);
            }
        }

        match obj.get("references") {
            Some(JsonValue::Array(items)) => {
                vuln.references = items.iter().filter_map(json_text).collect();
            }
            Some(JsonValue::String(single)) => vuln.references = vec![single.clone()],
            _ => {}
        }

        vuln
    }

    /// True when `value` equals the name or one of the identifier values
    pub fn matches_name_or_identifier(&self, value: &str) -> bool {
        self.name == value || self.identifiers.values().any(|id| id == value)
    }

    /// Recompute `is_ignored` from a scope's ignore settings.
    ///
    /// Ignored when the severity ranks below the configured threshold, or the
    /// name or any identifier value is listed in `IGNORED_VULNERABILITIES`.
    /// Idempotent for a given config.
    pub fn update_ignored(&mut self, config: &TriageConfig) -> bool {
        let below_threshold = config
            .ignore_below_rank
            .is_some_and(|threshold| self.severity.rank() < threshold);

        let listed = config
            .ignored_vulnerabilities
            .iter()
            .any(|entry| self.matches_name_or_identifier(entry));

        self.is_ignored = below_threshold || listed;
        self.is_ignored
    }

    /// Recompute `is_excluded`: the file path starts with one of `prefixes`.
    /// Findings without a location are never excluded.
    pub fn update_excluded(&mut self, prefixes: &[String]) -> bool {
        self.is_excluded = match &self.file_location {
            Some(location) => {
                let path = location.path.trim_start_matches("./");
                prefixes
                    .iter()
                    .map(|p| p.trim_start_matches("./"))
                    .filter(|p| !p.is_empty())
                    .any(|prefix| path.starts_with(prefix))
            }
            None => false,
        };
        self.is_excluded
    }
}

/// String view of a scalar JSON value
fn json_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_file_location(value: &JsonValue) -> Option<FileLocation> {
    match value {
        JsonValue::String(path) => Some(FileLocation::new(path.clone(), None)),
        JsonValue::Object(obj) => {
            let path = obj.get("path").and_then(json_text)?;
            let line = obj.get("line").and_then(|l| match l {
                JsonValue::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
                JsonValue::String(s) => s.trim().parse().ok(),
                _ => None,
            });
            Some(FileLocation::new(path, line))
        }
        _ => None,
    }
}

/// Accepts `{"CVE": "CVE-1"}`, `[["CVE", "CVE-1"]]` or
/// `[{"type": "CVE", "id": "CVE-1"}]`; order is preserved
fn parse_identifiers(value: &JsonValue) -> Vec<(String, String)> {
    match value {
        JsonValue::Object(obj) => obj
            .iter()
            .filter_map(|(scheme, id)| json_text(id).map(|id| (scheme.clone(), id)))
            .collect(),
        JsonValue::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                JsonValue::Array(pair) if pair.len() == 2 => {
                    Some((json_text(&pair[0])?, json_text(&pair[1])?))
                }
                JsonValue::Object(obj) => {
                    let scheme = obj.get("type").or_else(|| obj.get("scheme")).and_then(json_text)?;
                    let id = obj.get("id").or_else(|| obj.get("value")).and_then(json_text)?;
                    Some((scheme, id))
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
