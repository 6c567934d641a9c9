//! Outcome of one tool run

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{Severity, ToolType, Vulnerability};

/// Counts by severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub none: usize,
    pub na: usize,
    pub total: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::None => self.none += 1,
            Severity::Na => self.na += 1,
        }
        self.total += 1;
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::None => self.none,
            Severity::Na => self.na,
        }
    }
}

/// Totals and ignored counts for a list of vulnerabilities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub totals: SeverityCounts,
    pub ignored: SeverityCounts,
}

impl ScanSummary {
    /// Findings that are not ignored
    pub fn active(&self) -> usize {
        self.totals.total - self.ignored.total
    }
}

/// Metadata about a tool run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDetails {
    pub tool_name: String,
    #[serde(default)]
    pub tool_type: ToolType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub duration_sec: f64,
    #[serde(default)]
    pub scan_path: String,
}

impl RunDetails {
    pub fn new(tool_name: impl Into<String>, tool_type: ToolType) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_type,
            run_type: None,
            scan_type: None,
            language: None,
            start_time: Utc::now(),
            duration_sec: 0.0,
            scan_path: String::new(),
        }
    }

    /// `tool:run_type` when a run type is set
    pub fn display_name(&self) -> String {
        match &self.run_type {
            Some(run_type) => format!("{}:{}", self.tool_name, run_type),
            None => self.tool_name.clone(),
        }
    }
}

/// Results of one tool run: triaged vulnerabilities plus whatever else the
/// tool produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub run_details: RunDetails,
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
    /// CycloneDX-shaped bill of materials for single-project tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bom: Option<JsonValue>,
    /// Project name to bill of materials for multi-project tools
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub sboms: IndexMap<String, JsonValue>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub fatal_errors: Vec<String>,
}

impl ScanResult {
    pub fn new(run_details: RunDetails) -> Self {
        Self {
            run_details,
            vulnerabilities: Vec::new(),
            bom: None,
            sboms: IndexMap::new(),
            warnings: Vec::new(),
            fatal_errors: Vec::new(),
        }
    }

    /// A result for a tool that could not run at all
    pub fn failed(run_details: RunDetails, error: impl Into<String>) -> Self {
        let mut result = Self::new(run_details);
        result.fatal_errors.push(error.into());
        result
    }

    /// Summary of the current vulnerability list. Recomputed on every call.
    pub fn summary(&self) -> ScanSummary {
        crate::triage::summarise(&self.vulnerabilities)
    }

    /// Most severe finding that is not ignored
    pub fn highest_active_severity(&self) -> Option<Severity> {
        self.vulnerabilities
            .iter()
            .filter(|v| !v.is_ignored)
            .map(|v| v.severity)
            .max()
    }

    pub fn has_fatal_errors(&self) -> bool {
        !self.fatal_errors.is_empty()
    }

    /// Rebuild from the JSON form produced by `serde_json::to_string`
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
