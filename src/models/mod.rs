//! Core data models for scanhub
//!
//! These models are shared by the tool adapters, the triage engine and the
//! reporters: severities, vulnerabilities and per-tool scan results.

mod scan_result;
mod vulnerability;

pub use scan_result::{RunDetails, ScanResult, ScanSummary, SeverityCounts};
pub use vulnerability::{FileLocation, RawFinding, Vulnerability};

use crate::error::ParsingError;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// Severity levels for vulnerabilities, least severe first.
///
/// The declaration order is the severity rank: `na` = 0 up to `critical` = 5.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Na,
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Most severe first
    pub const DESCENDING: [Severity; 6] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::None,
        Severity::Na,
    ];

    /// Integer rank used by `IGNORE_BELOW_SEVERITY_INT`
    pub fn rank(self) -> i64 {
        self as i64
    }

    /// Severity for a rank, clamped into range
    pub fn from_rank(rank: i64) -> Severity {
        match rank {
            i64::MIN..=0 => Severity::Na,
            1 => Severity::None,
            2 => Severity::Low,
            3 => Severity::Medium,
            4 => Severity::High,
            _ => Severity::Critical,
        }
    }

    /// Parse free-text severity, falling back to `default` for anything
    /// missing or unrecognised
    pub fn coerce(text: Option<&str>, default: Severity) -> Severity {
        text.and_then(|t| t.parse().ok()).unwrap_or(default)
    }
}

impl FromStr for Severity {
    type Err = ParsingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" | "error" => Ok(Severity::High),
            "medium" | "moderate" | "warning" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "none" | "info" | "informational" | "note" => Ok(Severity::None),
            "na" | "n/a" | "unknown" => Ok(Severity::Na),
            _ => Err(ParsingError::Severity(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
            Severity::None => write!(f, "none"),
            Severity::Na => write!(f, "na"),
        }
    }
}

/// What kind of problem a vulnerability describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VulnerabilityType {
    Dependency,
    Code,
    License,
    Secret,
    Infrastructure,
    #[default]
    Generic,
}

impl FromStr for VulnerabilityType {
    type Err = ParsingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dependency" | "sca" => Ok(VulnerabilityType::Dependency),
            "code" | "sast" => Ok(VulnerabilityType::Code),
            "license" => Ok(VulnerabilityType::License),
            "secret" => Ok(VulnerabilityType::Secret),
            "infrastructure" | "iac" => Ok(VulnerabilityType::Infrastructure),
            "generic" => Ok(VulnerabilityType::Generic),
            _ => Err(ParsingError::VulnerabilityType(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for VulnerabilityType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

impl std::fmt::Display for VulnerabilityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VulnerabilityType::Dependency => "dependency",
            VulnerabilityType::Code => "code",
            VulnerabilityType::License => "license",
            VulnerabilityType::Secret => "secret",
            VulnerabilityType::Infrastructure => "infrastructure",
            VulnerabilityType::Generic => "generic",
        };
        write!(f, "{}", s)
    }
}

/// Category of scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    Sast,
    Sca,
    Secret,
    Sbom,
    Container,
    #[default]
    Misc,
}

impl std::fmt::Display for ToolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ToolType::Sast => "sast",
            ToolType::Sca => "sca",
            ToolType::Secret => "secret",
            ToolType::Sbom => "sbom",
            ToolType::Container => "container",
            ToolType::Misc => "misc",
        };
        write!(f, "{}", s)
    }
}
