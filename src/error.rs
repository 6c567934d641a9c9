//! Error types for scanhub
//!
//! Only configuration problems are fatal. Per-record parsing problems are
//! recovered where they happen and tool failures end up as warnings or
//! fatal errors on the tool's `ScanResult`.

use std::path::PathBuf;
use thiserror::Error;

/// Command that writes an example local config
pub const INIT_COMMAND: &str = "scanhub init";

/// Errors raised while loading or reading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required config key '{key}'. Run '{remediation}' to create a local config, or add it by hand")]
    MissingKey { key: String, remediation: String },

    #[error("Failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub fn missing_key(key: impl Into<String>) -> Self {
        ConfigError::MissingKey {
            key: key.into(),
            remediation: INIT_COMMAND.to_string(),
        }
    }
}

/// A single field of a tool finding could not be interpreted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Unknown severity '{0}'")]
    Severity(String),

    #[error("Unknown vulnerability type '{0}'")]
    VulnerabilityType(String),
}

/// Errors from running or parsing an external scanner
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{tool} is not installed. {hint}")]
    NotInstalled { tool: String, hint: String },

    #[error("{tool} failed: {message}")]
    Failed { tool: String, message: String },

    #[error("{tool} timed out after {timeout_secs}s")]
    TimedOut { tool: String, timeout_secs: u64 },

    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Unknown reporter '{0}'")]
    UnknownReporter(String),
}
