//! JSON reporter
//!
//! Outputs every tool's `ScanResult` plus its summary as a pretty-printed
//! array. Useful for machine consumption, piping to jq, or re-importing.
//!
//! Options:
//! - `INCLUDE_IGNORED` - keep ignored findings in the output (default true)

use anyhow::Result;
use serde_json::{json, Value as JsonValue};

use super::ReporterAdapter;
use crate::config::{ConfigMap, ConfigValue};
use crate::models::ScanResult;

pub struct JsonReporter;

fn result_value(result: &ScanResult, include_ignored: bool) -> Result<JsonValue> {
    let summary = serde_json::to_value(result.summary())?;
    let mut value = serde_json::to_value(result)?;
    if let JsonValue::Object(obj) = &mut value {
        if !include_ignored {
            if let Some(JsonValue::Array(vulns)) = obj.get_mut("vulnerabilities") {
                vulns.retain(|v| v.get("is_ignored") != Some(&json!(true)));
            }
        }
        obj.insert("summary".to_string(), summary);
    }
    Ok(value)
}

impl ReporterAdapter for JsonReporter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn short_description(&self) -> &'static str {
        "Results and summaries as a JSON array"
    }

    fn run_report(&self, results: &[ScanResult], config: &ConfigMap) -> Result<String> {
        let include_ignored = config
            .get("INCLUDE_IGNORED")
            .and_then(ConfigValue::as_bool)
            .unwrap_or(true);

        let values = results
            .iter()
            .map(|r| result_value(r, include_ignored))
            .collect::<Result<Vec<_>>>()?;
        Ok(serde_json::to_string_pretty(&values)?)
    }
}
