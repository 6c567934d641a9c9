//! Normalisation and triage of tool findings
//!
//! Applied to every tool's raw findings before reporting:
//! 1. Build vulnerabilities, coercing severities (missing or corrupt → `DEFAULT_SEVERITY`)
//! 2. Mark findings under an `EXCLUDE` / `IGNORED_FILES` path prefix as excluded
//! 3. Mark ignored findings (`IGNORED_VULNERABILITIES`, severity threshold)
//! 4. Drop excluded findings; ignored ones stay in the list
//! 5. Sort: non-ignored first, then most severe first, otherwise stable

use std::cmp::Reverse;
use tracing::debug;

use crate::config::{ConfigMap, ConfigValue};
use crate::models::{RawFinding, ScanSummary, Severity, Vulnerability};

/// Ignore and exclude settings of one plugin scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriageConfig {
    /// Severity for findings without a usable one
    pub default_severity: Severity,
    /// Exact names or identifier values to ignore
    pub ignored_vulnerabilities: Vec<String>,
    /// Path prefixes whose findings are dropped
    pub exclude: Vec<String>,
    /// Findings ranked strictly below this are ignored
    pub ignore_below_rank: Option<i64>,
}

impl TriageConfig {
    /// Read the common options out of a resolved plugin config.
    ///
    /// `IGNORE_BELOW_SEVERITY_INT` wins over the named `IGNORE_BELOW_SEVERITY`.
    pub fn from_plugin_config(config: &ConfigMap) -> Self {
        let default_severity = config
            .get("DEFAULT_SEVERITY")
            .and_then(ConfigValue::as_str)
            .map(|s| {
                s.parse::<Severity>().unwrap_or_else(|e| {
                    debug!("{}, using na as default severity", e);
                    Severity::Na
                })
            })
            .unwrap_or_default();

        let list = |key: &str| {
            config
                .get(key)
                .map(ConfigValue::as_string_list)
                .unwrap_or_default()
        };

        let mut exclude = list("EXCLUDE");
        for path in list("IGNORED_FILES") {
            if !exclude.contains(&path) {
                exclude.push(path);
            }
        }

        let ignore_below_rank = config
            .get("IGNORE_BELOW_SEVERITY_INT")
            .and_then(ConfigValue::as_i64)
            .or_else(|| {
                config
                    .get("IGNORE_BELOW_SEVERITY")
                    .and_then(ConfigValue::as_str)
                    .and_then(|s| s.parse::<Severity>().ok())
                    .map(Severity::rank)
            });

        Self {
            default_severity,
            ignored_vulnerabilities: list("IGNORED_VULNERABILITIES"),
            exclude,
            ignore_below_rank,
        }
    }
}

/// Turn raw findings into the triaged, sorted vulnerability list
pub fn normalise_vulnerabilities(raw: Vec<RawFinding>, config: &TriageConfig) -> Vec<Vulnerability> {
    let total = raw.len();
    let mut vulnerabilities: Vec<Vulnerability> = raw
        .into_iter()
        .map(|finding| {
            let mut vuln = match finding {
                RawFinding::Mapping(value) => {
                    Vulnerability::from_mapping(&value, config.default_severity)
                }
                RawFinding::Parsed(vuln) => vuln,
            };
            vuln.update_excluded(&config.exclude);
            vuln.update_ignored(config);
            vuln
        })
        .filter(|v| !v.is_excluded)
        .collect();

    let dropped = total - vulnerabilities.len();
    if dropped > 0 {
        debug!("Excluded {} findings by path", dropped);
    }

    sort_vulnerabilities(&mut vulnerabilities);
    vulnerabilities
}

/// Stable sort: non-ignored before ignored, then by severity, most severe first
pub fn sort_vulnerabilities(vulnerabilities: &mut [Vulnerability]) {
    vulnerabilities.sort_by_key(|v| (v.is_ignored, Reverse(v.severity)));
}

/// Count findings per severity, in total and for ignored ones
pub fn summarise(vulnerabilities: &[Vulnerability]) -> ScanSummary {
    let mut summary = ScanSummary::default();
    for vuln in vulnerabilities {
        summary.totals.add(vuln.severity);
        if vuln.is_ignored {
            summary.ignored.add(vuln.severity);
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_fragment, FragmentFormat};
    use serde_json::json;

    fn triage_config(toml: &str) -> TriageConfig {
        TriageConfig::from_plugin_config(&parse_fragment(toml, FragmentFormat::Toml).unwrap())
    }

    fn ignored(name: &str, severity: Severity) -> Vulnerability {
        Vulnerability {
            is_ignored: true,
            ..Vulnerability::new(name, severity)
        }
    }

    #[test]
    fn test_config_parsing() {
        let cfg = triage_config(
            r#"
DEFAULT_SEVERITY = "Medium"
IGNORED_VULNERABILITIES = ["B101"]
EXCLUDE = ["tests/"]
IGNORED_FILES = ["docs/", "tests/"]
IGNORE_BELOW_SEVERITY = "low"
"#,
        );
        assert_eq!(cfg.default_severity, Severity::Medium);
        assert_eq!(cfg.ignored_vulnerabilities, vec!["B101"]);
        assert_eq!(cfg.exclude, vec!["tests/", "docs/"]);
        assert_eq!(cfg.ignore_below_rank, Some(Severity::Low.rank()));
    }

    #[test]
    fn test_config_int_threshold_wins() {
        let cfg = triage_config("IGNORE_BELOW_SEVERITY = 'low'\nIGNORE_BELOW_SEVERITY_INT = 4");
        assert_eq!(cfg.ignore_below_rank, Some(4));
    }

    #[test]
    fn test_config_bad_default_severity() {
        let cfg = triage_config("DEFAULT_SEVERITY = 'spicy'");
        assert_eq!(cfg.default_severity, Severity::Na);
        assert_eq!(TriageConfig::default().ignore_below_rank, None);
    }

    #[test]
    fn test_sort_order() {
        let raw: Vec<RawFinding> = vec![
            Vulnerability::new("low", Severity::Low).into(),
            Vulnerability::new("high-ignored", Severity::High).into(),
            Vulnerability::new("high", Severity::High).into(),
            Vulnerability::new("medium", Severity::Medium).into(),
        ];
        let cfg = TriageConfig {
            ignored_vulnerabilities: vec!["high-ignored".into()],
            ..Default::default()
        };
        let out = normalise_vulnerabilities(raw, &cfg);
        let names: Vec<&str> = out.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["high", "medium", "low", "high-ignored"]);
    }

    #[test]
    fn test_sort_already_ordered_is_unchanged() {
        let mut list = vec![
            Vulnerability::new("a", Severity::High),
            Vulnerability::new("b", Severity::Medium),
            Vulnerability::new("c", Severity::Low),
            ignored("d", Severity::High),
        ];
        let before = list.clone();
        sort_vulnerabilities(&mut list);
        assert_eq!(list, before);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut list = vec![
            Vulnerability::new("first", Severity::Medium),
            Vulnerability::new("second", Severity::Medium),
            Vulnerability::new("third", Severity::Medium),
        ];
        sort_vulnerabilities(&mut list);
        let names: Vec<&str> = list.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_severity_coercion() {
        let raw: Vec<RawFinding> = vec![
            json!({"name": "mixed", "severity": "LoW"}).into(),
            json!({"name": "corrupt", "severity": "@@@"}).into(),
            json!({"name": "missing"}).into(),
        ];
        let cfg = triage_config("DEFAULT_SEVERITY = 'medium'");
        let out = normalise_vulnerabilities(raw, &cfg);
        let by_name = |n: &str| out.iter().find(|v| v.name == n).unwrap().severity;
        assert_eq!(by_name("mixed"), Severity::Low);
        assert_eq!(by_name("corrupt"), Severity::Medium);
        assert_eq!(by_name("missing"), Severity::Medium);
    }

    #[test]
    fn test_malformed_record_is_kept() {
        let raw: Vec<RawFinding> = vec![json!(42).into(), json!(null).into()];
        let out = normalise_vulnerabilities(raw, &triage_config("DEFAULT_SEVERITY = 'high'"));
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.severity == Severity::High));
    }

    #[test]
    fn test_exclude_beats_severity() {
        let raw: Vec<RawFinding> = vec![
            json!({"name": "vendored", "severity": "critical", "file_location": {"path": "vendor/x.py", "line": 1}}).into(),
            json!({"name": "kept", "severity": "low", "file_location": {"path": "src/x.py"}}).into(),
            json!({"name": "no-location", "severity": "low"}).into(),
        ];
        let cfg = triage_config("EXCLUDE = ['vendor/']\nIGNORE_BELOW_SEVERITY_INT = 1");
        let out = normalise_vulnerabilities(raw, &cfg);
        let names: Vec<&str> = out.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["kept", "no-location"]);
        assert!(out.iter().all(|v| !v.is_excluded));
    }

    #[test]
    fn test_ignored_by_threshold_stays_in_list() {
        let raw: Vec<RawFinding> = vec![
            json!({"name": "m", "severity": "medium"}).into(),
            json!({"name": "h", "severity": "high"}).into(),
        ];
        let cfg = TriageConfig {
            ignore_below_rank: Some(Severity::High.rank()),
            ..Default::default()
        };
        let out = normalise_vulnerabilities(raw, &cfg);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "h");
        assert!(!out[0].is_ignored);
        assert_eq!(out[1].name, "m");
        assert!(out[1].is_ignored);
    }

    #[test]
    fn test_summary_consistency() {
        let list = vec![
            Vulnerability::new("a", Severity::Critical),
            Vulnerability::new("b", Severity::High),
            ignored("c", Severity::High),
            ignored("d", Severity::Na),
            Vulnerability::new("e", Severity::None),
        ];
        let summary = summarise(&list);
        assert_eq!(summary.totals.total, list.len());
        assert_eq!(
            summary.ignored.total,
            list.iter().filter(|v| v.is_ignored).count()
        );
        assert_eq!(summary.totals.high, 2);
        assert_eq!(summary.ignored.high, 1);
        assert_eq!(summary.ignored.na, 1);
        assert_eq!(summary.totals.none, 1);
        assert_eq!(summary.totals.get(Severity::Critical), 1);
    }

    #[test]
    fn test_empty_input() {
        let out = normalise_vulnerabilities(Vec::new(), &TriageConfig::default());
        assert!(out.is_empty());
        assert_eq!(summarise(&out), ScanSummary::default());
    }
}
