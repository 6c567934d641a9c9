//! Console reporter with colors and formatting
//!
//! Options:
//! - `PRINT_IGNORED` - also list ignored findings (default false)
//! - `PRINT_OVERVIEW` - print each finding's overview under it (default true)

use ::console::{style, StyledObject};
use anyhow::Result;
use std::fmt::Write;

use super::ReporterAdapter;
use crate::config::{ConfigMap, ConfigValue};
use crate::models::{ScanResult, Severity, Vulnerability};

pub struct ConsoleReporter;

fn severity_label(severity: Severity) -> StyledObject<String> {
    let label = format!("{:<8}", severity.to_string().to_uppercase());
    match severity {
        Severity::Critical => style(label).red().bold(),
        Severity::High => style(label).red(),
        Severity::Medium => style(label).yellow(),
        Severity::Low => style(label).blue(),
        Severity::None | Severity::Na => style(label).dim(),
    }
}

fn option_bool(config: &ConfigMap, key: &str, default: bool) -> bool {
    config
        .get(key)
        .and_then(ConfigValue::as_bool)
        .unwrap_or(default)
}

fn format_location(vuln: &Vulnerability) -> String {
    match &vuln.file_location {
        Some(loc) => match loc.line {
            Some(line) => format!("{}:{}", loc.path, line),
            None => loc.path.clone(),
        },
        None => String::new(),
    }
}

fn write_result(out: &mut String, result: &ScanResult, print_ignored: bool, print_overview: bool) -> std::fmt::Result {
    let details = &result.run_details;
    let summary = result.summary();

    write!(
        out,
        "{}  {}  {}",
        style(format!("[{}]", details.display_name())).bold(),
        style(details.tool_type).dim(),
        style(format!("{:.2}s", details.duration_sec)).dim()
    )?;
    if let Some(language) = &details.language {
        write!(out, "  {}", style(language).dim())?;
    }
    writeln!(out)?;

    let counts: Vec<String> = Severity::DESCENDING
        .iter()
        .filter_map(|&sev| {
            let n = summary.totals.get(sev);
            (n > 0).then(|| format!("{} {}", n, sev))
        })
        .collect();
    if counts.is_empty() {
        writeln!(out, "  {}", style("no findings").green())?;
    } else {
        writeln!(
            out,
            "  {} findings ({} ignored): {}",
            summary.totals.total,
            summary.ignored.total,
            counts.join(" | ")
        )?;
    }

    for error in &result.fatal_errors {
        writeln!(out, "  {} {}", style("error:").red().bold(), error)?;
    }
    for warning in &result.warnings {
        writeln!(out, "  {} {}", style("warning:").yellow(), warning)?;
    }

    for vuln in result
        .vulnerabilities
        .iter()
        .filter(|v| print_ignored || !v.is_ignored)
    {
        let ignored = if vuln.is_ignored {
            format!(" {}", style("(ignored)").dim())
        } else {
            String::new()
        };
        writeln!(
            out,
            "    {} {}{}  {}",
            severity_label(vuln.severity),
            vuln.name,
            ignored,
            style(format_location(vuln)).dim()
        )?;
        if print_overview && !vuln.overview.is_empty() {
            writeln!(out, "             {}", vuln.overview)?;
        }
    }

    if result.bom.is_some() || !result.sboms.is_empty() {
        let projects = result.sboms.len() + usize::from(result.bom.is_some());
        writeln!(out, "  {} bill(s) of materials", projects)?;
    }
    writeln!(out)
}

impl ReporterAdapter for ConsoleReporter {
    fn name(&self) -> &'static str {
        "console"
    }

    fn short_description(&self) -> &'static str {
        "Summary and findings on the terminal"
    }

    fn run_report(&self, results: &[ScanResult], config: &ConfigMap) -> Result<String> {
        let print_ignored = option_bool(config, "PRINT_IGNORED", false);
        let print_overview = option_bool(config, "PRINT_OVERVIEW", true);

        let mut out = String::new();
        writeln!(out, "\n{}", style("Scan results").bold())?;
        writeln!(out, "{}", style("─".repeat(40)).dim())?;

        for result in results {
            write_result(&mut out, result, print_ignored, print_overview)?;
        }

        let active: usize = results.iter().map(|r| r.summary().active()).sum();
        let failed = results.iter().filter(|r| r.has_fatal_errors()).count();
        write!(out, "{} active findings across {} tool runs", style(active).bold(), results.len())?;
        if failed > 0 {
            write!(out, ", {} failed", style(failed).red())?;
        }
        writeln!(out)?;
        Ok(out)
    }
}
