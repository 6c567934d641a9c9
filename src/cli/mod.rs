//! CLI command definitions and handlers

mod init;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

use scanhub::config::{map_from_path, ConfigMap, ConfigStore, ConfigValue};
use scanhub::orchestrator::ScanOrchestrator;
use scanhub::reporters::ReporterRegistry;
use scanhub::tools::ToolRegistry;

/// Parse a `--set KEY=VALUE` override
fn parse_override(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("'{}' is not KEY=VALUE", s)),
    }
}

/// scanhub - run security scanners and triage their findings
#[derive(Parser, Debug)]
#[command(name = "scanhub")]
#[command(
    version,
    about = "Security scan orchestrator: run SAST, SCA and secret scanners, triage findings, render reports",
    after_help = "\
Examples:
  scanhub init                              Write an example .scanhub.toml
  scanhub scan .                            Scan the current directory
  scanhub scan . --scan-type ci             Use the [scan.ci] profile
  scanhub scan . --set bandit.TIMEOUT=60    Override one config value
  scanhub config --plugin semgrep:ci        Show the resolved semgrep config
  scanhub tools                             List tools and whether they are installed"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Extra config file, merged after the global and local config (repeatable)
    #[arg(long = "config", short = 'c', global = true, value_name = "FILE")]
    pub config_files: Vec<PathBuf>,

    /// Override a config value, e.g. `--set scan.FAIL_ON_SEVERITY=high` (repeatable)
    #[arg(long = "set", global = true, value_name = "KEY=VALUE", value_parser = parse_override)]
    pub overrides: Vec<(String, String)>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the configured tools and reporters
    #[command(after_help = "\
Exit codes:
  0  scan finished (findings may exist)
  1  a non-ignored finding is at or above scan.FAIL_ON_SEVERITY, or an error occurred")]
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Scan profile merged over [scan], e.g. `ci` for [scan.ci]
        #[arg(long, short = 't')]
        scan_type: Option<String>,

        /// Disable the progress spinner
        #[arg(long)]
        no_progress: bool,
    },

    /// Print the merged config, or one plugin's resolved config, as JSON
    Config {
        /// Plugin identifier (`bandit`, `semgrep:ci`, `semgrep_ci`)
        #[arg(long, short = 'p')]
        plugin: Option<String>,

        /// Scan type scope
        #[arg(long, short = 't')]
        scan_type: Option<String>,

        /// Run type, overriding any suffix in the identifier
        #[arg(long, short = 'r')]
        run_type: Option<String>,

        /// Language scope
        #[arg(long, short = 'l')]
        language: Option<String>,

        /// Also list the config files that were loaded
        #[arg(long)]
        sources: bool,
    },

    /// Write an example .scanhub.toml
    Init {
        /// Directory to write it into
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// List available tools and whether they are installed
    Tools,

    /// List available reporters
    Reporters,
}

/// Run the parsed command
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { ref path } => init::run(path),
        Commands::Scan {
            ref path,
            ref scan_type,
            no_progress,
        } => run_scan(&cli, path, scan_type.as_deref(), no_progress),
        Commands::Config {
            ref plugin,
            ref scan_type,
            ref run_type,
            ref language,
            sources,
        } => {
            let mut store = load_store(&cli);
            store.register_plugins(
                ToolRegistry::builtin()
                    .names()
                    .chain(ReporterRegistry::builtin().names()),
            );
            let tree = match plugin {
                Some(plugin) => store.get_plugin_config(
                    plugin,
                    scan_type.as_deref(),
                    run_type.as_deref(),
                    language.as_deref(),
                ),
                None => store.tree().clone(),
            };
            println!("{}", serde_json::to_string_pretty(&ConfigValue::Map(tree))?);
            if sources {
                for source in store.sources() {
                    eprintln!("{} {}", style("loaded").dim(), source.display());
                }
            }
            Ok(())
        }
        Commands::Tools => {
            list_tools();
            Ok(())
        }
        Commands::Reporters => {
            let registry = ReporterRegistry::builtin();
            for name in registry.names() {
                let reporter = registry.create(name)?;
                println!("{:<10} {}", style(name).bold(), reporter.short_description());
            }
            Ok(())
        }
    }
}

/// Global, local, `--config` files, then `--set` overrides. Fragments that
/// could not be loaded are reported on stderr.
fn load_store(cli: &Cli) -> ConfigStore {
    let overrides: Vec<ConfigMap> = cli
        .overrides
        .iter()
        .map(|(key, value)| map_from_path(key, ConfigValue::parse_override(value)))
        .collect();
    let store = ConfigStore::load_default(&cli.config_files, overrides);
    for warning in store.warnings() {
        eprintln!("{} {} (skipped)", style("warning:").yellow().bold(), warning);
    }
    store
}

fn create_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn run_scan(cli: &Cli, path: &Path, scan_type: Option<&str>, no_progress: bool) -> Result<()> {
    let scan_path = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;
    let orchestrator = ScanOrchestrator::new(load_store(cli));

    let spinner = if no_progress || !console::Term::stderr().is_term() {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.set_style(create_spinner_style());
    spinner.set_message(format!("Scanning {}...", scan_path.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcome = orchestrator.scan(&scan_path, scan_type);
    spinner.finish_and_clear();
    let outcome = outcome?;

    let output_base = std::env::current_dir().context("Failed to read current directory")?;
    for written in orchestrator.report(&outcome, &output_base)? {
        eprintln!("{} Report written to {}", style("✓").green(), written.display());
    }

    if outcome.should_fail()? {
        if let Some(threshold) = outcome.fail_threshold()? {
            eprintln!(
                "{} findings at or above {} severity",
                style("Failing:").red().bold(),
                threshold
            );
        }
        std::process::exit(1);
    }
    Ok(())
}

fn list_tools() {
    let registry = ToolRegistry::builtin();
    for name in registry.names() {
        let Ok(tool) = registry.create(name) else {
            continue;
        };
        let status = match tool.check_installed() {
            Some(version) => style(version).green().to_string(),
            None => {
                let hint = tool.install_help();
                if hint.is_empty() {
                    style("not installed".to_string()).red().to_string()
                } else {
                    format!("{} ({})", style("not installed").red(), hint)
                }
            }
        };
        println!(
            "{:<10} {:<6} {}\n           {}",
            style(name).bold(),
            tool.tool_type(),
            tool.short_description(),
            status
        );
    }
}
