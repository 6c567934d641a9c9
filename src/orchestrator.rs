//! Scan orchestration
//!
//! A scan:
//! 1. Validates the `scan` section for the requested scan type
//! 2. Indexes the scan path once
//! 3. Plans one job per configured tool, plus each language's tools for
//!    languages present in the index
//! 4. Runs the jobs in parallel. Each job resolves its plugin config, runs the
//!    tool and triages its findings into a `ScanResult`
//! 5. Hands all results to the configured reporters
//!
//! Tool failures never abort the scan: they become fatal errors on that
//! tool's result. Configuration errors do abort it.

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{ConfigMap, ConfigStore, ScanConfig};
use crate::error::{ConfigError, ToolError};
use crate::files::FileIndex;
use crate::models::{RunDetails, ScanResult, Severity, ToolType};
use crate::reporters::{emit, ReportTarget, ReporterRegistry};
use crate::tools::{ToolContext, ToolRegistry};
use crate::triage::{normalise_vulnerabilities, TriageConfig};

/// One tool run to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanJob {
    /// Identifier as configured, e.g. `bandit` or `semgrep:ci`
    pub identifier: String,
    /// Language scope for tools listed under a language section
    pub language: Option<String>,
}

/// Results of all tool runs of one scan
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub scan_config: ScanConfig,
    pub scan_type: Option<String>,
    pub results: Vec<ScanResult>,
}

impl ScanOutcome {
    /// `FAIL_ON_SEVERITY` from the scan section, if set
    pub fn fail_threshold(&self) -> Result<Option<Severity>, ConfigError> {
        match self.scan_config.fail_on_severity.as_deref() {
            None => Ok(None),
            Some(raw) => raw
                .parse::<Severity>()
                .map(Some)
                .map_err(|e| ConfigError::InvalidValue {
                    key: "scan.FAIL_ON_SEVERITY".to_string(),
                    message: e.to_string(),
                }),
        }
    }

    /// Whether any non-ignored finding is at or above the threshold
    pub fn exceeds(&self, threshold: Severity) -> bool {
        self.results
            .iter()
            .filter_map(ScanResult::highest_active_severity)
            .any(|sev| sev >= threshold)
    }

    /// Whether the scan should be reported as failed
    pub fn should_fail(&self) -> Result<bool, ConfigError> {
        Ok(self.fail_threshold()?.is_some_and(|t| self.exceeds(t)))
    }
}

/// A reporter's rendered output and where it goes
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub reporter: String,
    pub output: String,
    pub config: ConfigMap,
}

/// Runs configured tools and reporters over a scan path
#[derive(Debug)]
pub struct ScanOrchestrator {
    store: ConfigStore,
    tools: ToolRegistry,
    reporters: ReporterRegistry,
}

impl ScanOrchestrator {
    /// Orchestrator with the built-in tools and reporters
    pub fn new(store: ConfigStore) -> Self {
        Self::with_registries(store, ToolRegistry::builtin(), ReporterRegistry::builtin())
    }

    pub fn with_registries(
        mut store: ConfigStore,
        tools: ToolRegistry,
        reporters: ReporterRegistry,
    ) -> Self {
        store.register_plugins(tools.names().chain(reporters.names()));
        Self {
            store,
            tools,
            reporters,
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn reporters(&self) -> &ReporterRegistry {
        &self.reporters
    }

    /// Jobs for a scan config, in configured order
    pub fn plan(&self, scan: &ScanConfig, files: &FileIndex) -> Vec<ScanJob> {
        let mut jobs: Vec<ScanJob> = scan
            .tools
            .iter()
            .map(|identifier| ScanJob {
                identifier: identifier.clone(),
                language: None,
            })
            .collect();

        for language in &scan.languages {
            if !files.has_language(language) {
                debug!("Skipping language {}: no matching files", language);
                continue;
            }
            let tools = self.store.language_tools(language);
            if tools.is_empty() {
                warn!("Language {} has no tools configured ({}.tools)", language, language);
            }
            jobs.extend(tools.into_iter().map(|identifier| ScanJob {
                identifier,
                language: Some(language.clone()),
            }));
        }
        jobs
    }

    /// Run every planned tool over `scan_path`
    pub fn scan(&self, scan_path: &Path, scan_type: Option<&str>) -> Result<ScanOutcome> {
        if !scan_path.is_dir() {
            bail!("Scan path {} is not a directory", scan_path.display());
        }
        let scan_config = self.store.get_scan_config(scan_type)?;

        // Fail on unknown reporters before spending time on tools
        for name in &scan_config.reporters {
            let id = self.store.parse_plugin_id(name, None);
            self.reporters.create(&id.plugin)?;
        }

        let files = Arc::new(FileIndex::discover(scan_path));
        let jobs = self.plan(&scan_config, &files);
        info!(
            "Running {} tool(s) over {} files in {}",
            jobs.len(),
            files.len(),
            scan_path.display()
        );

        let results: Vec<ScanResult> = jobs
            .par_iter()
            .map(|job| self.run_job(job, scan_path, scan_type, &files))
            .collect();

        Ok(ScanOutcome {
            scan_config,
            scan_type: scan_type.map(str::to_string),
            results,
        })
    }

    /// Run one tool and triage its findings. Never fails; problems end up in
    /// the result's `fatal_errors`.
    pub fn run_job(
        &self,
        job: &ScanJob,
        scan_path: &Path,
        scan_type: Option<&str>,
        files: &Arc<FileIndex>,
    ) -> ScanResult {
        let id = self.store.parse_plugin_id(&job.identifier, None);
        let mut details = RunDetails::new(&id.plugin, ToolType::default());
        details.run_type = id.run_type.clone();
        details.scan_type = scan_type.map(str::to_string);
        details.language = job.language.clone();
        details.scan_path = scan_path.to_string_lossy().to_string();

        let tool = match self.tools.create(&id.plugin) {
            Ok(tool) => tool,
            Err(e) => {
                warn!("{}", e);
                return ScanResult::failed(details, e.to_string());
            }
        };
        details.tool_type = tool.tool_type();

        let Some(version) = tool.check_installed() else {
            let err = ToolError::NotInstalled {
                tool: id.plugin.clone(),
                hint: tool.install_help().to_string(),
            };
            warn!("{}", err);
            return ScanResult::failed(details, err.to_string().trim_end().to_string());
        };

        let config = self.store.get_plugin_config(
            &job.identifier,
            scan_type,
            None,
            job.language.as_deref(),
        );
        let triage = TriageConfig::from_plugin_config(&config);
        let ctx = ToolContext {
            scan_path: scan_path.to_path_buf(),
            config,
            run_type: id.run_type.clone(),
            scan_type: details.scan_type.clone(),
            language: job.language.clone(),
            files: Arc::clone(files),
        };

        info!("Running {} ({})", details.display_name(), version);
        details.start_time = chrono::Utc::now();
        let started = Instant::now();
        let output = tool
            .run_scan(&ctx)
            .and_then(|report| tool.parse_report(&report, &ctx));
        details.duration_sec = started.elapsed().as_secs_f64();

        match output {
            Ok(output) => {
                let mut result = ScanResult::new(details);
                result.vulnerabilities = normalise_vulnerabilities(output.findings, &triage);
                result.warnings = output.warnings;
                result.fatal_errors = output.fatal_errors;
                result.bom = output.bom;
                result.sboms = output.sboms;
                info!(
                    "{} finished in {:.2}s with {} findings",
                    result.run_details.display_name(),
                    result.run_details.duration_sec,
                    result.vulnerabilities.len()
                );
                result
            }
            Err(e) => {
                warn!("{} failed: {:#}", details.display_name(), e);
                ScanResult::failed(details, format!("{:#}", e))
            }
        }
    }

    /// Render one reporter over the results
    pub fn render_report(
        &self,
        name: &str,
        results: &[ScanResult],
        scan_type: Option<&str>,
    ) -> Result<RenderedReport> {
        let id = self.store.parse_plugin_id(name, None);
        let reporter = self.reporters.create(&id.plugin)?;
        let config = self.store.get_plugin_config(name, scan_type, None, None);
        let output = reporter
            .run_report(results, &config)
            .with_context(|| format!("Reporter {} failed", name))?;
        Ok(RenderedReport {
            reporter: name.to_string(),
            output,
            config,
        })
    }

    /// Render every configured reporter and write its output.
    /// Relative `REPORT_FILE` paths resolve against `output_base`.
    pub fn report(&self, outcome: &ScanOutcome, output_base: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for name in &outcome.scan_config.reporters {
            let rendered = self.render_report(name, &outcome.results, outcome.scan_type.as_deref())?;
            let target = ReportTarget::from_config(&rendered.config, output_base);
            emit(&rendered.output, &target)?;
            if let ReportTarget::File(path) = target {
                written.push(path);
            }
        }
        Ok(written)
    }
}
