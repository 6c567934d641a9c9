//! scanhub - security scan orchestrator
//!
//! Runs SAST, SCA and secret scanners over a project, normalises and triages
//! their findings, and renders reports.
//!
//! The core is:
//! - [`config`] - layered configuration with plugin config cascade
//! - [`models`] - `Vulnerability` and `ScanResult`
//! - [`triage`] - severity coercion, exclusion, ignore rules and ordering
//!
//! [`tools`], [`reporters`] and [`orchestrator`] build the scan pipeline on
//! top of it.

pub mod config;
pub mod error;
pub mod files;
pub mod models;
pub mod orchestrator;
pub mod reporters;
pub mod tools;
pub mod triage;
