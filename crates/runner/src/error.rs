//! Error types for the visual regression workflow
//!
//! Fatal errors (`ProvisionError`, `ServerError`, `ReportError`) abort the
//! run and surface through [`RunError`]. Per-case errors (`PageLoadError`,
//! `ComparisonError`) are recorded on the affected check result and never
//! propagate past the orchestrator loop.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for run-fatal operations
pub type RunResult<T> = std::result::Result<T, RunError>;

/// Environment-setup failures. Any of these halts the run before a single
/// page check executes.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Node runtime unavailable: {0}. Install Node.js to run the browser driver")]
    RuntimeUnavailable(String),

    #[error("Dependency install failed in {dir}: {detail}")]
    DependencyInstall { dir: PathBuf, detail: String },

    #[error("Browser download failed for {browser}: {detail}")]
    BrowserInstall { browser: String, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Site server lifecycle failures, fatal before checks start
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Server failed to start: {0}")]
    Startup(String),

    #[error("Health check failed after {attempts} attempts: {url}")]
    HealthCheck { url: String, attempts: usize },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A single page check failing to produce a screenshot. Recorded on that
/// case's result; the suite continues.
#[derive(Error, Debug)]
pub enum PageLoadError {
    #[error("Navigation timed out after {timeout_ms} ms: {url}")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Driver failed for {url}: {detail}")]
    Driver { url: String, detail: String },

    #[error("Driver exited without a result for {url}")]
    NoResult { url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Baseline-side comparison problems. Missing or corrupt baselines are
/// folded into the `new_baseline` outcome rather than failing the case.
#[derive(Error, Debug)]
pub enum ComparisonError {
    #[error("Baseline not found: {0}")]
    BaselineMissing(PathBuf),

    #[error("Baseline unreadable at {path}: {detail}")]
    BaselineCorrupt { path: PathBuf, detail: String },

    #[error("Screenshot not found: {0}")]
    ActualMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Failures writing the output reports. Fatal to the report step only:
/// surfaced with a non-zero exit even when every check passed.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration loading failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level run error: everything that terminates the workflow
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
