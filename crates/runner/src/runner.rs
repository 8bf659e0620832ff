//! Run orchestration
//!
//! Owns the run state machine and executes the sequential check loop. One
//! browser session handles one (page, viewport) pair at a time; a page
//! failing to load or render is recorded on its result and never aborts the
//! remaining suite. The result collection is append-only and the report is
//! written even for interrupted runs.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::browser::{BrowserDriver, PageCapture};
use crate::config::{page_key, CheckCase, RunConfig};
use crate::error::{RunError, RunResult};
use crate::fonts::FontInventory;
use crate::provision::Provisioner;
use crate::report::ReportWriter;
use crate::server::{probe_base_url, ServerHandle};
use crate::visual::{Comparison, VisualTester};

/// Overall lifecycle of one run. Per-case failures during `Running` never
/// move the run to `Failed`; only fatal environment errors do, and only out
/// of `Provisioning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Provisioning,
    Running,
    Reporting,
    Completed,
    Failed,
}

impl RunState {
    /// Legal transitions; everything else is a programming error
    fn can_transition(self, to: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, to),
            (NotStarted, Provisioning)
                | (Provisioning, Running)
                | (Provisioning, Failed)
                | (Running, Reporting)
                | (Reporting, Completed)
        )
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::NotStarted => "not_started",
            RunState::Provisioning => "provisioning",
            RunState::Running => "running",
            RunState::Reporting => "reporting",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of one check case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Pass,
    Fail,
    NewBaseline,
    Error,
}

/// One comparison result. The run plan guarantees exactly one of these per
/// configured (page, viewport) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub route: String,
    pub viewport: String,
    pub outcome: CheckOutcome,
    pub diff_score: Option<f64>,
    pub diff_pixels: Option<u64>,
    pub total_pixels: Option<u64>,
    pub screenshot: Option<String>,
    pub baseline: Option<String>,
    pub diff_image: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl CheckResult {
    fn empty(case: &CheckCase) -> Self {
        Self {
            route: case.route.clone(),
            viewport: case.viewport.name.clone(),
            outcome: CheckOutcome::Error,
            diff_score: None,
            diff_pixels: None,
            total_pixels: None,
            screenshot: None,
            baseline: None,
            diff_image: None,
            error: None,
            duration_ms: 0,
        }
    }
}

/// Aggregate of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub new_baselines: usize,
    pub errors: usize,
    pub interrupted: bool,
    pub duration_ms: u64,
    pub results: Vec<CheckResult>,
}

impl RunSummary {
    pub fn from_results(results: Vec<CheckResult>, interrupted: bool, duration_ms: u64) -> Self {
        let mut passed = 0;
        let mut failed = 0;
        let mut new_baselines = 0;
        let mut errors = 0;
        for result in &results {
            match result.outcome {
                CheckOutcome::Pass => passed += 1,
                CheckOutcome::Fail => failed += 1,
                CheckOutcome::NewBaseline => new_baselines += 1,
                CheckOutcome::Error => errors += 1,
            }
        }
        Self {
            total: results.len(),
            passed,
            failed,
            new_baselines,
            errors,
            interrupted,
            duration_ms,
            results,
        }
    }

    /// Exit-code contract: new baselines are fine, failed diffs and page
    /// errors are not
    pub fn all_green(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

/// Executes the whole workflow for one configuration
pub struct Runner {
    config: RunConfig,
    state: RunState,
    cancel: Arc<AtomicBool>,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            state: RunState::NotStarted,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancellation flag, checked between cases. Setting it stops the run
    /// before the next check starts; the report still covers the completed
    /// cases.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, to: RunState) -> RunResult<()> {
        if !self.state.can_transition(to) {
            return Err(RunError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        info!("Run state: {} -> {}", self.state, to);
        self.state = to;
        Ok(())
    }

    /// Provision, check every configured case, write the reports
    pub async fn run(&mut self) -> RunResult<RunSummary> {
        let start = Instant::now();

        self.transition(RunState::Provisioning)?;

        if self.config.skip_provision {
            info!("Skipping provisioning");
        } else {
            let provisioner = Provisioner::new(
                self.config.tools_dir.clone(),
                self.config.browser,
                self.config.force_provision,
            );
            if let Err(e) = provisioner.ensure().await {
                self.transition(RunState::Failed)?;
                return Err(e.into());
            }
        }

        // The server is part of the environment: failing to bring it up is
        // fatal while still in Provisioning.
        let _server: Option<ServerHandle> = match &self.config.server {
            Some(spec) => match ServerHandle::spawn(spec, &self.config.base_url).await {
                Ok(handle) => Some(handle),
                Err(e) => {
                    self.transition(RunState::Failed)?;
                    return Err(e.into());
                }
            },
            None => {
                if let Err(e) = probe_base_url(&self.config.base_url).await {
                    self.transition(RunState::Failed)?;
                    return Err(e.into());
                }
                None
            }
        };

        self.transition(RunState::Running)?;

        let driver = BrowserDriver::new(
            self.config.tools_dir.clone(),
            self.config.browser,
            self.config.nav_timeout_ms,
            self.config.settle_ms,
        );
        let visual = VisualTester::new(
            self.config.baseline_dir.clone(),
            self.config.output_dir.join("diffs"),
            self.config.threshold,
            self.config.update_baselines,
        )?;
        let screenshots_dir = self.config.output_dir.join("screenshots");
        let reference_dir = self.config.output_dir.join("reference");

        let plan = self.config.plan();
        info!("Running {} check(s)...", plan.len());

        let mut results: Vec<CheckResult> = Vec::with_capacity(plan.len());
        let mut fonts = FontInventory::new();
        let mut interrupted = false;

        for case in &plan {
            if self.cancel.load(Ordering::SeqCst) {
                warn!("Cancellation requested - stopping before {}", case.key());
                interrupted = true;
                break;
            }

            let result = self
                .run_case(&driver, &visual, &screenshots_dir, &reference_dir, &mut fonts, case)
                .await;
            match result.outcome {
                CheckOutcome::Pass => info!("✓ {} ({} ms)", case.key(), result.duration_ms),
                CheckOutcome::NewBaseline => {
                    info!("● {} - new baseline ({} ms)", case.key(), result.duration_ms)
                }
                CheckOutcome::Fail => error!(
                    "✗ {} - {:.4} of pixels differ",
                    case.key(),
                    result.diff_score.unwrap_or_default()
                ),
                CheckOutcome::Error => error!(
                    "✗ {} - {}",
                    case.key(),
                    result.error.as_deref().unwrap_or("unknown error")
                ),
            }
            results.push(result);
        }

        self.transition(RunState::Reporting)?;

        let summary = RunSummary::from_results(results, interrupted, start.elapsed().as_millis() as u64);
        let writer = ReportWriter::new(self.config.output_dir.clone());
        writer.write(&summary, &fonts)?;

        self.transition(RunState::Completed)?;

        info!(
            "Checks: {} passed, {} failed, {} new baseline(s), {} error(s) ({} ms)",
            summary.passed, summary.failed, summary.new_baselines, summary.errors, summary.duration_ms
        );

        Ok(summary)
    }

    /// Execute one (page, viewport) pair. Never returns an error: every
    /// failure mode lands in the result's outcome.
    async fn run_case(
        &self,
        driver: &BrowserDriver,
        visual: &VisualTester,
        screenshots_dir: &Path,
        reference_dir: &Path,
        fonts: &mut FontInventory,
        case: &CheckCase,
    ) -> CheckResult {
        let start = Instant::now();
        let key = case.key();
        let url = case.url(&self.config.base_url);
        let screenshot_path = screenshots_dir.join(format!("{key}.png"));

        let mut result = CheckResult::empty(case);

        let PageCapture { screenshot, fonts: page_fonts } =
            match driver.capture_page(&url, &case.viewport, &screenshot_path).await {
                Ok(capture) => capture,
                Err(e) => {
                    result.error = Some(e.to_string());
                    result.duration_ms = start.elapsed().as_millis() as u64;
                    return result;
                }
            };
        result.screenshot = Some(screenshot.display().to_string());
        fonts.record(&case.route, page_fonts);

        let comparison = match &self.config.reference_url {
            Some(reference_url) => {
                let reference_shot = reference_dir.join(format!("{key}.png"));
                let reference_page_url = case.url(reference_url);
                match driver
                    .capture_page(&reference_page_url, &case.viewport, &reference_shot)
                    .await
                {
                    Ok(reference_capture) => {
                        result.baseline = Some(reference_capture.screenshot.display().to_string());
                        visual.compare_against_reference(
                            &key,
                            &reference_capture.screenshot,
                            &screenshot,
                        )
                    }
                    Err(e) => {
                        result.error = Some(format!("reference capture failed: {e}"));
                        result.duration_ms = start.elapsed().as_millis() as u64;
                        return result;
                    }
                }
            }
            None => {
                let route_key = page_key(&case.route);
                result.baseline = Some(
                    visual
                        .baseline_path(&route_key, &case.viewport.name)
                        .display()
                        .to_string(),
                );
                visual.compare_against_baseline(&route_key, &case.viewport.name, &screenshot)
            }
        };

        match comparison {
            Ok(Comparison::Pass(diff)) => {
                result.outcome = CheckOutcome::Pass;
                result.diff_score = Some(diff.diff_score);
                result.diff_pixels = Some(diff.diff_pixels);
                result.total_pixels = Some(diff.total_pixels);
                result.diff_image = diff.diff_image.map(|p| p.display().to_string());
            }
            Ok(Comparison::Fail(diff)) => {
                result.outcome = CheckOutcome::Fail;
                result.diff_score = Some(diff.diff_score);
                result.diff_pixels = Some(diff.diff_pixels);
                result.total_pixels = Some(diff.total_pixels);
                result.diff_image = diff.diff_image.map(|p| p.display().to_string());
            }
            Ok(Comparison::NewBaseline { baseline }) => {
                result.outcome = CheckOutcome::NewBaseline;
                result.baseline = Some(baseline.display().to_string());
            }
            Err(e) => {
                result.error = Some(e.to_string());
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }
}
