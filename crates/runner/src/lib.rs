//! Sitecheck visual regression runner
//!
//! This crate implements the whole visual-comparison workflow for a static
//! site build:
//! - Provisions an isolated Playwright environment with a headless browser
//! - Optionally spawns the site server and waits for it to become healthy
//! - Drives the browser over every configured (page, viewport) pair,
//!   capturing full-page screenshots and the fonts actually rendered
//! - Diffs captures against baseline screenshots (or a reference site)
//! - Emits an HTML report plus machine-readable JSON results
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Runner (sequential)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  NotStarted → Provisioning → Running → Reporting → Completed│
//! │                    │                                        │
//! │                    └→ Failed (fatal environment error)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Provisioner   - node + npm install + playwright install    │
//! │  SiteServer    - spawn serve command, health poll, teardown │
//! │  BrowserDriver - per-case node script: navigate, screenshot,│
//! │                  font extraction                            │
//! │  VisualTester  - baseline store, pixel diff, diff images    │
//! │  ReportWriter  - report.html, results.json, fonts.json      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Per-page failures are isolated: a navigation timeout or render error is
//! recorded as that case's result and the suite continues. Only environment
//! setup and report writing are fatal to the run as a whole.

pub mod browser;
pub mod config;
pub mod error;
pub mod fonts;
pub mod provision;
pub mod report;
pub mod runner;
pub mod server;
pub mod visual;

pub use config::RunConfig;
pub use error::{RunError, RunResult};
pub use runner::{Runner, RunSummary};
