//! Headless browser control via Playwright
//!
//! Each check case generates a small Node script that launches the browser,
//! navigates to the page, waits for network idle plus a settle delay,
//! captures a full-page screenshot and extracts the font families actually
//! computed on rendered elements. The script prints exactly one JSON result
//! line on stdout, which is parsed back here. The node process is scoped to
//! the case: it runs under a hard timeout and is killed on every exit path.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::config::Viewport;
use crate::error::PageLoadError;

/// Extra wall-clock budget for browser launch and screenshot encoding,
/// beyond the in-page navigation timeout
const DRIVER_GRACE_MS: u64 = 15_000;

/// Browser engine to drive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

impl std::fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful page check produced
#[derive(Debug, Clone)]
pub struct PageCapture {
    /// Full-page PNG written by the driver
    pub screenshot: PathBuf,

    /// De-duplicated `font-family` values computed on the page's elements
    pub fonts: BTreeSet<String>,
}

/// The driver script's single JSON result line
#[derive(Debug, Deserialize)]
struct DriverOutcome {
    success: bool,
    #[serde(default)]
    fonts: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Drives one headless browser session per check case
pub struct BrowserDriver {
    tools_dir: PathBuf,
    browser: BrowserKind,
    nav_timeout_ms: u64,
    settle_ms: u64,
}

impl BrowserDriver {
    pub fn new(tools_dir: PathBuf, browser: BrowserKind, nav_timeout_ms: u64, settle_ms: u64) -> Self {
        Self {
            tools_dir,
            browser,
            nav_timeout_ms,
            settle_ms,
        }
    }

    /// Navigate to `url` at the given viewport, write a full-page screenshot
    /// to `screenshot`, and return the fonts seen on the page.
    pub async fn capture_page(
        &self,
        url: &str,
        viewport: &Viewport,
        screenshot: &Path,
    ) -> Result<PageCapture, PageLoadError> {
        let screenshot = absolute(screenshot)?;
        if let Some(parent) = screenshot.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let script = self.build_script(url, viewport, &screenshot);
        let outcome = self.run_script(&script, url).await?;

        if !outcome.success {
            return Err(PageLoadError::Driver {
                url: url.to_string(),
                detail: outcome
                    .error
                    .unwrap_or_else(|| "unknown driver error".to_string()),
            });
        }
        if !screenshot.exists() {
            return Err(PageLoadError::Driver {
                url: url.to_string(),
                detail: "driver reported success but wrote no screenshot".to_string(),
            });
        }

        Ok(PageCapture {
            screenshot,
            fonts: outcome.fonts.into_iter().collect(),
        })
    }

    /// Build the Playwright script for one page check
    fn build_script(&self, url: &str, viewport: &Viewport, screenshot: &Path) -> String {
        format!(
            r#"const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  const browser = await {browser}.launch({{ headless: true }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  try {{
    await page.goto('{url}', {{ waitUntil: 'networkidle', timeout: {nav_timeout} }});
    await page.waitForTimeout({settle});
    const fonts = await page.evaluate(() => {{
      const seen = new Set();
      for (const el of document.querySelectorAll('*')) {{
        seen.add(window.getComputedStyle(el).fontFamily);
      }}
      return Array.from(seen);
    }});
    await page.screenshot({{ path: '{screenshot}', fullPage: true }});
    console.log(JSON.stringify({{ success: true, fonts }}));
  }} catch (error) {{
    console.log(JSON.stringify({{ success: false, error: String(error && error.message || error) }}));
    process.exitCode = 1;
  }} finally {{
    await browser.close();
  }}
}})();
"#,
            browser = self.browser.as_str(),
            width = viewport.width,
            height = viewport.height,
            url = js_escape(url),
            nav_timeout = self.nav_timeout_ms,
            settle = self.settle_ms,
            screenshot = js_escape(&screenshot.to_string_lossy()),
        )
    }

    /// Run the script with node and parse its JSON result line
    async fn run_script(&self, script: &str, url: &str) -> Result<DriverOutcome, PageLoadError> {
        let scratch = tempfile::tempdir()?;
        let script_path = scratch.path().join("check.js");
        std::fs::write(&script_path, script)?;

        debug!("Running driver script for {}", url);

        let mut cmd = Command::new("node");
        cmd.arg(&script_path)
            .env("NODE_PATH", self.tools_dir.join("node_modules"))
            .current_dir(scratch.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let budget_ms = self.nav_timeout_ms + self.settle_ms + DRIVER_GRACE_MS;
        let output = match tokio::time::timeout(Duration::from_millis(budget_ms), cmd.output()).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(PageLoadError::Timeout {
                    url: url.to_string(),
                    timeout_ms: budget_ms,
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let result_line = stdout
            .lines()
            .rev()
            .find(|line| line.trim_start().starts_with('{'));

        match result_line {
            Some(line) => Ok(serde_json::from_str(line)?),
            None if !output.status.success() => Err(PageLoadError::Driver {
                url: url.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
            None => Err(PageLoadError::NoResult {
                url: url.to_string(),
            }),
        }
    }
}

/// Escape a string for inclusion in single-quoted JS source
fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Resolve a path against the current directory without requiring it to
/// exist yet
fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
