//! Environment provisioning
//!
//! Materializes an isolated Node tools directory from the embedded
//! dependency manifest, installs the Playwright automation library into it,
//! and ensures the configured headless browser binary is downloaded into
//! Playwright's cache. Every step is idempotent: an existing `node_modules`
//! skips the dependency install unless `force` recreates it, and the
//! browser install is a no-op when the binary is already cached.
//!
//! Any failure here is fatal: the run halts before a single page check.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::browser::BrowserKind;
use crate::error::ProvisionError;

/// Dependency manifest written into the tools directory on first run
const PACKAGE_MANIFEST: &str = r#"{
  "name": "sitecheck-tools",
  "private": true,
  "dependencies": {
    "playwright": "~1.48.0"
  }
}
"#;

/// Provisions the browser automation environment
pub struct Provisioner {
    tools_dir: PathBuf,
    browser: BrowserKind,
    force: bool,
}

impl Provisioner {
    pub fn new(tools_dir: PathBuf, browser: BrowserKind, force: bool) -> Self {
        Self {
            tools_dir,
            browser,
            force,
        }
    }

    /// Ensure the tools environment exists with dependencies and the
    /// browser binary installed
    pub async fn ensure(&self) -> Result<(), ProvisionError> {
        self.check_node().await?;

        std::fs::create_dir_all(&self.tools_dir)?;
        let manifest = self.tools_dir.join("package.json");
        if !manifest.exists() {
            debug!("Writing dependency manifest to {}", manifest.display());
            std::fs::write(&manifest, PACKAGE_MANIFEST)?;
        }

        let node_modules = self.tools_dir.join("node_modules");
        if self.force && node_modules.exists() {
            info!("Recreating tools environment (--force-provision)");
            std::fs::remove_dir_all(&node_modules)?;
        }

        if node_modules.exists() {
            debug!("node_modules present, skipping dependency install");
        } else {
            self.npm_install().await?;
        }

        self.install_browser().await?;
        Ok(())
    }

    /// Verify the base runtime is available at all
    async fn check_node(&self) -> Result<(), ProvisionError> {
        let status = Command::new("node")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(ProvisionError::RuntimeUnavailable(format!(
                "`node --version` exited with {status}"
            ))),
            Err(e) => Err(ProvisionError::RuntimeUnavailable(e.to_string())),
        }
    }

    /// Install the automation library into the tools directory
    async fn npm_install(&self) -> Result<(), ProvisionError> {
        let subcommand = if self.tools_dir.join("package-lock.json").is_file() {
            "ci"
        } else {
            "install"
        };
        info!("Installing driver dependencies (npm {subcommand})");

        let output = Command::new("npm")
            .arg(subcommand)
            .current_dir(&self.tools_dir)
            .output()
            .await
            .map_err(|e| ProvisionError::DependencyInstall {
                dir: self.tools_dir.clone(),
                detail: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ProvisionError::DependencyInstall {
                dir: self.tools_dir.clone(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Download the headless browser binary into Playwright's cache
    async fn install_browser(&self) -> Result<(), ProvisionError> {
        info!("Ensuring {} binary is installed", self.browser);

        let output = Command::new("npx")
            .args(["playwright", "install", self.browser.as_str()])
            .current_dir(&self.tools_dir)
            .output()
            .await
            .map_err(|e| ProvisionError::BrowserInstall {
                browser: self.browser.to_string(),
                detail: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ProvisionError::BrowserInstall {
                browser: self.browser.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_pins_playwright() {
        let manifest: serde_json::Value = serde_json::from_str(PACKAGE_MANIFEST).unwrap();
        assert!(manifest["dependencies"]["playwright"].is_string());
        assert_eq!(manifest["private"], true);
    }
}
