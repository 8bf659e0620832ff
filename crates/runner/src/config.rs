//! Run configuration loaded from `sitecheck.yaml`
//!
//! The config is an explicit value handed to the [`crate::runner::Runner`];
//! nothing in the workflow reads ambient state. Every field except `pages`
//! carries a default so a minimal file is enough to get going:
//!
//! ```yaml
//! base_url: http://127.0.0.1:4040
//! pages:
//!   - /
//!   - /publications/
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::browser::BrowserKind;
use crate::error::ConfigError;

/// A complete run configuration parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Base URL of the site under test (local build or live deployment)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Optional reference site. When set, each case is compared against a
    /// fresh capture of the same route from this URL instead of the stored
    /// baseline (local-build vs. production mode).
    #[serde(default)]
    pub reference_url: Option<String>,

    /// Page routes to check
    pub pages: Vec<String>,

    /// Viewports to render each page at
    #[serde(default = "default_viewports")]
    pub viewports: Vec<Viewport>,

    /// Differing-pixel fraction at or above which a case fails (0.0 - 1.0)
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Navigation timeout per page, in milliseconds
    #[serde(default = "default_nav_timeout_ms")]
    pub nav_timeout_ms: u64,

    /// Extra settle delay after network idle, in milliseconds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Directory holding baseline screenshots
    #[serde(default = "default_baseline_dir")]
    pub baseline_dir: PathBuf,

    /// Directory receiving screenshots, diff images and reports
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory for the provisioned Node/Playwright environment
    #[serde(default = "default_tools_dir")]
    pub tools_dir: PathBuf,

    /// Browser engine to drive
    #[serde(default)]
    pub browser: BrowserKind,

    /// Overwrite existing baselines with this run's captures
    #[serde(default)]
    pub update_baselines: bool,

    /// Recreate the provisioned environment from scratch
    #[serde(default)]
    pub force_provision: bool,

    /// Skip provisioning entirely (environment known to be ready)
    #[serde(default)]
    pub skip_provision: bool,

    /// Optional command serving the built site; when absent the base URL is
    /// probed once and assumed live
    #[serde(default)]
    pub server: Option<ServerSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

/// Command serving the built site during the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSpec {
    /// Program and arguments, e.g. `["python3", "-m", "http.server", "4040"]`
    pub command: Vec<String>,

    /// Path probed for readiness, relative to the base URL
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Seconds to wait for the server to become healthy
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:4040".to_string()
}

fn default_viewports() -> Vec<Viewport> {
    vec![
        Viewport { name: "mobile".into(), width: 375, height: 667 },
        Viewport { name: "tablet".into(), width: 768, height: 1024 },
        Viewport { name: "desktop".into(), width: 1440, height: 900 },
        Viewport { name: "wide".into(), width: 1920, height: 1080 },
    ]
}

fn default_threshold() -> f64 {
    0.01 // 1% of pixels may differ before a case fails
}

fn default_nav_timeout_ms() -> u64 {
    30_000
}

fn default_settle_ms() -> u64 {
    500
}

fn default_baseline_dir() -> PathBuf {
    PathBuf::from("baselines")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("test-results")
}

fn default_tools_dir() -> PathBuf {
    PathBuf::from("tools/playwright")
}

fn default_health_path() -> String {
    "/".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    30
}

impl RunConfig {
    /// Parse a config from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pages.is_empty() {
            return Err(ConfigError::Invalid("no pages configured".into()));
        }
        if self.viewports.is_empty() {
            return Err(ConfigError::Invalid("no viewports configured".into()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::Invalid(format!(
                "threshold must be within 0.0..=1.0, got {}",
                self.threshold
            )));
        }
        for viewport in &self.viewports {
            if viewport.width == 0 || viewport.height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "viewport '{}' has a zero dimension",
                    viewport.name
                )));
            }
        }
        if let Some(server) = &self.server {
            if server.command.is_empty() {
                return Err(ConfigError::Invalid("server.command is empty".into()));
            }
        }
        Ok(())
    }

    /// The run plan: every configured page at every configured viewport, in
    /// configuration order
    pub fn plan(&self) -> Vec<CheckCase> {
        let mut cases = Vec::with_capacity(self.pages.len() * self.viewports.len());
        for route in &self.pages {
            for viewport in &self.viewports {
                cases.push(CheckCase {
                    route: route.clone(),
                    viewport: viewport.clone(),
                });
            }
        }
        cases
    }
}

/// One (page, viewport) pair - the unit of execution and reporting
#[derive(Debug, Clone)]
pub struct CheckCase {
    pub route: String,
    pub viewport: Viewport,
}

impl CheckCase {
    /// Stable identifier used in filenames and report rows,
    /// e.g. `publications@desktop`
    pub fn key(&self) -> String {
        format!("{}@{}", page_key(&self.route), self.viewport.name)
    }

    /// Full URL of this case's page under the given base
    pub fn url(&self, base_url: &str) -> String {
        join_url(base_url, &self.route)
    }
}

/// Derive a stable filesystem key from a page route.
///
/// `/` maps to `index`, directory routes drop their slashes
/// (`/publications/` -> `publications`), nested routes flatten with `_`
/// (`/a/b/` -> `a_b`), and explicit `index.html`/`.html` suffixes are
/// stripped.
pub fn page_key(route: &str) -> String {
    let mut trimmed = route.trim().trim_start_matches('/').trim_end_matches('/');
    if let Some(stripped) = trimmed.strip_suffix("index.html") {
        trimmed = stripped.trim_end_matches('/');
    } else if let Some(stripped) = trimmed.strip_suffix(".html") {
        trimmed = stripped;
    }
    if trimmed.is_empty() {
        return "index".to_string();
    }
    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Join a base URL and a route without doubling slashes
pub fn join_url(base_url: &str, route: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        route.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let yaml = r#"
pages:
  - /
  - /publications/
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:4040");
        assert_eq!(config.viewports.len(), 4);
        assert_eq!(config.threshold, 0.01);
        assert_eq!(config.nav_timeout_ms, 30_000);
        assert!(config.reference_url.is_none());
        assert!(config.server.is_none());
    }

    #[test]
    fn test_full_config_parses() {
        let yaml = r#"
base_url: http://localhost:8080
reference_url: https://example.github.io
pages:
  - /
threshold: 0.05
viewports:
  - name: desktop
    width: 1440
    height: 900
server:
  command: ["python3", "-m", "http.server", "8080"]
  startup_timeout_secs: 10
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.reference_url.as_deref(), Some("https://example.github.io"));
        assert_eq!(config.viewports.len(), 1);
        let server = config.server.unwrap();
        assert_eq!(server.command[0], "python3");
        assert_eq!(server.health_path, "/");
        assert_eq!(server.startup_timeout_secs, 10);
    }

    #[test]
    fn test_rejects_empty_pages() {
        let yaml = "pages: []\n";
        assert!(matches!(
            RunConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let yaml = "pages: [\"/\"]\nthreshold: 2.0\n";
        assert!(matches!(
            RunConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_page_key_derivation() {
        assert_eq!(page_key("/"), "index");
        assert_eq!(page_key(""), "index");
        assert_eq!(page_key("/publications/"), "publications");
        assert_eq!(page_key("/short-courses/"), "short-courses");
        assert_eq!(page_key("/a/b/"), "a_b");
        assert_eq!(page_key("index.html"), "index");
        assert_eq!(page_key("publications/index.html"), "publications");
        assert_eq!(page_key("talks.html"), "talks");
    }

    #[test]
    fn test_plan_is_full_cross_product() {
        let yaml = r#"
pages: ["/", "/publications/"]
viewports:
  - { name: small, width: 375, height: 667 }
  - { name: large, width: 1440, height: 900 }
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        let plan = config.plan();
        assert_eq!(plan.len(), 4);
        assert_eq!(plan[0].key(), "index@small");
        assert_eq!(plan[3].key(), "publications@large");
    }

    #[test]
    fn test_url_join() {
        assert_eq!(join_url("http://x:1/", "/p/"), "http://x:1/p/");
        assert_eq!(join_url("http://x:1", "p"), "http://x:1/p");
    }
}
