//! Loading run configuration from disk

use tempfile::TempDir;

use sitecheck_runner::config::RunConfig;
use sitecheck_runner::error::ConfigError;

#[test]
fn test_load_project_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sitecheck.yaml");
    std::fs::write(
        &path,
        r#"
base_url: http://127.0.0.1:4040
pages:
  - /
  - /publications/
  - /research/
  - /software/
threshold: 0.02
server:
  command: ["python3", "-m", "http.server", "4040", "-d", "_site"]
  startup_timeout_secs: 15
"#,
    )
    .unwrap();

    let config = RunConfig::from_file(&path).unwrap();
    assert_eq!(config.pages.len(), 4);
    assert_eq!(config.threshold, 0.02);
    // Default viewport set applies when the file omits them
    assert_eq!(config.viewports.len(), 4);
    assert_eq!(config.plan().len(), 16);
    assert_eq!(config.server.unwrap().startup_timeout_secs, 15);
}

#[test]
fn test_missing_file_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    let err = RunConfig::from_file(&dir.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_malformed_yaml_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sitecheck.yaml");
    std::fs::write(&path, "pages: [unterminated\n").unwrap();

    let err = RunConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}
