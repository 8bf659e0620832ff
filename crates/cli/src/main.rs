//! Sitecheck CLI - Main Entry Point
//!
//! Single entry point for the visual regression workflow: provision the
//! browser environment, run every configured (page, viewport) check, write
//! the reports. No arguments are required; flags override the config file.
//!
//! Exit codes: 0 when every case passes or records a new baseline, 1 when
//! any case fails or errors, 2 on fatal errors (config, provisioning,
//! server startup, report writing).

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Parser;
use colored::Colorize;

use sitecheck_runner::config::RunConfig;
use sitecheck_runner::runner::{Runner, RunSummary};

mod output;

/// Visual regression checks for the site build
#[derive(Parser, Debug)]
#[command(name = "sitecheck")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the run configuration
    #[arg(short, long, default_value = "sitecheck.yaml")]
    config: PathBuf,

    /// Overwrite existing baselines with this run's captures
    #[arg(long)]
    update_baselines: bool,

    /// Recreate the provisioned environment from scratch
    #[arg(long)]
    force_provision: bool,

    /// Skip provisioning (environment known to be ready)
    #[arg(long)]
    skip_provision: bool,

    /// Override the configured diff threshold (0.0 - 1.0)
    #[arg(long)]
    threshold: Option<f64>,

    /// Override the configured base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Compare against this reference site instead of stored baselines
    #[arg(long)]
    reference_url: Option<String>,

    /// Check only these routes (repeatable)
    #[arg(long = "page")]
    pages: Vec<String>,

    /// Check only these viewports by name (repeatable)
    #[arg(long = "viewport")]
    viewports: Vec<String>,

    /// Override the output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match run(args).await {
        Ok(summary) => {
            if summary.all_green() {
                std::process::exit(0);
            } else {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            std::process::exit(2);
        }
    }
}

async fn run(args: Args) -> anyhow::Result<RunSummary> {
    let mut config = RunConfig::from_file(&args.config)?;
    apply_overrides(&mut config, &args)?;

    let mut runner = Runner::new(config);

    // Ctrl-C stops the run before the next page check; the report still
    // covers the completed cases.
    let cancel = runner.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let summary = runner.run().await?;
    output::print_summary(&summary);
    Ok(summary)
}

fn apply_overrides(config: &mut RunConfig, args: &Args) -> anyhow::Result<()> {
    if args.update_baselines {
        config.update_baselines = true;
    }
    if args.force_provision {
        config.force_provision = true;
    }
    if args.skip_provision {
        config.skip_provision = true;
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(reference_url) = &args.reference_url {
        config.reference_url = Some(reference_url.clone());
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if !args.pages.is_empty() {
        config.pages.retain(|route| args.pages.contains(route));
    }
    if !args.viewports.is_empty() {
        config
            .viewports
            .retain(|viewport| args.viewports.contains(&viewport.name));
    }

    // Filters and overrides can invalidate a config that parsed fine
    config.validate()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> RunConfig {
        RunConfig::from_yaml(
            r#"
pages: ["/", "/publications/"]
viewports:
  - { name: mobile, width: 375, height: 667 }
  - { name: desktop, width: 1440, height: 900 }
"#,
        )
        .unwrap()
    }

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["sitecheck"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_no_arguments_required() {
        let parsed = args(&[]);
        assert_eq!(parsed.config, PathBuf::from("sitecheck.yaml"));
        assert!(!parsed.update_baselines);
    }

    #[test]
    fn test_flag_overrides_apply() {
        let mut config = base_config();
        let parsed = args(&[
            "--threshold",
            "0.1",
            "--base-url",
            "http://localhost:9999",
            "--update-baselines",
        ]);
        apply_overrides(&mut config, &parsed).unwrap();
        assert_eq!(config.threshold, 0.1);
        assert_eq!(config.base_url, "http://localhost:9999");
        assert!(config.update_baselines);
    }

    #[test]
    fn test_page_and_viewport_filters() {
        let mut config = base_config();
        let parsed = args(&["--page", "/", "--viewport", "desktop"]);
        apply_overrides(&mut config, &parsed).unwrap();
        assert_eq!(config.pages, vec!["/".to_string()]);
        assert_eq!(config.viewports.len(), 1);
        assert_eq!(config.viewports[0].name, "desktop");
    }

    #[test]
    fn test_filter_matching_nothing_is_an_error() {
        let mut config = base_config();
        let parsed = args(&["--page", "/no-such-route/"]);
        assert!(apply_overrides(&mut config, &parsed).is_err());
    }

    #[test]
    fn test_out_of_range_threshold_override_is_an_error() {
        let mut config = base_config();
        let parsed = args(&["--threshold", "3.0"]);
        assert!(apply_overrides(&mut config, &parsed).is_err());
    }
}
