//! Report generation
//!
//! Writes three artifacts into the output directory:
//! - `results.json` - the machine-readable run summary
//! - `fonts.json`   - the font-detection report, keyed by route
//! - `report.html`  - a self-contained human-readable report with inline
//!   base64 diff thumbnails
//!
//! Partial result sets render fine: failed cases, page errors and missing
//! baselines all get rows, and an interrupted run is flagged in the header.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use tracing::{info, warn};

use crate::error::ReportError;
use crate::fonts::FontInventory;
use crate::runner::{CheckOutcome, CheckResult, RunSummary};

/// Writes run artifacts into the output directory
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    /// Write all report artifacts; returns the HTML report path
    pub fn write(
        &self,
        summary: &RunSummary,
        fonts: &FontInventory,
    ) -> Result<PathBuf, ReportError> {
        std::fs::create_dir_all(&self.output_dir)?;

        let results_path = self.output_dir.join("results.json");
        std::fs::write(&results_path, serde_json::to_string_pretty(summary)?)?;

        let fonts_path = self.output_dir.join("fonts.json");
        std::fs::write(&fonts_path, serde_json::to_string_pretty(fonts)?)?;

        let html_path = self.output_dir.join("report.html");
        std::fs::write(&html_path, render_html(summary, fonts))?;

        info!("Report written to {}", html_path.display());
        Ok(html_path)
    }
}

fn render_html(summary: &RunSummary, fonts: &FontInventory) -> String {
    let mut html = String::new();
    html.push_str(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Visual regression report</title>\n<style>\n\
         body { font-family: system-ui, sans-serif; margin: 2rem; color: #222; }\n\
         table { border-collapse: collapse; width: 100%; }\n\
         th, td { border: 1px solid #ccc; padding: 0.4rem 0.6rem; text-align: left; vertical-align: top; }\n\
         th { background: #f4f4f4; }\n\
         .pass { color: #1a7f37; font-weight: 600; }\n\
         .fail { color: #c41e3a; font-weight: 600; }\n\
         .new_baseline { color: #0969da; font-weight: 600; }\n\
         .error { color: #9a6700; font-weight: 600; }\n\
         .counts span { margin-right: 1.5rem; }\n\
         .thumb { max-width: 320px; max-height: 200px; border: 1px solid #999; }\n\
         .interrupted { color: #c41e3a; }\n\
         code { background: #f4f4f4; padding: 0 0.2rem; }\n\
         </style>\n</head>\n<body>\n",
    );

    html.push_str("<h1>Visual regression report</h1>\n");
    html.push_str(&format!(
        "<p>Generated {} &middot; {} ms</p>\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        summary.duration_ms
    ));
    if summary.interrupted {
        html.push_str("<p class=\"interrupted\">Run was interrupted - partial results below.</p>\n");
    }

    html.push_str(&format!(
        "<p class=\"counts\"><span class=\"pass\">{} passed</span>\
         <span class=\"fail\">{} failed</span>\
         <span class=\"new_baseline\">{} new baseline</span>\
         <span class=\"error\">{} errors</span><span>{} total</span></p>\n",
        summary.passed, summary.failed, summary.new_baselines, summary.errors, summary.total
    ));

    html.push_str("<h2>Checks</h2>\n");
    if summary.results.is_empty() {
        html.push_str("<p>No checks were executed.</p>\n");
    } else {
        html.push_str(
            "<table>\n<tr><th>Page</th><th>Viewport</th><th>Outcome</th>\
             <th>Diff</th><th>Detail</th></tr>\n",
        );
        for result in &summary.results {
            html.push_str(&result_row(result));
        }
        html.push_str("</table>\n");
    }

    html.push_str("<h2>Fonts detected</h2>\n");
    if fonts.is_empty() {
        html.push_str("<p>No fonts were detected.</p>\n");
    } else {
        html.push_str("<ul>\n");
        for (route, families) in &fonts.pages {
            html.push_str(&format!("<li><code>{}</code><ul>\n", escape_html(route)));
            for family in families {
                html.push_str(&format!("<li>{}</li>\n", escape_html(family)));
            }
            html.push_str("</ul></li>\n");
        }
        html.push_str("</ul>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn result_row(result: &CheckResult) -> String {
    let (class, label) = match result.outcome {
        CheckOutcome::Pass => ("pass", "pass"),
        CheckOutcome::Fail => ("fail", "fail"),
        CheckOutcome::NewBaseline => ("new_baseline", "new baseline"),
        CheckOutcome::Error => ("error", "error"),
    };

    let diff_cell = match result.diff_score {
        Some(score) => format!(
            "{:.4} ({} / {} px)",
            score,
            result.diff_pixels.unwrap_or_default(),
            result.total_pixels.unwrap_or_default()
        ),
        None => "&ndash;".to_string(),
    };

    let mut detail = String::new();
    if let Some(error) = &result.error {
        detail.push_str(&format!("<p>{}</p>", escape_html(error)));
    }
    if let Some(diff_image) = &result.diff_image {
        match embed_png(Path::new(diff_image)) {
            Some(data_uri) => detail.push_str(&format!(
                "<img class=\"thumb\" alt=\"diff for {}\" src=\"{}\">",
                escape_html(&result.route),
                data_uri
            )),
            None => detail.push_str(&format!(
                "<p>diff image: <code>{}</code></p>",
                escape_html(diff_image)
            )),
        }
    }
    if detail.is_empty() {
        detail.push_str("&ndash;");
    }

    format!(
        "<tr><td><code>{}</code></td><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td></tr>\n",
        escape_html(&result.route),
        escape_html(&result.viewport),
        class,
        label,
        diff_cell,
        detail
    )
}

/// Inline a PNG as a data URI so the report stays a single file
fn embed_png(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(format!("data:image/png;base64,{}", STANDARD.encode(bytes))),
        Err(e) => {
            warn!("Could not embed {}: {}", path.display(), e);
            None
        }
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn result(route: &str, outcome: CheckOutcome) -> CheckResult {
        CheckResult {
            route: route.to_string(),
            viewport: "desktop".to_string(),
            outcome,
            diff_score: match outcome {
                CheckOutcome::Pass => Some(0.0),
                CheckOutcome::Fail => Some(0.25),
                _ => None,
            },
            diff_pixels: None,
            total_pixels: None,
            screenshot: None,
            baseline: None,
            diff_image: None,
            error: match outcome {
                CheckOutcome::Error => Some("navigation timed out".to_string()),
                _ => None,
            },
            duration_ms: 42,
        }
    }

    #[test]
    fn test_write_emits_all_three_artifacts() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(dir.path().to_path_buf());

        let summary = RunSummary::from_results(
            vec![
                result("/", CheckOutcome::Pass),
                result("/publications/", CheckOutcome::Fail),
                result("/talks/", CheckOutcome::NewBaseline),
                result("/service/", CheckOutcome::Error),
            ],
            false,
            100,
        );
        let mut fonts = FontInventory::new();
        fonts.record("/", vec!["Georgia, serif".to_string()]);

        let html_path = writer.write(&summary, &fonts).unwrap();
        assert!(html_path.exists());
        assert!(dir.path().join("results.json").exists());
        assert!(dir.path().join("fonts.json").exists());

        let html = std::fs::read_to_string(&html_path).unwrap();
        assert!(html.contains("1 passed"));
        assert!(html.contains("1 failed"));
        assert!(html.contains("new baseline"));
        assert!(html.contains("navigation timed out"));
        assert!(html.contains("Georgia, serif"));

        // One row per configured case
        assert_eq!(html.matches("<tr><td>").count(), 4);
    }

    #[test]
    fn test_results_json_round_trips() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(dir.path().to_path_buf());
        let summary =
            RunSummary::from_results(vec![result("/", CheckOutcome::Pass)], true, 7);
        writer.write(&summary, &FontInventory::new()).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("results.json")).unwrap();
        let parsed: RunSummary = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.total, 1);
        assert!(parsed.interrupted);
        assert_eq!(parsed.results[0].route, "/");
    }

    #[test]
    fn test_empty_run_still_renders() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(dir.path().to_path_buf());
        let summary = RunSummary::from_results(vec![], false, 0);

        let html_path = writer.write(&summary, &FontInventory::new()).unwrap();
        let html = std::fs::read_to_string(html_path).unwrap();
        assert!(html.contains("No checks were executed"));
        assert!(html.contains("No fonts were detected"));
    }

    #[test]
    fn test_missing_diff_image_degrades_to_path() {
        let mut failed = result("/", CheckOutcome::Fail);
        failed.diff_image = Some("/nowhere/diff.png".to_string());
        let row = result_row(&failed);
        assert!(row.contains("/nowhere/diff.png"));
        assert!(!row.contains("data:image/png"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>&\"x\"</script>"),
            "&lt;script&gt;&amp;&quot;x&quot;&lt;/script&gt;"
        );
    }
}
