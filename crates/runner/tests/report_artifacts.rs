//! End-to-end report emission: a failing comparison produces a diff image
//! that lands embedded in the self-contained HTML report, alongside the
//! JSON results and font inventory.

use std::path::Path;

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

use sitecheck_runner::fonts::FontInventory;
use sitecheck_runner::report::ReportWriter;
use sitecheck_runner::runner::{CheckOutcome, CheckResult, RunSummary};
use sitecheck_runner::visual::{Comparison, VisualTester};

fn solid_png(path: &Path, color: [u8; 4]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    RgbaImage::from_pixel(32, 32, Rgba(color)).save(path).unwrap();
}

#[test]
fn test_failed_case_flows_into_self_contained_report() {
    let dir = TempDir::new().unwrap();
    let output_dir = dir.path().join("test-results");
    let tester = VisualTester::new(
        dir.path().join("baselines"),
        output_dir.join("diffs"),
        0.01,
        false,
    )
    .unwrap();

    // Baseline white, capture black: every pixel differs
    let baseline = dir.path().join("baselines/index/desktop.png");
    solid_png(&baseline, [255, 255, 255, 255]);
    let capture = dir.path().join("shots/index@desktop.png");
    solid_png(&capture, [0, 0, 0, 255]);

    let diff = match tester
        .compare_against_baseline("index", "desktop", &capture)
        .unwrap()
    {
        Comparison::Fail(diff) => diff,
        other => panic!("expected fail, got {other:?}"),
    };
    assert_eq!(diff.diff_pixels, 32 * 32);

    let result = CheckResult {
        route: "/".to_string(),
        viewport: "desktop".to_string(),
        outcome: CheckOutcome::Fail,
        diff_score: Some(diff.diff_score),
        diff_pixels: Some(diff.diff_pixels),
        total_pixels: Some(diff.total_pixels),
        screenshot: Some(capture.display().to_string()),
        baseline: Some(baseline.display().to_string()),
        diff_image: diff.diff_image.map(|p| p.display().to_string()),
        error: None,
        duration_ms: 12,
    };
    let summary = RunSummary::from_results(vec![result], false, 12);

    let mut fonts = FontInventory::new();
    fonts.record("/", vec!["Georgia, serif".to_string(), "monospace".to_string()]);

    let writer = ReportWriter::new(output_dir.clone());
    let html_path = writer.write(&summary, &fonts).unwrap();

    // The HTML report is one file: the diff thumbnail is inlined
    let html = std::fs::read_to_string(&html_path).unwrap();
    assert!(html.contains("data:image/png;base64,"));
    assert!(html.contains("1 failed"));
    assert!(html.contains("Georgia, serif"));

    // Machine-readable artifacts parse back
    let results: RunSummary =
        serde_json::from_str(&std::fs::read_to_string(output_dir.join("results.json")).unwrap())
            .unwrap();
    assert_eq!(results.failed, 1);
    assert_eq!(results.results.len(), 1);

    let fonts_json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output_dir.join("fonts.json")).unwrap())
            .unwrap();
    assert_eq!(fonts_json["pages"]["/"].as_array().unwrap().len(), 2);
}

#[test]
fn test_interrupted_partial_results_still_report() {
    let dir = TempDir::new().unwrap();

    // Two of four planned cases completed before cancellation
    let completed = vec![
        CheckResult {
            route: "/".to_string(),
            viewport: "mobile".to_string(),
            outcome: CheckOutcome::Pass,
            diff_score: Some(0.0),
            diff_pixels: Some(0),
            total_pixels: Some(1024),
            screenshot: None,
            baseline: None,
            diff_image: None,
            error: None,
            duration_ms: 9,
        },
        CheckResult {
            route: "/".to_string(),
            viewport: "desktop".to_string(),
            outcome: CheckOutcome::Error,
            diff_score: None,
            diff_pixels: None,
            total_pixels: None,
            screenshot: None,
            baseline: None,
            diff_image: None,
            error: Some("Navigation timed out after 30000 ms: http://x/".to_string()),
            duration_ms: 30_500,
        },
    ];
    let summary = RunSummary::from_results(completed, true, 31_000);

    let writer = ReportWriter::new(dir.path().to_path_buf());
    let html_path = writer.write(&summary, &FontInventory::new()).unwrap();

    let html = std::fs::read_to_string(html_path).unwrap();
    assert!(html.contains("interrupted"));
    assert!(html.contains("Navigation timed out"));

    let results: RunSummary =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("results.json")).unwrap())
            .unwrap();
    assert!(results.interrupted);
    assert_eq!(results.total, 2);
    assert_eq!(results.errors, 1);
}
