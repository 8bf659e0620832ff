//! Terminal summary output

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

use sitecheck_runner::runner::{CheckOutcome, CheckResult, RunSummary};

/// Print the per-case table and the aggregate line
pub fn print_summary(summary: &RunSummary) {
    if !summary.results.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.set_header(vec!["Page", "Viewport", "Outcome", "Diff", "Detail"]);
        for result in &summary.results {
            table.add_row(vec![
                result.route.clone(),
                result.viewport.clone(),
                outcome_cell(result.outcome),
                diff_cell(result),
                detail_cell(result),
            ]);
        }
        println!("{table}");
    }

    let verdict = if summary.all_green() {
        "OK".green().bold()
    } else {
        "FAILED".red().bold()
    };
    println!(
        "{}: {} passed, {} failed, {} new baseline(s), {} error(s) ({} ms)",
        verdict,
        summary.passed,
        summary.failed,
        summary.new_baselines,
        summary.errors,
        summary.duration_ms
    );

    if summary.interrupted {
        println!("{}", "Run was interrupted - results are partial".yellow());
    }
}

fn outcome_cell(outcome: CheckOutcome) -> String {
    match outcome {
        CheckOutcome::Pass => "pass".green().to_string(),
        CheckOutcome::Fail => "fail".red().bold().to_string(),
        CheckOutcome::NewBaseline => "new baseline".blue().to_string(),
        CheckOutcome::Error => "error".yellow().to_string(),
    }
}

fn diff_cell(result: &CheckResult) -> String {
    match result.diff_score {
        Some(score) => format!("{score:.4}"),
        None => "-".to_string(),
    }
}

fn detail_cell(result: &CheckResult) -> String {
    if let Some(error) = &result.error {
        return error.clone();
    }
    if let Some(diff_image) = &result.diff_image {
        return diff_image.clone();
    }
    "-".to_string()
}
