//! Console report: one block per case, then a summary line.

use console::style;
use vd_harness::{CaseOutcome, CaseReport, RunSummary};

pub fn banner() -> String {
    format!("{}", style("-- vecdiff --").bold())
}

/// `- <file>` followed by the indented verdict and the case's wall time.
pub fn format_case(report: &CaseReport) -> String {
    let verdict = match &report.outcome {
        CaseOutcome::Passed => format!("{}", style("passed!").green()),
        CaseOutcome::Failed(reason) => {
            format!("{} ({})", style("failed!").red().bold(), reason)
        }
        CaseOutcome::Skipped(reason) => format!("{} ({})", style("skipped").yellow(), reason),
    };
    let elapsed = format!("[{:.2}s]", report.elapsed.as_secs_f64());
    format!("- {}\n\t{} {}", report.file_name(), verdict, style(elapsed).dim())
}

pub fn format_summary(summary: &RunSummary) -> String {
    let counts = format!(
        "{} passed, {} failed, {} skipped",
        summary.passed, summary.failed, summary.skipped
    );
    let counts = if summary.all_passed() {
        style(counts).green()
    } else {
        style(counts).red()
    };
    format!("{} test cases: {}", summary.total(), counts)
}

/// Print a finished case as a single write so parallel workers never interleave.
pub fn print_case(report: &CaseReport) {
    println!("{}", format_case(report));
}
