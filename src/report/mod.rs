pub mod json;
pub mod junit;
pub mod types;

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

pub use json::ReportEmitter;
pub use types::SuiteReport;

/// Print the end-of-suite summary: pass count, rate and failed tests
pub fn print_summary(label: &str, report: &SuiteReport) {
    println!("\n{}", "=".repeat(60));
    println!(
        "{} {}: {}/{} passed ({})",
        "📊".to_string().blue(),
        label.bold(),
        report.passed.to_string().green(),
        report.total,
        report.pass_rate
    );

    if report.all_passed() {
        println!("{} All tests passed", "✓".green().bold());
    } else {
        println!("{} Failed tests:", "✗".red().bold());
        for result in report.failures() {
            println!("  - {}: {}", result.title, result.error);
        }
    }
    println!("{}", "=".repeat(60));
}

/// Re-render a persisted JSON report
pub fn generate_report(results_path: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let report = json::load(results_path)?;
    let suite_name = results_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.trim_end_matches("_test_results"))
        .unwrap_or("suite");

    match format {
        "junit" => {
            let dir = output.unwrap_or(Path::new("."));
            junit::write_report(&report, suite_name, dir)
        }
        "summary" => {
            print_summary(suite_name, &report);
            Ok(())
        }
        _ => anyhow::bail!("Unknown format: {}", format),
    }
}
