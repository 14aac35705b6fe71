use crate::runner::state::{TestResult, TestStatus};
use serde::{Deserialize, Serialize};

/// Persisted summary of one suite run (or of several, combined)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuiteReport {
    pub date: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Whole percent with a trailing `%`, e.g. `"83%"`
    pub pass_rate: String,
    pub tests: Vec<TestResult>,
}

impl SuiteReport {
    pub fn from_ledger(ledger: &[TestResult], date: impl Into<String>) -> Self {
        let passed = ledger
            .iter()
            .filter(|r| r.status == TestStatus::Passed)
            .count();
        let total = ledger.len();
        Self {
            date: date.into(),
            total,
            passed,
            failed: total - passed,
            pass_rate: format_pass_rate(passed, total),
            tests: ledger.to_vec(),
        }
    }

    /// Merge reports in order into one, stamped with `date`
    pub fn combine<'a>(
        reports: impl IntoIterator<Item = &'a SuiteReport>,
        date: impl Into<String>,
    ) -> Self {
        let tests: Vec<TestResult> = reports
            .into_iter()
            .flat_map(|r| r.tests.iter().cloned())
            .collect();
        Self::from_ledger(&tests, date)
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// 0 when nothing failed, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.tests.iter().filter(|r| !r.is_passed())
    }
}

/// Integer percentage, rounded down; an empty run is `0%`
pub fn format_pass_rate(passed: usize, total: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{}%", passed * 100 / total)
}

/// Timestamp format used in persisted reports
pub fn report_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}
