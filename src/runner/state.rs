use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::utils::truncate_chars;

/// Longest error excerpt kept in a [`TestResult`]
pub const ERROR_EXCERPT_CHARS: usize = 100;

/// Final status of one test case
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Passed,
    Failed,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "PASSED",
            TestStatus::Failed => "FAILED",
        }
    }
}

/// Outcome of a single executed test case
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestResult {
    pub title: String,
    pub status: TestStatus,
    #[serde(default)]
    pub error: String,
}

impl TestResult {
    pub fn passed(title: &str) -> Self {
        Self {
            title: title.to_string(),
            status: TestStatus::Passed,
            error: String::new(),
        }
    }

    /// A failed result; the message is cut to [`ERROR_EXCERPT_CHARS`].
    pub fn failed(title: &str, error: &str) -> Self {
        Self {
            title: title.to_string(),
            status: TestStatus::Failed,
            error: truncate_chars(error, ERROR_EXCERPT_CHARS).to_string(),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Append-only ledger of test results.
///
/// Clones share the same ledger, so a progress reporter can hold one while
/// the orchestrator appends through another.
#[derive(Debug, Clone, Default)]
pub struct ResultRecorder {
    results: Arc<RwLock<Vec<TestResult>>>,
}

impl ResultRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock still holds a consistent Vec; push is the only writer.
    fn read(&self) -> RwLockReadGuard<'_, Vec<TestResult>> {
        self.results.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<TestResult>> {
        self.results.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn append(&self, result: TestResult) {
        self.write().push(result);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// (passed, failed) counts so far
    pub fn counts(&self) -> (usize, usize) {
        self.read().iter().fold((0, 0), |(p, f), r| match r.status {
            TestStatus::Passed => (p + 1, f),
            TestStatus::Failed => (p, f + 1),
        })
    }

    /// Copy of the ledger in append order
    pub fn snapshot(&self) -> Vec<TestResult> {
        self.read().clone()
    }
}
