use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::types::{report_timestamp, SuiteReport};
use crate::runner::state::TestResult;

/// Writes suite reports as pretty-printed JSON to a fixed path
#[derive(Debug, Clone)]
pub struct ReportEmitter {
    path: PathBuf,
}

impl ReportEmitter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build the report for `ledger` and persist it
    pub fn emit(&self, ledger: &[TestResult]) -> Result<SuiteReport> {
        let report = SuiteReport::from_ledger(ledger, report_timestamp());
        self.write(&report)?;
        Ok(report)
    }

    pub fn write(&self, report: &SuiteReport) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("cannot create report directory {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("cannot write report {}", self.path.display()))?;
        log::info!("report written to {}", self.path.display());
        Ok(())
    }
}

/// Read a report written by [`ReportEmitter`]
pub fn load(path: &Path) -> Result<SuiteReport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read report {}", path.display()))?;
    let report = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a suite report", path.display()))?;
    Ok(report)
}
