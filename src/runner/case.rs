use async_trait::async_trait;
use thiserror::Error;

use super::session::{AuthFailure, Session};
use crate::driver::traits::DriverError;

/// Why a test case failed
#[derive(Debug, Error)]
pub enum CaseError {
    /// Session or environment could not be set up; the body never ran
    #[error("SetupFailure: {0}")]
    Setup(String),

    #[error("AssertionFailure: {0}")]
    Assertion(String),

    #[error("InteractionTimeout: {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Transport or driver error that is not a timeout
    #[error("{0}")]
    Interaction(String),

    #[error("test case panicked: {0}")]
    Panicked(String),
}

impl CaseError {
    pub fn setup(reason: impl std::fmt::Display) -> Self {
        CaseError::Setup(reason.to_string())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CaseError::Timeout { .. })
    }
}

impl From<DriverError> for CaseError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Timeout {
                operation,
                timeout_ms,
            } => CaseError::Timeout {
                operation,
                timeout_ms,
            },
            DriverError::Other(e) => CaseError::Interaction(e.to_string()),
        }
    }
}

impl From<anyhow::Error> for CaseError {
    fn from(err: anyhow::Error) -> Self {
        CaseError::Interaction(err.to_string())
    }
}

impl From<AuthFailure> for CaseError {
    fn from(err: AuthFailure) -> Self {
        CaseError::Setup(err.to_string())
    }
}

pub type CaseResult = std::result::Result<(), CaseError>;

/// Fail with an assertion error unless `condition` holds
#[macro_export]
macro_rules! ensure_that {
    ($condition:expr, $($arg:tt)+) => {
        if !$condition {
            return Err($crate::runner::case::CaseError::Assertion(format!($($arg)+)));
        }
    };
}

/// A named unit of work run against one scoped environment of type `E`
#[async_trait]
pub trait TestCase<E: Send + Sync>: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the case needs the suite session; such cases are failed with
    /// a setup error when the session could not be established.
    fn requires_session(&self) -> bool {
        true
    }

    /// Exercise the system under test and assert on what it shows
    async fn run(&self, session: Option<&Session>, env: &E) -> CaseResult;

    /// Best-effort teardown of anything `run` created beyond the
    /// environment itself. Called after the result is recorded; errors are
    /// only logged.
    async fn cleanup(&self, _session: Option<&Session>, _env: &E) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Pull the session out or fail with a setup error
pub fn require_session(session: Option<&Session>) -> Result<&Session, CaseError> {
    session.ok_or_else(|| CaseError::setup("no authenticated session available"))
}

/// A test case registered in a suite
pub struct TestCaseDescriptor<E: Send + Sync> {
    pub name: String,
    pub ordinal: usize,
    pub case: Box<dyn TestCase<E>>,
}

#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("test case '{0}' is already registered in suite '{1}'")]
    DuplicateName(String, String),
}

/// Ordered collection of test cases sharing one session and one ledger
pub struct Suite<E: Send + Sync> {
    name: String,
    cases: Vec<TestCaseDescriptor<E>>,
}

impl<E: Send + Sync> Suite<E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a case; names must be unique within the suite
    pub fn register<C>(&mut self, case: C) -> Result<&mut Self, SuiteError>
    where
        C: TestCase<E> + 'static,
    {
        let name = case.name().to_string();
        if self.cases.iter().any(|d| d.name == name) {
            return Err(SuiteError::DuplicateName(name, self.name.clone()));
        }
        let ordinal = self.cases.len();
        self.cases.push(TestCaseDescriptor {
            name,
            ordinal,
            case: Box::new(case),
        });
        Ok(self)
    }

    pub fn cases(&self) -> &[TestCaseDescriptor<E>] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn requires_session(&self) -> bool {
        self.cases.iter().any(|d| d.case.requires_session())
    }
}
