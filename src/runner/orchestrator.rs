//! Sequential suite execution with per-test failure isolation.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use super::case::{CaseError, CaseResult, Suite, TestCase, TestCaseDescriptor};
use super::environment::EnvironmentFactory;
use super::events::{EventEmitter, TestEvent};
use super::session::{Authenticator, Credentials, Session};
use super::state::{ResultRecorder, TestResult};
use crate::report::json::ReportEmitter;
use crate::report::types::SuiteReport;

/// Lifecycle of one suite run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteState {
    NotStarted,
    Running,
    Completed,
}

/// How often a case that failed on an interaction timeout is tried again.
/// Zero keeps the single-attempt behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout_retries: u32,
}

pub struct SuiteOrchestrator<F: EnvironmentFactory> {
    suite: Suite<F::Env>,
    factory: F,
    authenticator: Option<(Box<dyn Authenticator>, Credentials)>,
    recorder: ResultRecorder,
    emitter: EventEmitter,
    retry: RetryPolicy,
    state: SuiteState,
}

impl<F: EnvironmentFactory> SuiteOrchestrator<F> {
    pub fn new(suite: Suite<F::Env>, factory: F) -> Self {
        Self {
            suite,
            factory,
            authenticator: None,
            recorder: ResultRecorder::new(),
            emitter: EventEmitter::default(),
            retry: RetryPolicy::default(),
            state: SuiteState::NotStarted,
        }
    }

    pub fn with_authenticator<A>(mut self, authenticator: A, credentials: Credentials) -> Self
    where
        A: Authenticator + 'static,
    {
        self.authenticator = Some((Box::new(authenticator), credentials));
        self
    }

    pub fn with_emitter(mut self, emitter: EventEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn name(&self) -> &str {
        self.suite.name()
    }

    pub fn state(&self) -> SuiteState {
        self.state
    }

    /// Shared handle on the ledger, usable while the suite runs
    pub fn recorder(&self) -> ResultRecorder {
        self.recorder.clone()
    }

    /// Run every registered case once, in registration order, and return
    /// the ledger. A suite only runs once; later calls return the ledger.
    pub async fn run(&mut self) -> Vec<TestResult> {
        if self.state != SuiteState::NotStarted {
            log::warn!("suite '{}' already ran", self.suite.name());
            return self.recorder.snapshot();
        }

        self.emitter.emit(TestEvent::SuiteStarted {
            suite: self.suite.name().to_string(),
            case_count: self.suite.len(),
        });

        let session = if self.suite.requires_session() {
            Some(self.establish_session().await)
        } else {
            None
        };

        for descriptor in self.suite.cases() {
            self.state = SuiteState::Running;
            self.execute(descriptor, session.as_ref()).await;
        }
        self.state = SuiteState::Completed;

        let (passed, failed) = self.recorder.counts();
        self.emitter.emit(TestEvent::SuiteFinished {
            suite: self.suite.name().to_string(),
            passed,
            failed,
        });

        self.recorder.snapshot()
    }

    /// Run the suite and hand its ledger to `reporter`
    pub async fn run_and_report(&mut self, reporter: &ReportEmitter) -> anyhow::Result<SuiteReport> {
        let ledger = self.run().await;
        reporter.emit(&ledger)
    }

    async fn establish_session(&self) -> Result<Session, String> {
        let suite = self.suite.name().to_string();
        let Some((authenticator, credentials)) = &self.authenticator else {
            let reason = "no authenticator configured".to_string();
            self.emitter.emit(TestEvent::SessionFailed {
                suite,
                error: reason.clone(),
            });
            return Err(reason);
        };

        let outcome = AssertUnwindSafe(authenticator.establish(credentials))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(super::session::AuthFailure::NotAuthenticated(format!(
                    "authenticator panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });

        match outcome {
            Ok(session) => {
                self.emitter.emit(TestEvent::SessionEstablished {
                    suite,
                    identifier: session.identifier.clone(),
                });
                Ok(session)
            }
            Err(e) => {
                log::warn!("suite '{}': session not established: {}", suite, e);
                let reason = e.to_string();
                self.emitter.emit(TestEvent::SessionFailed {
                    suite,
                    error: reason.clone(),
                });
                Err(reason)
            }
        }
    }

    async fn execute(
        &self,
        descriptor: &TestCaseDescriptor<F::Env>,
        session: Option<&Result<Session, String>>,
    ) {
        let started = Instant::now();
        let case = descriptor.case.as_ref();
        self.emitter.emit(TestEvent::CaseStarted {
            suite: self.suite.name().to_string(),
            ordinal: descriptor.ordinal,
            name: descriptor.name.clone(),
        });

        let session = if case.requires_session() {
            match session {
                Some(Ok(session)) => Some(session),
                Some(Err(reason)) => {
                    let err = CaseError::setup(format!("session unavailable: {}", reason));
                    self.record(descriptor, &Err(err), started);
                    return;
                }
                None => {
                    let err = CaseError::setup("session was never established");
                    self.record(descriptor, &Err(err), started);
                    return;
                }
            }
        } else {
            None
        };

        let max_attempts = self.retry.timeout_retries + 1;
        let mut attempt = 1;
        loop {
            let acquired = AssertUnwindSafe(self.factory.acquire(session))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(CaseError::setup(format!(
                        "environment acquisition panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                });
            let env = match acquired {
                Ok(env) => env,
                Err(e) => {
                    self.record(descriptor, &Err(e), started);
                    return;
                }
            };

            let outcome = run_guarded(case, session, &env).await;
            let retry = matches!(&outcome, Err(e) if e.is_timeout()) && attempt < max_attempts;
            if !retry {
                self.record(descriptor, &outcome, started);
            }

            self.cleanup(case, session, &env).await;
            self.release(&descriptor.name, env).await;

            if !retry {
                return;
            }
            attempt += 1;
            self.emitter.emit(TestEvent::CaseRetrying {
                suite: self.suite.name().to_string(),
                name: descriptor.name.clone(),
                attempt,
                max_attempts,
            });
        }
    }

    async fn release(&self, name: &str, env: F::Env) {
        let outcome = AssertUnwindSafe(self.factory.release(env))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(anyhow::anyhow!("release panicked: {}", panic_message(panic.as_ref())))
            });
        if let Err(e) = outcome {
            log::warn!("releasing environment of '{}' failed: {:#}", name, e);
        }
    }

    async fn cleanup(&self, case: &dyn TestCase<F::Env>, session: Option<&Session>, env: &F::Env) {
        let outcome = AssertUnwindSafe(case.cleanup(session, env))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(anyhow::anyhow!("cleanup panicked: {}", panic_message(panic.as_ref())))
            });

        if let Err(e) = outcome {
            log::warn!("cleanup of '{}' failed: {:#}", case.name(), e);
            self.emitter.emit(TestEvent::CleanupFailed {
                suite: self.suite.name().to_string(),
                name: case.name().to_string(),
                error: format!("{:#}", e),
            });
        }
    }

    fn record(&self, descriptor: &TestCaseDescriptor<F::Env>, outcome: &CaseResult, started: Instant) {
        let duration_ms = started.elapsed().as_millis() as u64;
        let suite = self.suite.name().to_string();
        match outcome {
            Ok(()) => {
                self.recorder.append(TestResult::passed(&descriptor.name));
                self.emitter.emit(TestEvent::CasePassed {
                    suite,
                    ordinal: descriptor.ordinal,
                    name: descriptor.name.clone(),
                    duration_ms,
                });
            }
            Err(e) => {
                let message = e.to_string();
                log::debug!("'{}' failed: {}", descriptor.name, message);
                self.recorder
                    .append(TestResult::failed(&descriptor.name, &message));
                self.emitter.emit(TestEvent::CaseFailed {
                    suite,
                    ordinal: descriptor.ordinal,
                    name: descriptor.name.clone(),
                    error: message,
                    duration_ms,
                });
            }
        }
    }
}

/// Run the case body, turning a panic into a failure
async fn run_guarded<E: Send + Sync>(
    case: &dyn TestCase<E>,
    session: Option<&Session>,
    env: &E,
) -> CaseResult {
    match AssertUnwindSafe(case.run(session, env)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(CaseError::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
