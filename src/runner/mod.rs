pub mod case;
pub mod environment;
pub mod events;
pub mod orchestrator;
pub mod session;
pub mod state;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use case::{CaseError, CaseResult, Suite, SuiteError, TestCase};
pub use environment::{EnvironmentFactory, UiTimeouts};
pub use events::*;
pub use orchestrator::{RetryPolicy, SuiteOrchestrator, SuiteState};
pub use session::{Authenticator, Credentials, Session};
pub use state::*;

use crate::driver::traits::{BrowserDriver, HttpClient};
use crate::driver::web::{UnavailableBrowser, WebDriver, WebDriverConfig};
use crate::driver::ReqwestClient;
use crate::report::{self, junit, ReportEmitter, SuiteReport};
use crate::suites;
use crate::utils::Config;
use environment::{ApiEnvironmentFactory, UiEnvironmentFactory};
use session::{FormLoginAuthenticator, TokenAuthenticator};

pub const COMBINED_REPORT_FILE: &str = "combined_test_results.json";

/// The suites this binary knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteKind {
    Ui,
    Api,
}

impl SuiteKind {
    pub fn name(&self) -> &'static str {
        match self {
            SuiteKind::Ui => "ui",
            SuiteKind::Api => "api",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SuiteKind::Ui => "UI",
            SuiteKind::Api => "API",
        }
    }

    pub fn report_file(&self) -> String {
        format!("{}_test_results.json", self.name())
    }
}

/// Where reports go and how suites are scheduled
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    pub junit: bool,
    /// Run independent suites at the same time
    pub concurrent: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("tmp"),
            junit: false,
            concurrent: false,
        }
    }
}

/// Run the requested suites, persist their reports and return the report
/// that decides the exit code (the combined one when several suites ran).
pub async fn run_suites(
    kinds: &[SuiteKind],
    config: &Config,
    options: &RunOptions,
) -> Result<SuiteReport> {
    let (emitter, receiver) = EventEmitter::new();
    let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

    let outcomes = if options.concurrent && kinds.len() > 1 {
        let runs = kinds
            .iter()
            .map(|kind| run_suite(*kind, config, options, emitter.clone()));
        futures::future::join_all(runs).await
    } else {
        let mut outcomes = Vec::with_capacity(kinds.len());
        for kind in kinds {
            outcomes.push(run_suite(*kind, config, options, emitter.clone()).await);
        }
        outcomes
    };

    // Listener exits once every sender is gone
    drop(emitter);
    if let Err(e) = listener.await {
        log::warn!("progress listener stopped abnormally: {}", e);
    }

    let mut reports = Vec::with_capacity(kinds.len());
    for (kind, outcome) in kinds.iter().zip(outcomes) {
        let report = outcome?;
        report::print_summary(kind.label(), &report);
        if options.junit {
            junit::write_report(&report, kind.name(), &options.output_dir)?;
        }
        reports.push(report);
    }

    match reports.len() {
        0 => anyhow::bail!("no suite selected"),
        1 => Ok(reports.remove(0)),
        _ => {
            let combined = SuiteReport::combine(&reports, report::types::report_timestamp());
            ReportEmitter::new(options.output_dir.join(COMBINED_REPORT_FILE)).write(&combined)?;
            report::print_summary("Combined", &combined);
            Ok(combined)
        }
    }
}

/// Build one suite with its production drivers, run it and persist its report
pub async fn run_suite(
    kind: SuiteKind,
    config: &Config,
    options: &RunOptions,
    emitter: EventEmitter,
) -> Result<SuiteReport> {
    let retry = RetryPolicy {
        timeout_retries: config.timeout_retries,
    };
    let reporter = ReportEmitter::new(report_path(&options.output_dir, kind));
    match kind {
        SuiteKind::Ui => run_ui_suite(config, &reporter, emitter, retry).await,
        SuiteKind::Api => run_api_suite(config, &reporter, emitter, retry).await,
    }
}

async fn run_ui_suite(
    config: &Config,
    reporter: &ReportEmitter,
    emitter: EventEmitter,
    retry: RetryPolicy,
) -> Result<SuiteReport> {
    let browser = launch_browser(config, &emitter).await;
    let timeouts = UiTimeouts::from(config);
    let credentials = Credentials::new(&config.login_email, &config.login_password);

    let factory = UiEnvironmentFactory::new(browser.clone(), &config.base_url, timeouts);
    let authenticator = FormLoginAuthenticator::new(
        browser.clone(),
        &config.base_url,
        suites::login_form(),
        timeouts,
    );
    let mut orchestrator = SuiteOrchestrator::new(suites::ui_suite(&credentials)?, factory)
        .with_authenticator(authenticator, credentials)
        .with_emitter(emitter)
        .with_retry_policy(retry);

    let report = orchestrator.run_and_report(reporter).await;
    if let Err(e) = browser.close().await {
        log::warn!("closing browser failed: {}", e);
    }
    report
}

/// Launch Chromium; when that fails every UI case becomes a setup failure
async fn launch_browser(config: &Config, emitter: &EventEmitter) -> Arc<dyn BrowserDriver> {
    let web_config = WebDriverConfig {
        headless: config.headless,
        executable: config.browser_executable.clone(),
        ..WebDriverConfig::default()
    };
    match WebDriver::launch(web_config).await {
        Ok(driver) => Arc::new(driver),
        Err(e) => {
            let reason = format!("browser launch failed: {:#}", e);
            log::error!("{}", reason);
            emitter.emit(TestEvent::Log {
                message: reason.clone(),
            });
            Arc::new(UnavailableBrowser::new(reason))
        }
    }
}

async fn run_api_suite(
    config: &Config,
    reporter: &ReportEmitter,
    emitter: EventEmitter,
    retry: RetryPolicy,
) -> Result<SuiteReport> {
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new()?);
    let credentials = Credentials::new(&config.login_email, &config.login_password);

    let authenticator = TokenAuthenticator::new(
        http.clone(),
        TokenAuthenticator::supabase_token_url(&config.supabase_url),
        &config.api_key,
        config.http_timeout_ms,
    );
    let factory = ApiEnvironmentFactory::new(
        http,
        &config.supabase_url,
        &config.api_key,
        config.http_timeout_ms,
    );
    let mut orchestrator = SuiteOrchestrator::new(suites::api_suite()?, factory)
        .with_authenticator(authenticator, credentials)
        .with_emitter(emitter)
        .with_retry_policy(retry);

    orchestrator.run_and_report(reporter).await
}

/// Path of the persisted report of `kind` under `output_dir`
pub fn report_path(output_dir: &Path, kind: SuiteKind) -> PathBuf {
    output_dir.join(kind.report_file())
}
