//! Per-test scoped environments.
//!
//! The orchestrator acquires one environment per test case and hands it back
//! to the factory on every exit path of that case.

use async_trait::async_trait;
use std::sync::Arc;

use super::case::CaseError;
use super::session::Session;
use crate::driver::traits::{
    BrowserDriver, BrowserPage, DriverResult, HttpClient, HttpRequest, HttpResponse, WaitUntil,
};
use crate::utils::Config;

/// Creates and destroys the resources one test case runs against
#[async_trait]
pub trait EnvironmentFactory: Send + Sync {
    type Env: Send + Sync;

    /// Build a fresh environment. `session` is only passed for cases that
    /// declared a dependency on it.
    async fn acquire(&self, session: Option<&Session>) -> Result<Self::Env, CaseError>;

    /// Tear the environment down; called exactly once per acquired value
    async fn release(&self, env: Self::Env) -> anyhow::Result<()>;
}

/// Wait bounds for browser interactions
#[derive(Debug, Clone, Copy)]
pub struct UiTimeouts {
    pub navigation_ms: u64,
    pub element_ms: u64,
    pub login_ms: u64,
}

impl From<&Config> for UiTimeouts {
    fn from(config: &Config) -> Self {
        Self {
            navigation_ms: config.navigation_timeout_ms,
            element_ms: config.element_timeout_ms,
            login_ms: config.login_timeout_ms,
        }
    }
}

/// Isolated browser context and page for one UI test case
pub struct UiEnvironment {
    pub page: Box<dyn BrowserPage>,
    pub base_url: String,
    pub timeouts: UiTimeouts,
}

impl UiEnvironment {
    /// Absolute URL for an application route such as `/kpi`
    pub fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    pub async fn open(&self, route: &str) -> DriverResult<()> {
        self.page
            .navigate(
                &self.url(route),
                WaitUntil::DomContentLoaded,
                self.timeouts.navigation_ms,
            )
            .await
    }
}

pub struct UiEnvironmentFactory {
    browser: Arc<dyn BrowserDriver>,
    base_url: String,
    timeouts: UiTimeouts,
}

impl UiEnvironmentFactory {
    pub fn new(
        browser: Arc<dyn BrowserDriver>,
        base_url: impl Into<String>,
        timeouts: UiTimeouts,
    ) -> Self {
        Self {
            browser,
            base_url: base_url.into(),
            timeouts,
        }
    }

    async fn restore_session(
        &self,
        page: &dyn BrowserPage,
        session: &Session,
    ) -> DriverResult<()> {
        let Some(entries) = session.storage_entries() else {
            return Ok(());
        };
        // localStorage is per origin, so the page has to be on it first
        page.navigate(
            &self.base_url,
            WaitUntil::DomContentLoaded,
            self.timeouts.navigation_ms,
        )
        .await?;
        page.restore_storage(entries).await
    }
}

#[async_trait]
impl EnvironmentFactory for UiEnvironmentFactory {
    type Env = UiEnvironment;

    async fn acquire(&self, session: Option<&Session>) -> Result<UiEnvironment, CaseError> {
        let page = self
            .browser
            .new_context()
            .await
            .map_err(|e| CaseError::setup(e))?;

        if let Some(session) = session {
            if let Err(e) = self.restore_session(page.as_ref(), session).await {
                if let Err(close_err) = page.close().await {
                    log::warn!("closing half-built context failed: {}", close_err);
                }
                return Err(CaseError::setup(format!("restoring session failed: {}", e)));
            }
        }

        Ok(UiEnvironment {
            page,
            base_url: self.base_url.clone(),
            timeouts: self.timeouts,
        })
    }

    async fn release(&self, env: UiEnvironment) -> anyhow::Result<()> {
        env.page.close().await?;
        Ok(())
    }
}

/// HTTP client bound to a base URL and default headers
pub struct ApiClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    default_headers: Vec<(String, String)>,
    timeout_ms: u64,
}

impl ApiClient {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            default_headers: Vec::new(),
            timeout_ms,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request for `path` carrying the default headers
    pub fn request(&self, method: reqwest::Method, path: &str) -> HttpRequest {
        self.default_headers.iter().fold(
            HttpRequest::new(method, self.url(path), self.timeout_ms),
            |req, (k, v)| req.header(k.as_str(), v.as_str()),
        )
    }

    /// Same request without the `Authorization` header
    pub fn anonymous_request(&self, method: reqwest::Method, path: &str) -> HttpRequest {
        let mut req = self.request(method, path);
        req.headers
            .retain(|(k, _)| !k.eq_ignore_ascii_case("authorization"));
        req
    }

    pub async fn send(&self, request: HttpRequest) -> DriverResult<HttpResponse> {
        self.http.request(request).await
    }

    pub async fn get(&self, path: &str) -> DriverResult<HttpResponse> {
        self.send(self.request(reqwest::Method::GET, path)).await
    }
}

pub struct ApiEnvironmentFactory {
    http: Arc<dyn HttpClient>,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

impl ApiEnvironmentFactory {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_ms,
        }
    }
}

#[async_trait]
impl EnvironmentFactory for ApiEnvironmentFactory {
    type Env = ApiClient;

    async fn acquire(&self, session: Option<&Session>) -> Result<ApiClient, CaseError> {
        let client = ApiClient::new(self.http.clone(), &self.base_url, self.timeout_ms)
            .with_header("apikey", &self.api_key);

        match session {
            None => Ok(client),
            Some(session) => {
                let token = session
                    .bearer_token()
                    .ok_or_else(|| CaseError::setup("session has no bearer token"))?;
                Ok(client.with_header("Authorization", format!("Bearer {}", token)))
            }
        }
    }

    async fn release(&self, _env: ApiClient) -> anyhow::Result<()> {
        // Nothing to close; the pooled transport outlives the client
        Ok(())
    }
}
