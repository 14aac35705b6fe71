//! Session establishment.
//!
//! A suite authenticates once; the resulting [`Session`] is handed read-only
//! to every test case that declares a dependency on it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::environment::UiTimeouts;
use crate::driver::traits::{
    BrowserDriver, BrowserPage, DriverError, DriverResult, HttpClient, HttpRequest, Selector,
    WaitUntil,
};

/// Login identifier and secret, fixed for the whole run
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identifier: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"***")
            .finish()
    }
}

/// What proves the session is authenticated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMaterial {
    /// `access_token` returned by the token endpoint
    BearerToken(String),
    /// `localStorage` entries of the logged-in origin
    BrowserStorage(Vec<(String, String)>),
}

/// An authenticated session
#[derive(Debug, Clone)]
pub struct Session {
    pub identifier: String,
    pub issued_at: DateTime<Utc>,
    pub material: SessionMaterial,
}

impl Session {
    pub fn new(identifier: impl Into<String>, material: SessionMaterial) -> Self {
        Self {
            identifier: identifier.into(),
            issued_at: Utc::now(),
            material,
        }
    }

    pub fn bearer_token(&self) -> Option<&str> {
        match &self.material {
            SessionMaterial::BearerToken(token) => Some(token),
            SessionMaterial::BrowserStorage(_) => None,
        }
    }

    pub fn storage_entries(&self) -> Option<&[(String, String)]> {
        match &self.material {
            SessionMaterial::BrowserStorage(entries) => Some(entries),
            SessionMaterial::BearerToken(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("authentication rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("authentication response carried no access token")]
    MissingToken,

    #[error("login did not reach the authenticated view: {0}")]
    NotAuthenticated(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Turns credentials into a [`Session`] with exactly one exchange
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn establish(&self, credentials: &Credentials) -> Result<Session, AuthFailure>;
}

/// Password grant against a Supabase-style token endpoint
pub struct TokenAuthenticator {
    client: Arc<dyn HttpClient>,
    token_url: String,
    api_key: String,
    timeout_ms: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

impl TokenAuthenticator {
    pub fn new(
        client: Arc<dyn HttpClient>,
        token_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            api_key: api_key.into(),
            timeout_ms,
        }
    }

    /// Token endpoint of a Supabase project
    pub fn supabase_token_url(supabase_url: &str) -> String {
        format!(
            "{}/auth/v1/token?grant_type=password",
            supabase_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn establish(&self, credentials: &Credentials) -> Result<Session, AuthFailure> {
        let body = serde_json::json!({
            "email": credentials.identifier,
            "password": credentials.secret,
        });
        let request = HttpRequest::new(reqwest::Method::POST, &self.token_url, self.timeout_ms)
            .header("apikey", &self.api_key)
            .json(&body);

        let response = self.client.request(request).await?;
        if response.status != 200 {
            return Err(AuthFailure::Rejected {
                status: response.status,
                body: response.text(),
            });
        }

        let token = response
            .json::<TokenResponse>()
            .ok()
            .and_then(|t| t.access_token)
            .filter(|t| !t.is_empty())
            .ok_or(AuthFailure::MissingToken)?;

        log::info!("token issued for {}", credentials.identifier);
        Ok(Session::new(
            &credentials.identifier,
            SessionMaterial::BearerToken(token),
        ))
    }
}

/// Where the login form lives and what a successful login looks like
#[derive(Debug, Clone)]
pub struct LoginForm {
    pub path: String,
    pub email: Selector,
    pub password: Selector,
    pub submit: Selector,
    /// Glob the URL must match after login, e.g. `**/dashboard**`
    pub landing_pattern: String,
    /// Text that only shows up on the authenticated landing page
    pub landmark_text: String,
}

/// Open the login page, type the credentials and press submit
pub async fn submit_login(
    page: &dyn BrowserPage,
    base_url: &str,
    form: &LoginForm,
    credentials: &Credentials,
    timeouts: &UiTimeouts,
) -> DriverResult<()> {
    page.navigate(
        &format!("{}{}", base_url, form.path),
        WaitUntil::DomContentLoaded,
        timeouts.navigation_ms,
    )
    .await?;
    page.locate(&form.email, timeouts.element_ms)
        .await?
        .fill(&credentials.identifier)
        .await?;
    page.locate(&form.password, timeouts.element_ms)
        .await?
        .fill(&credentials.secret)
        .await?;
    page.locate(&form.submit, timeouts.element_ms)
        .await?
        .click(timeouts.element_ms)
        .await
}

/// Logs in through the web form in a throwaway context and keeps the
/// resulting `localStorage` as session material.
pub struct FormLoginAuthenticator {
    browser: Arc<dyn BrowserDriver>,
    base_url: String,
    form: LoginForm,
    timeouts: UiTimeouts,
}

impl FormLoginAuthenticator {
    pub fn new(
        browser: Arc<dyn BrowserDriver>,
        base_url: impl Into<String>,
        form: LoginForm,
        timeouts: UiTimeouts,
    ) -> Self {
        Self {
            browser,
            base_url: base_url.into(),
            form,
            timeouts,
        }
    }

    async fn login_and_capture(
        &self,
        page: &dyn BrowserPage,
        credentials: &Credentials,
    ) -> Result<Session, AuthFailure> {
        submit_login(page, &self.base_url, &self.form, credentials, &self.timeouts).await?;

        if !page
            .wait_for_url(&self.form.landing_pattern, self.timeouts.login_ms)
            .await?
        {
            let url = page.current_url().await.unwrap_or_default();
            return Err(AuthFailure::NotAuthenticated(format!(
                "still at {} after {}ms",
                url, self.timeouts.login_ms
            )));
        }
        if !page
            .wait_for_text(&self.form.landmark_text, self.timeouts.element_ms)
            .await?
        {
            return Err(AuthFailure::NotAuthenticated(format!(
                "'{}' not shown on landing page",
                self.form.landmark_text
            )));
        }

        let entries = page.storage_entries().await?;
        Ok(Session::new(
            &credentials.identifier,
            SessionMaterial::BrowserStorage(entries),
        ))
    }
}

#[async_trait]
impl Authenticator for FormLoginAuthenticator {
    async fn establish(&self, credentials: &Credentials) -> Result<Session, AuthFailure> {
        let page = self.browser.new_context().await?;
        let outcome = self.login_and_capture(page.as_ref(), credentials).await;
        if let Err(e) = page.close().await {
            log::warn!("closing login context failed: {}", e);
        }
        outcome
    }
}
