//! Browser suite against the QMS web application.

use async_trait::async_trait;
use std::time::Duration;

use crate::driver::traits::{BrowserPage, DriverResult, Selector};
use crate::ensure_that;
use crate::runner::case::{require_session, CaseResult, Suite, SuiteError, TestCase};
use crate::runner::environment::UiEnvironment;
use crate::runner::session::{submit_login, Credentials, LoginForm, Session};

/// Route every authenticated user lands on
const DASHBOARD_ROUTE: &str = "/dashboard";
const DASHBOARD_PATTERN: &str = "**/dashboard**";
const LOGIN_PATTERN: &str = "**/login**";
const DASHBOARD_LANDMARK: &str = "Ana Panel";
const APP_TITLE: &str = "Kalite Yönetim Sistemi";
const LOGOUT_TEXT: &str = "Çıkış Yap";

/// How long a rejected login is watched for an unexpected redirect
const REJECTION_GRACE_MS: u64 = 3000;

/// Rendered pages shorter than this are treated as blank
const MIN_CONTENT_CHARS: usize = 50;

/// Application modules reachable from the sidebar: (id, label, route)
pub const MODULES: [(&str, &str, &str); 5] = [
    ("TC004", "KPI", "/kpi"),
    ("TC005", "DF-8D", "/df-8d"),
    ("TC006", "Kalite Maliyetleri", "/quality-cost"),
    ("TC007", "Müşteri Şikayetleri", "/customer-complaints"),
    ("TC008", "Görev Yönetimi", "/tasks"),
];

/// The login form of the web application
pub fn login_form() -> LoginForm {
    LoginForm {
        path: "/login".to_string(),
        email: Selector::test_id("login-email"),
        password: Selector::test_id("login-password"),
        submit: Selector::test_id("login-submit"),
        landing_pattern: DASHBOARD_PATTERN.to_string(),
        landmark_text: DASHBOARD_LANDMARK.to_string(),
    }
}

/// Build the UI suite in its fixed order
pub fn ui_suite(credentials: &Credentials) -> Result<Suite<UiEnvironment>, SuiteError> {
    let mut suite = Suite::new("ui");
    suite
        .register(SuccessfulLogin {
            credentials: credentials.clone(),
        })?
        .register(InvalidLoginRejected)?
        .register(DashboardLoads)?;
    for (id, label, route) in MODULES {
        suite.register(ModuleNavigation::new(id, label, route))?;
    }
    suite.register(Logout)?.register(UnauthorizedAccess)?;
    Ok(suite)
}

/// Poll the body text until it has at least `min_chars` characters
async fn wait_for_content(
    page: &dyn BrowserPage,
    min_chars: usize,
    timeout_ms: u64,
) -> DriverResult<String> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let body = page.body_text().await?;
        if body.chars().count() > min_chars || tokio::time::Instant::now() >= deadline {
            return Ok(body);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// TC001: fresh login through the form lands on the dashboard
pub struct SuccessfulLogin {
    credentials: Credentials,
}

#[async_trait]
impl TestCase<UiEnvironment> for SuccessfulLogin {
    fn name(&self) -> &str {
        "TC001-Başarılı Login"
    }

    fn requires_session(&self) -> bool {
        false
    }

    async fn run(&self, _session: Option<&Session>, env: &UiEnvironment) -> CaseResult {
        let form = login_form();
        let page = env.page.as_ref();
        submit_login(page, &env.base_url, &form, &self.credentials, &env.timeouts).await?;

        let landed = page
            .wait_for_url(&form.landing_pattern, env.timeouts.login_ms)
            .await?;
        let url = page.current_url().await?;
        ensure_that!(
            landed && url.contains(DASHBOARD_ROUTE),
            "not redirected to dashboard, at {}",
            url
        );
        ensure_that!(
            page.wait_for_text(DASHBOARD_LANDMARK, env.timeouts.element_ms).await?,
            "'{}' not shown after login",
            DASHBOARD_LANDMARK
        );
        Ok(())
    }
}

/// TC002: wrong credentials keep the user on the login form
pub struct InvalidLoginRejected;

#[async_trait]
impl TestCase<UiEnvironment> for InvalidLoginRejected {
    fn name(&self) -> &str {
        "TC002-Geçersiz Login Reddi"
    }

    fn requires_session(&self) -> bool {
        false
    }

    async fn run(&self, _session: Option<&Session>, env: &UiEnvironment) -> CaseResult {
        let form = login_form();
        let page = env.page.as_ref();
        let wrong = Credentials::new("wrong@example.com", "wrongpass");
        submit_login(page, &env.base_url, &form, &wrong, &env.timeouts).await?;

        let redirected = page
            .wait_for_url(&form.landing_pattern, REJECTION_GRACE_MS)
            .await?;
        ensure_that!(!redirected, "invalid credentials reached the dashboard");
        ensure_that!(
            page.is_visible(&form.submit).await?,
            "login form no longer shown after rejected login"
        );
        Ok(())
    }
}

/// TC003: dashboard renders its landmarks for a logged-in user
pub struct DashboardLoads;

#[async_trait]
impl TestCase<UiEnvironment> for DashboardLoads {
    fn name(&self) -> &str {
        "TC003-Dashboard Yükleme"
    }

    async fn run(&self, session: Option<&Session>, env: &UiEnvironment) -> CaseResult {
        require_session(session)?;
        env.open(DASHBOARD_ROUTE).await?;
        let page = env.page.as_ref();
        ensure_that!(
            page.wait_for_text(DASHBOARD_LANDMARK, env.timeouts.element_ms).await?,
            "'{}' not shown on dashboard",
            DASHBOARD_LANDMARK
        );
        let body = page.body_text().await?;
        ensure_that!(
            body.contains(APP_TITLE),
            "'{}' missing from dashboard",
            APP_TITLE
        );
        Ok(())
    }
}

/// TC004-TC008: a module route renders content without bouncing to login
pub struct ModuleNavigation {
    name: String,
    route: &'static str,
}

impl ModuleNavigation {
    pub fn new(id: &str, label: &str, route: &'static str) -> Self {
        Self {
            name: format!("{}-{} Navigasyon", id, label),
            route,
        }
    }
}

#[async_trait]
impl TestCase<UiEnvironment> for ModuleNavigation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, session: Option<&Session>, env: &UiEnvironment) -> CaseResult {
        require_session(session)?;
        env.open(self.route).await?;
        let page = env.page.as_ref();
        let body = wait_for_content(page, MIN_CONTENT_CHARS, env.timeouts.element_ms).await?;

        let url = page.current_url().await?;
        ensure_that!(!url.contains("/login"), "{} redirected to login", self.route);
        ensure_that!(
            body.chars().count() > MIN_CONTENT_CHARS,
            "{} rendered only {} characters",
            self.route,
            body.chars().count()
        );
        Ok(())
    }
}

/// TC009: the logout control returns the user to the login page
pub struct Logout;

#[async_trait]
impl TestCase<UiEnvironment> for Logout {
    fn name(&self) -> &str {
        "TC009-Logout"
    }

    async fn run(&self, session: Option<&Session>, env: &UiEnvironment) -> CaseResult {
        require_session(session)?;
        env.open(DASHBOARD_ROUTE).await?;
        let page = env.page.as_ref();
        page.locate(&Selector::text(LOGOUT_TEXT), env.timeouts.element_ms)
            .await?
            .click(env.timeouts.element_ms)
            .await?;
        ensure_that!(
            page.wait_for_url(LOGIN_PATTERN, env.timeouts.navigation_ms).await?,
            "not redirected to login after logout"
        );
        Ok(())
    }
}

/// TC010: anonymous visitors are kept out of the dashboard
pub struct UnauthorizedAccess;

#[async_trait]
impl TestCase<UiEnvironment> for UnauthorizedAccess {
    fn name(&self) -> &str {
        "TC010-Yetkisiz Erişim Koruması"
    }

    fn requires_session(&self) -> bool {
        false
    }

    async fn run(&self, _session: Option<&Session>, env: &UiEnvironment) -> CaseResult {
        env.open(DASHBOARD_ROUTE).await?;
        let page = env.page.as_ref();
        let redirected = page
            .wait_for_url(LOGIN_PATTERN, REJECTION_GRACE_MS)
            .await?;
        let guarded = redirected || page.is_visible(&login_form().email).await?;
        ensure_that!(guarded, "anonymous visitor reached {}", DASHBOARD_ROUTE);
        Ok(())
    }
}
