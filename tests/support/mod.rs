//! Scripted stand-ins for the browser, the HTTP transport and test cases.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use qms_e2e::driver::traits::{
    BrowserDriver, BrowserPage, DriverError, DriverResult, ElementHandle, HttpClient, HttpRequest,
    HttpResponse, Selector, WaitUntil,
};
use qms_e2e::driver::traits::url_pattern;
use qms_e2e::runner::case::{CaseError, CaseResult, TestCase};
use qms_e2e::runner::environment::EnvironmentFactory;
use qms_e2e::runner::session::{AuthFailure, Authenticator, Credentials, Session, SessionMaterial};

pub const APP_URL: &str = "http://app.test";
pub const SESSION_KEY: &str = "sb-app-auth-token";

// ---------------------------------------------------------------------------
// Browser
// ---------------------------------------------------------------------------

/// In-memory model of the QMS web app: a login form guarding the dashboard
/// and module routes, with the session kept in localStorage.
pub struct FakeApp {
    pub email: String,
    pub password: String,
    /// Routes that render an empty page
    pub blank_routes: Vec<String>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

impl FakeApp {
    pub fn new(email: &str, password: &str) -> Arc<Self> {
        Arc::new(Self {
            email: email.to_string(),
            password: password.to_string(),
            blank_routes: Vec::new(),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        })
    }

    pub fn with_blank_route(email: &str, password: &str, route: &str) -> Arc<Self> {
        Arc::new(Self {
            email: email.to_string(),
            password: password.to_string(),
            blank_routes: vec![route.to_string()],
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        })
    }

    fn body_for(&self, path: &str) -> String {
        if self.blank_routes.iter().any(|r| r == path) {
            return String::new();
        }
        match path {
            "/login" => "Giriş Yap E-posta Şifre".to_string(),
            "/dashboard" => format!(
                "Ana Panel\nKalite Yönetim Sistemi\n{}",
                "Açık DF kayıtları ve KPI özetleri. ".repeat(3)
            ),
            other => format!("Modül {} {}", other, "Kayıt listesi yükleniyor. ".repeat(4)),
        }
    }
}

#[derive(Default)]
struct PageState {
    path: String,
    storage: Vec<(String, String)>,
    email: String,
    password: String,
}

impl PageState {
    fn logged_in(&self) -> bool {
        self.storage.iter().any(|(k, _)| k == SESSION_KEY)
    }

    fn url(&self) -> String {
        format!("{}{}", APP_URL, self.path)
    }

    fn has_element(&self, selector: &Selector) -> bool {
        match selector {
            Selector::TestId(id) => {
                self.path == "/login"
                    && matches!(id.as_str(), "login-email" | "login-password" | "login-submit")
            }
            Selector::Text(text) => self.path != "/login" && text == "Çıkış Yap",
            Selector::Css(_) => false,
        }
    }
}

pub struct FakeBrowser {
    pub app: Arc<FakeApp>,
}

impl FakeBrowser {
    pub fn new(app: Arc<FakeApp>) -> Arc<Self> {
        Arc::new(Self { app })
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn new_context(&self) -> DriverResult<Box<dyn BrowserPage>> {
        self.app.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            app: self.app.clone(),
            state: Arc::new(Mutex::new(PageState {
                path: "/".to_string(),
                ..PageState::default()
            })),
        }))
    }

    async fn close(&self) -> DriverResult<()> {
        Ok(())
    }
}

pub struct FakePage {
    app: Arc<FakeApp>,
    state: Arc<Mutex<PageState>>,
}

fn path_of(url: &str) -> String {
    match url.splitn(4, '/').nth(3) {
        Some(rest) => format!("/{}", rest),
        None => "/".to_string(),
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn navigate(&self, url: &str, _wait: WaitUntil, _timeout_ms: u64) -> DriverResult<()> {
        let mut state = self.state.lock().unwrap();
        let path = path_of(url);
        let public = path == "/" || path == "/login";
        state.path = if public || state.logged_in() {
            path
        } else {
            "/login".to_string()
        };
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.state.lock().unwrap().url())
    }

    async fn locate(
        &self,
        selector: &Selector,
        timeout_ms: u64,
    ) -> DriverResult<Box<dyn ElementHandle>> {
        if !self.state.lock().unwrap().has_element(selector) {
            return Err(DriverError::timeout(format!("locate {}", selector), timeout_ms));
        }
        Ok(Box::new(FakeElement {
            app: self.app.clone(),
            state: self.state.clone(),
            selector: selector.clone(),
        }))
    }

    async fn is_visible(&self, selector: &Selector) -> DriverResult<bool> {
        Ok(self.state.lock().unwrap().has_element(selector))
    }

    async fn wait_for_text(&self, text: &str, _timeout_ms: u64) -> DriverResult<bool> {
        Ok(self.body_text().await?.contains(text))
    }

    async fn body_text(&self) -> DriverResult<String> {
        let path = self.state.lock().unwrap().path.clone();
        Ok(self.app.body_for(&path))
    }

    async fn storage_entries(&self) -> DriverResult<Vec<(String, String)>> {
        Ok(self.state.lock().unwrap().storage.clone())
    }

    async fn restore_storage(&self, entries: &[(String, String)]) -> DriverResult<()> {
        self.state.lock().unwrap().storage.extend_from_slice(entries);
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        self.app.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    // State changes synchronously, so there is nothing to wait for
    async fn wait_for_url(&self, pattern: &str, _timeout_ms: u64) -> DriverResult<bool> {
        let url = self.current_url().await?;
        Ok(url_pattern(pattern)?.matches(&url))
    }
}

pub struct FakeElement {
    app: Arc<FakeApp>,
    state: Arc<Mutex<PageState>>,
    selector: Selector,
}

#[async_trait]
impl ElementHandle for FakeElement {
    async fn fill(&self, text: &str) -> DriverResult<()> {
        let mut state = self.state.lock().unwrap();
        match &self.selector {
            Selector::TestId(id) if id == "login-email" => state.email = text.to_string(),
            Selector::TestId(id) if id == "login-password" => state.password = text.to_string(),
            other => {
                return Err(DriverError::Other(anyhow::anyhow!("{} is not fillable", other)));
            }
        }
        Ok(())
    }

    async fn click(&self, _timeout_ms: u64) -> DriverResult<()> {
        let mut state = self.state.lock().unwrap();
        match &self.selector {
            Selector::TestId(id) if id == "login-submit" => {
                if state.email == self.app.email && state.password == self.app.password {
                    state
                        .storage
                        .push((SESSION_KEY.to_string(), "{\"access_token\":\"t\"}".to_string()));
                    state.path = "/dashboard".to_string();
                }
            }
            Selector::Text(text) if text == "Çıkış Yap" => {
                state.storage.clear();
                state.path = "/login".to_string();
            }
            _ => {}
        }
        Ok(())
    }

    async fn is_visible(&self) -> DriverResult<bool> {
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

type Responder = dyn Fn(&HttpRequest) -> DriverResult<HttpResponse> + Send + Sync;

/// HTTP client answering from a closure and remembering every request
pub struct FakeHttp {
    responder: Box<Responder>,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl FakeHttp {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> DriverResult<HttpResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }
}

pub fn respond(status: u16, body: &str) -> DriverResult<HttpResponse> {
    Ok(HttpResponse {
        status,
        headers: Vec::new(),
        body: body.as_bytes().to_vec(),
    })
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn request(&self, request: HttpRequest) -> DriverResult<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(&request)
    }
}

// ---------------------------------------------------------------------------
// Orchestration fakes
// ---------------------------------------------------------------------------

/// Shared, ordered trace of lifecycle steps
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Environment handed to scripted cases
pub struct FakeEnv {
    pub id: usize,
    pub has_session: bool,
}

/// Acquisition and release counters shared between a factory and its test
#[derive(Default)]
pub struct Counts {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

impl Counts {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

/// Counts acquisitions and releases; can be told to fail a given acquisition
pub struct CountingFactory {
    pub trace: Trace,
    pub counts: Arc<Counts>,
    /// 1-based acquisition attempt that fails
    pub fail_acquisition: Option<usize>,
    pub fail_release: bool,
    /// 1-based acquisition attempt that panics
    pub panic_acquisition: Option<usize>,
    pub panic_release: bool,
    attempts: AtomicUsize,
}

impl CountingFactory {
    pub fn new(trace: &Trace) -> Self {
        Self {
            trace: trace.clone(),
            counts: Arc::new(Counts::default()),
            fail_acquisition: None,
            fail_release: false,
            panic_acquisition: None,
            panic_release: false,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn failing_acquisition(mut self, attempt: usize) -> Self {
        self.fail_acquisition = Some(attempt);
        self
    }

    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub fn panicking_acquisition(mut self, attempt: usize) -> Self {
        self.panic_acquisition = Some(attempt);
        self
    }

    pub fn panicking_release(mut self) -> Self {
        self.panic_release = true;
        self
    }
}

#[async_trait]
impl EnvironmentFactory for CountingFactory {
    type Env = FakeEnv;

    async fn acquire(&self, session: Option<&Session>) -> Result<FakeEnv, CaseError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_acquisition == Some(attempt) {
            self.trace.push(format!("acquire-failed:{}", attempt));
            return Err(CaseError::setup("context could not be created"));
        }
        if self.panic_acquisition == Some(attempt) {
            self.trace.push(format!("acquire-panicked:{}", attempt));
            panic!("browser context builder crashed");
        }
        self.counts.acquired.fetch_add(1, Ordering::SeqCst);
        self.trace.push(format!("acquire:{}", attempt));
        Ok(FakeEnv {
            id: attempt,
            has_session: session.is_some(),
        })
    }

    async fn release(&self, env: FakeEnv) -> anyhow::Result<()> {
        self.counts.released.fetch_add(1, Ordering::SeqCst);
        self.trace.push(format!("release:{}", env.id));
        if self.panic_release {
            panic!("context close crashed");
        }
        if self.fail_release {
            anyhow::bail!("release failed");
        }
        Ok(())
    }
}

/// What a scripted case does when run
#[derive(Clone, Copy)]
pub enum Behavior {
    Pass,
    Fail,
    Timeout,
    /// Times out on the first attempt only
    TimeoutOnce,
    Panic,
}

pub struct ScriptedCase {
    pub name: String,
    pub needs_session: bool,
    pub behavior: Behavior,
    pub cleanup_fails: bool,
    pub trace: Trace,
    attempts: AtomicUsize,
}

impl ScriptedCase {
    pub fn new(name: &str, behavior: Behavior, trace: &Trace) -> Self {
        Self {
            name: name.to_string(),
            needs_session: false,
            behavior,
            cleanup_fails: false,
            trace: trace.clone(),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn needing_session(mut self) -> Self {
        self.needs_session = true;
        self
    }

    pub fn with_failing_cleanup(mut self) -> Self {
        self.cleanup_fails = true;
        self
    }
}

#[async_trait]
impl TestCase<FakeEnv> for ScriptedCase {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires_session(&self) -> bool {
        self.needs_session
    }

    async fn run(&self, session: Option<&Session>, env: &FakeEnv) -> CaseResult {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.trace.push(format!("run:{}", self.name));
        assert_eq!(session.is_some(), self.needs_session);
        assert_eq!(env.has_session, self.needs_session);
        match self.behavior {
            Behavior::Pass => Ok(()),
            Behavior::Fail => Err(CaseError::Assertion(format!("{} did not hold", self.name))),
            Behavior::Timeout => Err(DriverError::timeout("click #save", 5000).into()),
            Behavior::TimeoutOnce if attempt == 1 => {
                Err(DriverError::timeout("click #save", 5000).into())
            }
            Behavior::TimeoutOnce => Ok(()),
            Behavior::Panic => panic!("{} blew up", self.name),
        }
    }

    async fn cleanup(&self, _session: Option<&Session>, _env: &FakeEnv) -> anyhow::Result<()> {
        self.trace.push(format!("cleanup:{}", self.name));
        if self.cleanup_fails {
            anyhow::bail!("record {} could not be deleted", self.name);
        }
        Ok(())
    }
}

/// Authenticator with a fixed outcome
pub struct FixedAuthenticator {
    pub succeed: bool,
    pub calls: Arc<AtomicUsize>,
}

impl FixedAuthenticator {
    pub fn new(succeed: bool) -> Self {
        Self {
            succeed,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Authenticator for FixedAuthenticator {
    async fn establish(&self, credentials: &Credentials) -> Result<Session, AuthFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.succeed {
            Ok(Session::new(
                &credentials.identifier,
                SessionMaterial::BearerToken("token".to_string()),
            ))
        } else {
            Err(AuthFailure::Rejected {
                status: 400,
                body: "invalid_grant".to_string(),
            })
        }
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("qa@localhost", "changeme")
}
