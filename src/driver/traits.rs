use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single interaction with the system under test.
///
/// Timeouts are kept apart from everything else so the orchestrator can
/// classify them as interaction timeouts.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl DriverError {
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        DriverError::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Build an error from a backend failure message, recognising the
    /// backend's own timeout reports.
    pub fn classify(operation: &str, timeout_ms: u64, err: impl fmt::Display) -> Self {
        let message = err.to_string();
        if message.contains("Timeout") || message.contains("timed out") {
            DriverError::timeout(operation, timeout_ms)
        } else {
            DriverError::Other(anyhow::anyhow!("{} failed: {}", operation, message))
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout { .. })
    }
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Element selector for web pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Raw CSS selector
    Css(String),
    /// Element whose visible text matches exactly
    Text(String),
    /// `data-testid` attribute
    TestId(String),
}

impl Selector {
    pub fn css(css: impl Into<String>) -> Self {
        Selector::Css(css.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Selector::Text(text.into())
    }

    pub fn test_id(id: impl Into<String>) -> Self {
        Selector::TestId(id.into())
    }

    /// Convert to a Playwright selector string
    pub fn to_playwright(&self) -> String {
        match self {
            Selector::Css(css) => css.clone(),
            Selector::Text(text) => format!("text=\"{}\"", text),
            Selector::TestId(id) => format!("[data-testid=\"{}\"]", id),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_playwright())
    }
}

/// Page lifecycle point a navigation waits for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WaitUntil {
    Load,
    #[default]
    DomContentLoaded,
    NetworkIdle,
}

/// Browser automation capability.
///
/// One driver owns the browser process; every call to [`new_context`]
/// yields an isolated context (fresh cookies and storage) with one page.
///
/// [`new_context`]: BrowserDriver::new_context
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn new_context(&self) -> DriverResult<Box<dyn BrowserPage>>;

    /// Shut the browser down
    async fn close(&self) -> DriverResult<()>;
}

/// A browser context together with the single page opened in it
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate to `url` and wait for `wait_until`
    async fn navigate(&self, url: &str, wait_until: WaitUntil, timeout_ms: u64)
        -> DriverResult<()>;

    /// URL currently shown by the page
    async fn current_url(&self) -> DriverResult<String>;

    /// Wait until an element matching `selector` is attached and return it
    async fn locate(&self, selector: &Selector, timeout_ms: u64)
        -> DriverResult<Box<dyn ElementHandle>>;

    /// Check visibility right now, without waiting
    async fn is_visible(&self, selector: &Selector) -> DriverResult<bool>;

    /// Wait for `text` to appear anywhere on the page
    async fn wait_for_text(&self, text: &str, timeout_ms: u64) -> DriverResult<bool>;

    /// Visible text of the document body
    async fn body_text(&self) -> DriverResult<String>;

    /// Snapshot of the page origin's `localStorage`
    async fn storage_entries(&self) -> DriverResult<Vec<(String, String)>>;

    /// Write entries into the page origin's `localStorage`
    async fn restore_storage(&self, entries: &[(String, String)]) -> DriverResult<()>;

    /// Close the context (and its page)
    async fn close(&self) -> DriverResult<()>;

    /// Poll the page URL until it matches a glob pattern such as
    /// `**/dashboard**`.
    async fn wait_for_url(&self, pattern: &str, timeout_ms: u64) -> DriverResult<bool> {
        let pattern = url_pattern(pattern)?;
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if pattern.matches(&self.current_url().await?) {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Compile a Playwright-style URL glob (`**/dashboard**`).
///
/// `glob` rejects `**` outside a whole path component; a single `*` already
/// crosses `/` under default match options.
pub fn url_pattern(pattern: &str) -> DriverResult<glob::Pattern> {
    let mut flat = pattern.to_string();
    while flat.contains("**") {
        flat = flat.replace("**", "*");
    }
    glob::Pattern::new(&flat)
        .map_err(|e| DriverError::Other(anyhow::anyhow!("bad URL pattern '{}': {}", pattern, e)))
}

/// Handle to an element located on a page
#[async_trait]
pub trait ElementHandle: Send + Sync {
    async fn fill(&self, text: &str) -> DriverResult<()>;

    async fn click(&self, timeout_ms: u64) -> DriverResult<()>;

    async fn is_visible(&self) -> DriverResult<bool>;
}

/// A request issued through an [`HttpClient`]
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn new(method: reqwest::Method, url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout_ms,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn json(self, value: &serde_json::Value) -> Self {
        let mut req = self.header("Content-Type", "application/json");
        req.body = Some(value.to_string().into_bytes());
        req
    }

    pub fn bytes(self, content_type: &str, body: Vec<u8>) -> Self {
        let mut req = self.header("Content-Type", content_type);
        req.body = Some(body);
        req
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What came back from the server
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| anyhow::anyhow!("response body is not the expected JSON: {}", e))
    }
}

/// HTTP client capability
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn request(&self, request: HttpRequest) -> DriverResult<HttpResponse>;
}
