//! Web Driver implementation using Playwright
//!
//! The browser process lives as long as the [`WebDriver`]; each test case
//! gets its own [`WebPage`] (an isolated context plus one page).

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use playwright::api::{Browser, BrowserContext, DocumentLoadState, Page, Viewport};
use playwright::Playwright;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use crate::driver::traits::{
    BrowserDriver, BrowserPage, DriverError, DriverResult, ElementHandle, Selector, WaitUntil,
};

/// Web Driver configuration
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Explicit Chromium executable
    pub executable: Option<PathBuf>,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            executable: None,
        }
    }
}

/// Web Driver using Playwright
pub struct WebDriver {
    // Keeps the Playwright driver process alive
    _playwright: Playwright,
    browser: Browser,
    config: WebDriverConfig,
}

impl WebDriver {
    /// Start Playwright and launch Chromium
    pub async fn launch(config: WebDriverConfig) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;

        let browser = launch_chromium_browser(&playwright.chromium(), &config).await?;

        Ok(Self {
            _playwright: playwright,
            browser,
            config,
        })
    }
}

#[async_trait]
impl BrowserDriver for WebDriver {
    async fn new_context(&self) -> DriverResult<Box<dyn BrowserPage>> {
        let context = self
            .browser
            .context_builder()
            .build()
            .await
            .map_err(|e| DriverError::Other(anyhow::anyhow!("Failed to create context: {}", e)))?;

        let page = match context.new_page().await {
            Ok(page) => page,
            Err(e) => {
                context.close().await.ok();
                return Err(DriverError::Other(anyhow::anyhow!(
                    "Failed to open page: {}",
                    e
                )));
            }
        };

        if let Err(e) = page
            .set_viewport_size(Viewport {
                width: self.config.viewport_width as i32,
                height: self.config.viewport_height as i32,
            })
            .await
        {
            log::warn!("could not set viewport size: {}", e);
        }

        Ok(Box::new(WebPage { context, page }))
    }

    async fn close(&self) -> DriverResult<()> {
        self.browser
            .close()
            .await
            .map_err(|e| DriverError::Other(anyhow::anyhow!("Failed to close browser: {}", e)))
    }
}

/// Browser context plus its single page
pub struct WebPage {
    context: BrowserContext,
    page: Page,
}

/// Bound a Playwright call by `timeout_ms`, with a little headroom so that
/// Playwright's own timeout reports win when it has one.
async fn bounded<T, E, F>(operation: &str, timeout_ms: u64, fut: F) -> DriverResult<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms + 1_000), fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(DriverError::classify(operation, timeout_ms, e)),
        Err(_) => Err(DriverError::timeout(operation, timeout_ms)),
    }
}

fn other(operation: &str, err: impl std::fmt::Display) -> DriverError {
    DriverError::Other(anyhow::anyhow!("{} failed: {}", operation, err))
}

#[async_trait]
impl BrowserPage for WebPage {
    async fn navigate(
        &self,
        url: &str,
        wait_until: WaitUntil,
        timeout_ms: u64,
    ) -> DriverResult<()> {
        let state = match wait_until {
            WaitUntil::Load => DocumentLoadState::Load,
            WaitUntil::DomContentLoaded => DocumentLoadState::DomContentLoaded,
            WaitUntil::NetworkIdle => DocumentLoadState::NetworkIdle,
        };
        let operation = format!("navigate to {}", url);
        bounded(
            &operation,
            timeout_ms,
            self.page
                .goto_builder(url)
                .timeout(timeout_ms as f64)
                .wait_until(state)
                .goto(),
        )
        .await?;
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.page
            .evaluate::<(), String>("window.location.href", ())
            .await
            .map_err(|e| other("read page URL", e))
    }

    async fn locate(
        &self,
        selector: &Selector,
        timeout_ms: u64,
    ) -> DriverResult<Box<dyn ElementHandle>> {
        let sel = selector.to_playwright();
        let operation = format!("locate {}", sel);
        let found = bounded(
            &operation,
            timeout_ms,
            self.page
                .wait_for_selector_builder(&sel)
                .timeout(timeout_ms as f64)
                .wait_for_selector(),
        )
        .await?;

        match found {
            Some(handle) => Ok(Box::new(WebElement { handle, selector: sel })),
            None => Err(DriverError::timeout(operation, timeout_ms)),
        }
    }

    async fn is_visible(&self, selector: &Selector) -> DriverResult<bool> {
        let sel = selector.to_playwright();
        let element = self
            .page
            .query_selector(&sel)
            .await
            .map_err(|e| other("query selector", e))?;
        match element {
            Some(el) => el.is_visible().await.map_err(|e| other("check visibility", e)),
            None => Ok(false),
        }
    }

    async fn wait_for_text(&self, text: &str, timeout_ms: u64) -> DriverResult<bool> {
        let sel = Selector::text(text).to_playwright();
        let result = bounded(
            &format!("wait for text '{}'", text),
            timeout_ms,
            self.page
                .wait_for_selector_builder(&sel)
                .timeout(timeout_ms as f64)
                .wait_for_selector(),
        )
        .await;

        match result {
            Ok(found) => Ok(found.is_some()),
            Err(e) if e.is_timeout() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn body_text(&self) -> DriverResult<String> {
        self.page
            .evaluate::<(), String>("document.body ? document.body.innerText : ''", ())
            .await
            .map_err(|e| other("read body text", e))
    }

    async fn storage_entries(&self) -> DriverResult<Vec<(String, String)>> {
        self.page
            .evaluate::<(), Vec<(String, String)>>("Object.entries(window.localStorage)", ())
            .await
            .map_err(|e| other("read localStorage", e))
    }

    async fn restore_storage(&self, entries: &[(String, String)]) -> DriverResult<()> {
        self.page
            .evaluate::<_, ()>(
                "entries => { for (const [k, v] of entries) window.localStorage.setItem(k, v); }",
                entries.to_vec(),
            )
            .await
            .map_err(|e| other("write localStorage", e))
    }

    async fn close(&self) -> DriverResult<()> {
        self.context
            .close()
            .await
            .map_err(|e| other("close browser context", e))
    }
}

/// Element located through Playwright
pub struct WebElement {
    handle: playwright::api::ElementHandle,
    selector: String,
}

#[async_trait]
impl ElementHandle for WebElement {
    async fn fill(&self, text: &str) -> DriverResult<()> {
        self.handle
            .fill_builder(text)
            .fill()
            .await
            .map_err(|e| other(&format!("fill {}", self.selector), e))
    }

    async fn click(&self, timeout_ms: u64) -> DriverResult<()> {
        bounded(
            &format!("click {}", self.selector),
            timeout_ms,
            self.handle.click_builder().click(),
        )
        .await
    }

    async fn is_visible(&self) -> DriverResult<bool> {
        self.handle
            .is_visible()
            .await
            .map_err(|e| other("check visibility", e))
    }
}

/// Stand-in used when the browser could not be launched at all.
///
/// Every context request fails with the launch error, so each UI test case
/// is recorded as a setup failure instead of the whole run aborting.
pub struct UnavailableBrowser {
    reason: String,
}

impl UnavailableBrowser {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl BrowserDriver for UnavailableBrowser {
    async fn new_context(&self) -> DriverResult<Box<dyn BrowserPage>> {
        Err(DriverError::Other(anyhow::anyhow!(
            "browser unavailable: {}",
            self.reason
        )))
    }

    async fn close(&self) -> DriverResult<()> {
        Ok(())
    }
}

/// Launch a new Chromium browser
async fn launch_chromium_browser(
    chromium: &playwright::api::BrowserType,
    config: &WebDriverConfig,
) -> Result<Browser> {
    let mut launcher = chromium.launcher();
    launcher = launcher.headless(config.headless);

    if let Some(ref path) = config.executable {
        println!("{} Using browser from env: {}", "🌐".blue(), path.display());
        launcher = launcher.executable(path);
    }

    let args: Vec<String> = vec![
        format!(
            "--window-size={},{}",
            config.viewport_width, config.viewport_height
        ),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
    ];
    launcher = launcher.args(&args);

    let browser = launcher
        .launch()
        .await
        .context("Failed to launch Chromium")?;
    Ok(browser)
}
