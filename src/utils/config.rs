use std::path::PathBuf;

const DEFAULT_BASE_URL: &str = "http://localhost:3003";
const DEFAULT_SUPABASE_URL: &str = "http://localhost:54321";
const DEFAULT_ANON_KEY: &str = "local-dev-anon-key";
const DEFAULT_LOGIN_EMAIL: &str = "qa@localhost";
const DEFAULT_LOGIN_PASSWORD: &str = "changeme";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the web UI under test
    pub base_url: String,

    /// Base URL of the Supabase backend the API suite talks to
    pub supabase_url: String,

    /// Supabase anon key sent as `apikey` header
    pub api_key: String,

    /// Login identifier used by the authenticators
    pub login_email: String,

    /// Login secret used by the authenticators
    pub login_password: String,

    /// Run the browser without a window
    pub headless: bool,

    /// Explicit Chromium executable (skips Playwright's bundled browser)
    pub browser_executable: Option<PathBuf>,

    /// Page navigation timeout (ms)
    pub navigation_timeout_ms: u64,

    /// Wait for the post-login landing page (ms)
    pub login_timeout_ms: u64,

    /// Default timeout for element waiting (ms)
    pub element_timeout_ms: u64,

    /// Per-request HTTP timeout (ms)
    pub http_timeout_ms: u64,

    /// Extra attempts granted to a test case that failed on a timeout
    pub timeout_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            supabase_url: DEFAULT_SUPABASE_URL.to_string(),
            api_key: DEFAULT_ANON_KEY.to_string(),
            login_email: DEFAULT_LOGIN_EMAIL.to_string(),
            login_password: DEFAULT_LOGIN_PASSWORD.to_string(),
            headless: true,
            browser_executable: None,
            navigation_timeout_ms: 15_000,
            login_timeout_ms: 30_000,
            element_timeout_ms: 5_000,
            http_timeout_ms: 15_000,
            timeout_retries: 0,
        }
    }
}

impl Config {
    /// Resolve configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset so that `FOO=` in a shell does not
    /// wipe out a working default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Secrets are passed through verbatim; only blank values are skipped
        let raw = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(k))
                .find(|v| !v.trim().is_empty())
        };
        let get = |keys: &[&str]| raw(keys).map(|v| v.trim().to_string());

        let defaults = Self::default();

        Self {
            base_url: get(&["QMS_BASE_URL", "BASE_URL"])
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            supabase_url: get(&["VITE_SUPABASE_URL", "SUPABASE_URL"])
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.supabase_url),
            api_key: raw(&["VITE_SUPABASE_ANON_KEY", "SUPABASE_ANON_KEY"])
                .unwrap_or(defaults.api_key),
            login_email: raw(&["LOGIN_EMAIL"]).unwrap_or(defaults.login_email),
            login_password: raw(&["LOGIN_PASSWORD"]).unwrap_or(defaults.login_password),
            headless: get(&["QMS_E2E_HEADLESS"])
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.headless),
            browser_executable: get(&["PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH"]).map(PathBuf::from),
            navigation_timeout_ms: defaults.navigation_timeout_ms,
            login_timeout_ms: defaults.login_timeout_ms,
            element_timeout_ms: defaults.element_timeout_ms,
            http_timeout_ms: defaults.http_timeout_ms,
            timeout_retries: get(&["QMS_E2E_TIMEOUT_RETRIES"])
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_retries),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
