//! Supabase auth, REST and storage checks.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use std::sync::Mutex;

use crate::ensure_that;
use crate::runner::case::{require_session, CaseError, CaseResult, Suite, SuiteError, TestCase};
use crate::runner::environment::ApiClient;
use crate::runner::session::Session;

const TOKEN_PATH: &str = "/auth/v1/token?grant_type=password";
const USER_PATH: &str = "/auth/v1/user";
const PROFILES_PATH: &str = "/rest/v1/profiles?select=id,full_name&limit=1";
const ATTACHMENT_BUCKET: &str = "df_attachments";

pub fn api_suite() -> Result<Suite<ApiClient>, SuiteError> {
    let mut suite = Suite::new("api");
    suite
        .register(ValidLogin)?
        .register(InvalidLoginRejected)?
        .register(ProfilesReadable)?
        .register(AnonymousProfilesRestricted)?
        .register(StorageRoundTrip::default())?;
    Ok(suite)
}

#[derive(Deserialize)]
struct AuthUser {
    #[serde(default)]
    email: Option<String>,
}

/// BE001: the session token is accepted by the auth service
pub struct ValidLogin;

#[async_trait]
impl TestCase<ApiClient> for ValidLogin {
    fn name(&self) -> &str {
        "BE001-Supabase Auth Geçerli Giriş"
    }

    async fn run(&self, session: Option<&Session>, api: &ApiClient) -> CaseResult {
        let session = require_session(session)?;
        let response = api.get(USER_PATH).await?;
        ensure_that!(response.status == 200, "Status {}", response.status);

        let user: AuthUser = response.json()?;
        let email = user.email.unwrap_or_default();
        ensure_that!(
            email.eq_ignore_ascii_case(&session.identifier),
            "token belongs to '{}', expected '{}'",
            email,
            session.identifier
        );
        Ok(())
    }
}

/// BE002: the token endpoint refuses wrong credentials
pub struct InvalidLoginRejected;

#[async_trait]
impl TestCase<ApiClient> for InvalidLoginRejected {
    fn name(&self) -> &str {
        "BE002-Supabase Auth Geçersiz Giriş Reddi"
    }

    fn requires_session(&self) -> bool {
        false
    }

    async fn run(&self, _session: Option<&Session>, api: &ApiClient) -> CaseResult {
        let body = serde_json::json!({
            "email": "wrong@example.com",
            "password": "wrongpass",
        });
        let request = api.anonymous_request(Method::POST, TOKEN_PATH).json(&body);
        let response = api.send(request).await?;
        ensure_that!(response.status == 400, "Status {}", response.status);
        Ok(())
    }
}

/// BE003: an authenticated user can read profiles
pub struct ProfilesReadable;

#[async_trait]
impl TestCase<ApiClient> for ProfilesReadable {
    fn name(&self) -> &str {
        "BE003-Supabase REST profiles"
    }

    async fn run(&self, session: Option<&Session>, api: &ApiClient) -> CaseResult {
        require_session(session)?;
        let response = api.get(PROFILES_PATH).await?;
        ensure_that!(response.status == 200, "Status {}", response.status);

        let rows: serde_json::Value = response.json()?;
        ensure_that!(rows.is_array(), "expected a JSON array, got {}", rows);
        Ok(())
    }
}

/// BE004: row-level security hides profiles from anonymous callers
pub struct AnonymousProfilesRestricted;

#[async_trait]
impl TestCase<ApiClient> for AnonymousProfilesRestricted {
    fn name(&self) -> &str {
        "BE004-Supabase RLS Anonim Erişim"
    }

    fn requires_session(&self) -> bool {
        false
    }

    async fn run(&self, _session: Option<&Session>, api: &ApiClient) -> CaseResult {
        let response = api
            .send(api.anonymous_request(Method::GET, PROFILES_PATH))
            .await?;
        match response.status {
            401 | 403 => Ok(()),
            200 => {
                let rows: Vec<serde_json::Value> = response.json()?;
                ensure_that!(
                    rows.is_empty(),
                    "anonymous caller read {} profile rows",
                    rows.len()
                );
                Ok(())
            }
            status => Err(CaseError::Assertion(format!("Status {}", status))),
        }
    }
}

/// BE005: an authenticated user can upload an attachment and read it back.
/// The object is deleted again in cleanup.
#[derive(Default)]
pub struct StorageRoundTrip {
    uploaded: Mutex<Option<String>>,
}

impl StorageRoundTrip {
    fn object_path(key: &str) -> String {
        format!("/storage/v1/object/{}/{}", ATTACHMENT_BUCKET, key)
    }
}

#[async_trait]
impl TestCase<ApiClient> for StorageRoundTrip {
    fn name(&self) -> &str {
        "BE005-Supabase Storage Yükleme"
    }

    async fn run(&self, session: Option<&Session>, api: &ApiClient) -> CaseResult {
        let session = require_session(session)?;
        let key = format!("e2e/{}.txt", uuid::Uuid::new_v4());
        let content = format!("qms-e2e {} {}", session.identifier, session.issued_at);

        let upload = api
            .request(Method::POST, &Self::object_path(&key))
            .bytes("text/plain", content.clone().into_bytes());
        let response = api.send(upload).await?;
        ensure_that!(
            response.status == 200,
            "upload Status {}: {}",
            response.status,
            response.text()
        );
        if let Ok(mut uploaded) = self.uploaded.lock() {
            *uploaded = Some(key.clone());
        }

        let download_path = format!(
            "/storage/v1/object/authenticated/{}/{}",
            ATTACHMENT_BUCKET, key
        );
        let response = api.get(&download_path).await?;
        ensure_that!(response.status == 200, "download Status {}", response.status);
        ensure_that!(
            response.text() == content,
            "downloaded content differs from upload"
        );
        Ok(())
    }

    async fn cleanup(&self, _session: Option<&Session>, api: &ApiClient) -> anyhow::Result<()> {
        let key = match self.uploaded.lock() {
            Ok(mut uploaded) => uploaded.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(key) = key else {
            return Ok(());
        };

        let response = api
            .send(api.request(Method::DELETE, &Self::object_path(&key)))
            .await?;
        if response.status != 200 {
            anyhow::bail!("deleting {} returned status {}", key, response.status);
        }
        Ok(())
    }
}
