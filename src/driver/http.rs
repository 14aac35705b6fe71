//! HTTP driver backed by reqwest

use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;

use crate::driver::traits::{DriverError, DriverResult, HttpClient, HttpRequest, HttpResponse};

/// [`HttpClient`] implementation over a pooled `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("qms-e2e/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn request(&self, request: HttpRequest) -> DriverResult<HttpResponse> {
        let operation = format!("{} {}", request.method, request.url);
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .timeout(Duration::from_millis(request.timeout_ms));

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                DriverError::timeout(operation.clone(), request.timeout_ms)
            } else {
                DriverError::Other(anyhow::anyhow!("{} failed: {}", operation, e))
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                DriverError::timeout(operation.clone(), request.timeout_ms)
            } else {
                DriverError::Other(anyhow::anyhow!("reading body of {}: {}", operation, e))
            }
        })?;

        log::debug!("{} -> {}", operation, status);

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}
