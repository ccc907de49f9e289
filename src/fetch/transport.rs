// src/fetch/transport.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use std::time::Duration;

use crate::error::FetchError;

/// What the wire gave back, before any acceptance checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    pub content_type: Option<String>,
}

impl RawResponse {
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: Some("text/html; charset=utf-8".to_string()),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            content_type: Some("text/html".to_string()),
        }
    }
}

/// The outbound HTTP capability. Browser-rendering fetchers plug in here too.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: HeaderMap,
        timeout: Duration,
    ) -> Result<RawResponse, FetchError>;
}

/// reqwest-backed transport. One client per process: connections are pooled
/// per host and cookies persist across requests to the same site.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(proxy_url: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .cookie_store(true)
            .gzip(true)
            .connect_timeout(Duration::from_secs(4))
            .pool_max_idle_per_host(4)
            .redirect(reqwest::redirect::Policy::limited(10));
        if let Some(p) = proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(p).context("invalid proxy url")?);
        }
        let client = builder.build().context("building http client")?;
        Ok(Self { client })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(e.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: HeaderMap,
        timeout: Duration,
    ) -> Result<RawResponse, FetchError> {
        let resp = self
            .client
            .get(url)
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        // bodies of rejected responses are never looked at
        let body = if status == 200 {
            resp.text().await.map_err(map_reqwest_error)?
        } else {
            String::new()
        };
        Ok(RawResponse {
            status,
            body,
            content_type,
        })
    }
}
