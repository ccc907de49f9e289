// src/fetch/mod.rs
//! Fetch Client: header rotation, per-call timeout and bounded retry on top
//! of a pluggable [`Transport`].
//!
//! Only a `200` with an HTML content type counts as data; every other outcome
//! is an `Err` the caller is expected to absorb.

pub mod headers;
pub mod transport;

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::ScrapeConfig;
use crate::error::FetchError;
pub use transport::{RawResponse, ReqwestTransport, Transport};

/// An accepted page. Owned by the call that fetched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub status: u16,
    pub body: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// Exponential backoff with a little jitter: base·2^(n-1) + [0, base/2).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(6);
        let base = self.base_backoff.saturating_mul(factor);
        let jitter_ms = (self.base_backoff.as_millis() as u64 / 2).max(1);
        base + Duration::from_millis(fastrand::u64(..jitter_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_backoff: Duration::from_millis(250),
        }
    }
}

pub struct FetchClient {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl FetchClient {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            transport,
            timeout,
            retry,
        }
    }

    /// Production client over reqwest, tuned from config.
    pub fn from_config(cfg: &ScrapeConfig) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new(cfg.proxy_url.as_deref())?;
        Ok(Self::new(
            Arc::new(transport),
            cfg.fetch_timeout(),
            RetryPolicy {
                attempts: cfg.retry_attempts,
                base_backoff: Duration::from_millis(cfg.backoff_base_ms),
            },
        ))
    }

    /// GET `url`, retrying transient statuses with exponential backoff.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        url::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let call = self.transport.get(url, headers::rotated(), self.timeout);
            let outcome = match tokio::time::timeout(self.timeout, call).await {
                Ok(r) => r.and_then(accept),
                Err(_) => Err(FetchError::Timeout),
            };

            let err = match outcome {
                Ok(page) => return Ok(page),
                Err(e) => e,
            };
            if err.is_transient() && attempt < self.retry.attempts {
                let wait = self.retry.backoff(attempt);
                counter!("fetch_retries_total").increment(1);
                debug!(%url, attempt, error = %err, wait_ms = wait.as_millis() as u64, "retrying fetch");
                tokio::time::sleep(wait).await;
                continue;
            }
            counter!("fetch_rejected_total").increment(1);
            debug!(%url, attempt, error = %err, "fetch gave no data");
            return Err(err);
        }
    }
}

fn accept(raw: RawResponse) -> Result<FetchResult, FetchError> {
    if raw.status != 200 {
        return Err(FetchError::Status(raw.status));
    }
    match raw.content_type.as_deref() {
        Some(ct) if is_html(ct) => Ok(FetchResult {
            status: raw.status,
            body: raw.body,
            content_type: raw.content_type,
        }),
        other => Err(FetchError::NotHtml(other.map(str::to_string))),
    }
}

fn is_html(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("text/html") || ct.contains("application/xhtml")
}
