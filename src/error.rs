// src/error.rs
//! Error taxonomy. Only `ScrapeError` ever reaches a caller; source and fetch
//! failures are absorbed by the pipeline.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Missing query")]
    EmptyQuery,
    #[error("all {attempted} sources failed or timed out; no candidates could be fetched")]
    AllSourcesFailed { attempted: usize },
}

impl ScrapeError {
    pub fn status(&self) -> StatusCode {
        match self {
            ScrapeError::EmptyQuery => StatusCode::BAD_REQUEST,
            ScrapeError::AllSourcesFailed { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("source timed out")]
    Timeout,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("content-type {0:?} is not html")]
    NotHtml(Option<String>),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Statuses worth another attempt (rate limit + transient upstream errors).
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Status(429 | 500 | 502 | 503 | 504))
    }
}
