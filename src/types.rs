// src/types.rs
use serde::{Deserialize, Serialize};

/// A discovered product listing. `price` is filled at most once, by the pricing stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    /// Absolute, tracking-stripped URL.
    pub url: String,
    /// Name of the adapter that discovered it, e.g. "duckduckgo", "amazon_in".
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

impl Candidate {
    pub fn new(title: impl Into<String>, url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            source: source.into(),
            price: None,
        }
    }

    pub fn has_price(&self) -> bool {
        self.price.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}

/// Inbound body of `POST /scrape`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Successful payload; serialized once and cached as bytes.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeResponse {
    pub product: String,
    pub results: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error payload for 4xx/5xx responses.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Candidate>>,
}

/// How a source's result page links to products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Third-party search engine; root-relative links are redirect wrappers.
    Search,
    /// Retailer's own search page; relative links resolve against its base.
    Retailer,
}
