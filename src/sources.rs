// src/sources.rs
//! Source adapters: one search engine or retailer search page each.
//!
//! An adapter fetches one results page, pulls every anchor out of it,
//! normalizes and filters the links, and hands back candidates in page order.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::config::SourceSpec;
use crate::error::{FetchError, SourceError};
use crate::fetch::FetchClient;
use crate::normalize::{dedup_key, normalize_href};
use crate::shopping::ShoppingFilter;
use crate::types::Candidate;

const QUERY_PLACEHOLDER: &str = "{query}";

#[async_trait]
pub trait CandidateSource: Send + Sync {
    fn name(&self) -> &str;
    async fn search(&self, query: &str) -> Result<Vec<Candidate>, SourceError>;
}

/// Fill the `{query}` slot of a URL template with the form-encoded query.
pub fn build_url(template: &str, query: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.trim().as_bytes()).collect();
    template.replace(QUERY_PLACEHOLDER, &encoded)
}

/// Template-driven adapter over the shared fetch client.
pub struct WebSource {
    spec: SourceSpec,
    client: Arc<FetchClient>,
    filter: Arc<ShoppingFilter>,
    limit: usize,
}

impl WebSource {
    pub fn new(
        spec: SourceSpec,
        client: Arc<FetchClient>,
        filter: Arc<ShoppingFilter>,
        default_limit: usize,
    ) -> Self {
        let limit = spec.limit.unwrap_or(default_limit).max(1);
        Self {
            spec,
            client,
            filter,
            limit,
        }
    }

    /// Candidates from one already-fetched results page.
    pub fn parse_page(&self, page_url: &str, html: &str) -> Vec<Candidate> {
        let base = self
            .spec
            .base
            .as_deref()
            .and_then(|b| Url::parse(b).ok())
            .or_else(|| Url::parse(page_url).ok());
        let Some(base) = base else {
            return Vec::new();
        };

        let doc = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for anchor in doc.select(anchor_selector()) {
            if out.len() >= self.limit {
                break;
            }
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(url) = normalize_href(href, &base, &self.spec.kind) else {
                continue;
            };
            if !self.filter.accepts(&url) {
                continue;
            }
            let Some(key) = dedup_key(&url) else {
                continue;
            };
            if !seen.insert(key) {
                continue;
            }
            let title = anchor_title(&anchor).unwrap_or_else(|| host_of(&url));
            out.push(Candidate::new(title, url, self.spec.name.clone()));
        }
        out
    }
}

#[async_trait]
impl CandidateSource for WebSource {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn search(&self, query: &str) -> Result<Vec<Candidate>, SourceError> {
        let url = build_url(&self.spec.template, query);
        let page = self.client.fetch(&url).await.map_err(|e| match e {
            FetchError::Timeout => SourceError::Timeout,
            other => SourceError::Fetch(other),
        })?;
        let found = self.parse_page(&url, &page.body);
        debug!(source = %self.spec.name, candidates = found.len(), "source page parsed");
        Ok(found)
    }
}

fn anchor_selector() -> &'static Selector {
    static SEL: OnceCell<Selector> = OnceCell::new();
    SEL.get_or_init(|| Selector::parse("a[href]").unwrap())
}

fn anchor_title(anchor: &ElementRef) -> Option<String> {
    let text = anchor
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    let text = if text.is_empty() {
        anchor.value().attr("title").map(str::trim).unwrap_or_default().to_string()
    } else {
        text
    };
    (!text.is_empty()).then_some(text)
}

fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}
