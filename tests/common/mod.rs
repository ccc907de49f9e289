// tests/common/mod.rs
//
// Shared fixtures for integration tests. Nothing here touches the network:
// a counting in-memory transport serves canned pages by URL prefix, and mock
// sources return canned candidates (or fail / stall on request).
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use reqwest::header::HeaderMap as ReqHeaders;
use tower::ServiceExt as _;

use pricewise::config::{ScrapeConfig, SourceSpec};
use pricewise::fetch::{FetchClient, RawResponse, RetryPolicy, Transport};
use pricewise::sources::CandidateSource;
use pricewise::{Aggregator, Candidate, FetchError, SourceError};

const BODY_LIMIT: usize = 1024 * 1024;

/// Serves the first route whose prefix matches; anything else is a 404.
#[derive(Default)]
pub struct CountingTransport {
    routes: Vec<(String, RawResponse)>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl CountingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, prefix: &str, resp: RawResponse) -> Self {
        self.routes.push((prefix.to_string(), resp));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn get(
        &self,
        url: &str,
        _headers: ReqHeaders,
        _timeout: Duration,
    ) -> Result<RawResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(url.to_string());
        Ok(self
            .routes
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| RawResponse::status(404)))
    }
}

pub enum Behavior {
    Found(Vec<Candidate>),
    Fail,
    Stall(Duration),
}

pub struct MockSource {
    name: String,
    behavior: Behavior,
    pub calls: AtomicUsize,
}

impl MockSource {
    pub fn found(name: &str, candidates: Vec<Candidate>) -> Arc<Self> {
        Self::with(name, Behavior::Found(candidates))
    }
    pub fn failing(name: &str) -> Arc<Self> {
        Self::with(name, Behavior::Fail)
    }
    pub fn stalling(name: &str, for_: Duration) -> Arc<Self> {
        Self::with(name, Behavior::Stall(for_))
    }
    fn with(name: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            behavior,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CandidateSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &str) -> Result<Vec<Candidate>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Found(c) => Ok(c.clone()),
            Behavior::Fail => Err(SourceError::Fetch(FetchError::Status(503))),
            Behavior::Stall(d) => {
                tokio::time::sleep(*d).await;
                Ok(Vec::new())
            }
        }
    }
}

pub fn candidate(url: &str, source: &str, price: Option<&str>) -> Candidate {
    let mut c = Candidate::new(format!("listing from {source}"), url, source);
    c.price = price.map(str::to_string);
    c
}

/// Small timeouts, one search template, no locale suffix, refinement off.
pub fn test_config() -> ScrapeConfig {
    ScrapeConfig {
        workers: 4,
        fetch_timeout_ms: 500,
        retry_attempts: 2,
        backoff_base_ms: 1,
        source_timeout_ms: 1_000,
        request_deadline_ms: 3_000,
        cache_ttl_ms: 30_000,
        locale_suffix: None,
        sources: vec![SourceSpec::search(
            "mocksearch",
            "https://search.test/html/?q={query}",
        )],
        ..ScrapeConfig::default()
    }
}

pub fn fetch_client(cfg: &ScrapeConfig, transport: Arc<CountingTransport>) -> Arc<FetchClient> {
    Arc::new(FetchClient::new(
        transport,
        cfg.fetch_timeout(),
        RetryPolicy {
            attempts: cfg.retry_attempts,
            base_backoff: Duration::from_millis(cfg.backoff_base_ms),
        },
    ))
}

/// Router over mock sources; pricing goes through `transport`.
pub fn app_with_sources(
    cfg: &ScrapeConfig,
    sources: Vec<Arc<MockSource>>,
    transport: Arc<CountingTransport>,
) -> Router {
    let sources: Vec<Arc<dyn CandidateSource>> = sources
        .into_iter()
        .map(|s| s as Arc<dyn CandidateSource>)
        .collect();
    let aggregator = Aggregator::new(cfg, sources, fetch_client(cfg, transport));
    pricewise::app_with(cfg, aggregator)
}

/// Router over the configured web sources, all served by `transport`.
pub fn app_with_transport(cfg: &ScrapeConfig, transport: Arc<CountingTransport>) -> Router {
    pricewise::app_with(cfg, Aggregator::with_transport(cfg, transport))
}

pub async fn post_scrape(app: &Router, body: &str) -> (StatusCode, HeaderMap, String) {
    let req = Request::builder()
        .method("POST")
        .uri("/scrape")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build POST /scrape");
    let resp = app.clone().oneshot(req).await.expect("router response");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, headers, String::from_utf8(bytes.to_vec()).expect("utf8 body"))
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET");
    let resp = app.clone().oneshot(req).await.expect("router response");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, String::from_utf8(bytes.to_vec()).expect("utf8 body"))
}

pub fn cache_header(headers: &HeaderMap) -> String {
    headers
        .get("X-Cache")
        .expect("X-Cache header must be present")
        .to_str()
        .expect("ascii header")
        .to_string()
}
