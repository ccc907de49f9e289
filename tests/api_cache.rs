//! Integration tests for result-cache behavior on POST /scrape.
//!
//! Covered:
//! - MISS → HIT for an identical request (via `X-Cache` header)
//! - HIT payload is byte-identical and triggers no new fan-out
//! - Query normalization (case / whitespace) shares one cache entry
//! - `max_results` is part of the key
//! - Expiry after TTL turns into MISS again

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use pricewise::fetch::RawResponse;

use common::{app_with_transport, cache_header, post_scrape, test_config, CountingTransport};

const SEARCH_PAGE: &str = r#"<html><body>
  <a href="https://www.croma.com/samsung-galaxy-s24/p/303838">Samsung Galaxy S24</a>
  <a href="https://gadgets.example/store/galaxy-s24">Galaxy S24 deal</a>
</body></html>"#;

const PRODUCT_PAGE: &str =
    r#"<html><body><span id="pdp-product-price">₹74,999</span></body></html>"#;

fn transport() -> Arc<CountingTransport> {
    Arc::new(
        CountingTransport::new()
            .route("https://search.test/", RawResponse::html(SEARCH_PAGE))
            .route("https://www.croma.com/", RawResponse::html(PRODUCT_PAGE)),
    )
}

#[tokio::test]
async fn cache_miss_then_hit_for_identical_request() {
    let t = transport();
    let app = app_with_transport(&test_config(), t.clone());
    let body = r#"{"query": "galaxy s24", "max_results": 5}"#;

    let (s1, h1, b1) = post_scrape(&app, body).await;
    assert_eq!(s1, StatusCode::OK);
    assert_eq!(cache_header(&h1), "MISS", "first identical request should be MISS");
    let calls_after_first = t.calls();
    assert!(calls_after_first > 0);

    let (s2, h2, b2) = post_scrape(&app, body).await;
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(cache_header(&h2), "HIT", "second identical request should be HIT");
    assert_eq!(b1, b2, "cached payload must be byte-identical");
    assert_eq!(t.calls(), calls_after_first, "a HIT must not fan out again");
}

#[tokio::test]
async fn normalized_query_shares_entry_but_max_results_does_not() {
    let t = transport();
    let app = app_with_transport(&test_config(), t.clone());

    let (_, h1, _) = post_scrape(&app, r#"{"query": "Galaxy S24", "max_results": 2}"#).await;
    assert_eq!(cache_header(&h1), "MISS");

    let (_, h2, _) = post_scrape(&app, r#"{"query": "  galaxy   s24 ", "max_results": 2}"#).await;
    assert_eq!(cache_header(&h2), "HIT", "case and spacing are normalized away");

    let (_, h3, _) = post_scrape(&app, r#"{"query": "galaxy s24", "max_results": 3}"#).await;
    assert_eq!(cache_header(&h3), "MISS", "different max_results is a different key");
}

#[tokio::test]
async fn cache_expires_after_ttl_and_turns_into_miss_again() {
    const TTL_MS: u64 = 50;
    let t = transport();
    let cfg = pricewise::config::ScrapeConfig {
        cache_ttl_ms: TTL_MS,
        ..test_config()
    };
    let app = app_with_transport(&cfg, t.clone());
    let body = r#"{"query": "galaxy s24"}"#;

    let (_, h1, _) = post_scrape(&app, body).await;
    assert_eq!(cache_header(&h1), "MISS");
    let (_, h2, _) = post_scrape(&app, body).await;
    assert_eq!(cache_header(&h2), "HIT");
    let before = t.calls();

    // well past the TTL to avoid timer boundary flakes
    tokio::time::sleep(Duration::from_millis(TTL_MS * 5)).await;

    let (s3, h3, _) = post_scrape(&app, body).await;
    assert_eq!(s3, StatusCode::OK);
    assert_eq!(cache_header(&h3), "MISS", "expired entry must be recomputed");
    assert!(t.calls() > before, "recompute fans out again");
}

#[tokio::test]
async fn failures_are_not_cached() {
    // no routes: every fetch is a 404, so the only source fails
    let t = Arc::new(CountingTransport::new());
    let app = app_with_transport(&test_config(), t.clone());
    let body = r#"{"query": "galaxy s24"}"#;

    let (s1, h1, _) = post_scrape(&app, body).await;
    assert_eq!(s1, StatusCode::BAD_GATEWAY);
    assert_eq!(cache_header(&h1), "MISS");

    let (s2, h2, _) = post_scrape(&app, body).await;
    assert_eq!(s2, StatusCode::BAD_GATEWAY);
    assert_eq!(cache_header(&h2), "MISS");
    assert_eq!(t.calls(), 2);
}
