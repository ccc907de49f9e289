// tests/pipeline_scenarios.rs
//
// End-to-end aggregation scenarios over mock sources:
// dedup with price preference, partial failure, total failure,
// request deadline, candidate cap, and the unpriced-result policy.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use pricewise::config::ScrapeConfig;
use serde_json::Value as Json;

use common::{app_with_sources, candidate, post_scrape, test_config, CountingTransport, MockSource};

fn parse(text: &str) -> Json {
    serde_json::from_str(text).expect("json body")
}

#[tokio::test]
async fn duplicate_listing_keeps_the_priced_copy() {
    let url = "https://www.amazon.in/dp/B0CHX1W1XY";
    let alpha = MockSource::found("alpha", vec![candidate(url, "alpha", None)]);
    let beta = MockSource::found("beta", vec![candidate(url, "beta", Some("₹79,900"))]);
    let t = Arc::new(CountingTransport::new());
    let app = app_with_sources(&test_config(), vec![alpha, beta], t.clone());

    let (status, _, text) = post_scrape(&app, r#"{"query": "iPhone 15"}"#).await;
    assert_eq!(status, StatusCode::OK);
    let v = parse(&text);
    assert_eq!(v["product"], "iphone 15");
    let results = v["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["url"], url);
    assert_eq!(results[0]["price"], "₹79,900");
    assert_eq!(t.calls(), 0, "already priced, nothing to fetch");
}

#[tokio::test]
async fn some_sources_failing_still_returns_the_rest() {
    let cfg = ScrapeConfig {
        source_timeout_ms: 200,
        ..test_config()
    };
    let good = MockSource::found(
        "good",
        vec![candidate("https://www.flipkart.com/p/itm1", "good", Some("₹999"))],
    );
    let broken = MockSource::failing("broken");
    let slow = MockSource::stalling("slow", Duration::from_secs(5));
    let app = app_with_sources(
        &cfg,
        vec![broken.clone(), good.clone(), slow.clone()],
        Arc::new(CountingTransport::new()),
    );

    let started = Instant::now();
    let (status, _, text) = post_scrape(&app, r#"{"query": "tv"}"#).await;
    assert_eq!(status, StatusCode::OK, "partial failure is not an aggregate failure");
    assert!(started.elapsed() < Duration::from_secs(3));

    let v = parse(&text);
    let results = v["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["source"], "good");
    for s in [&broken, &good, &slow] {
        assert_eq!(s.calls.load(Ordering::SeqCst), 1, "each source is tried exactly once");
    }
}

#[tokio::test]
async fn all_sources_timing_out_is_a_structured_error() {
    let cfg = ScrapeConfig {
        source_timeout_ms: 100,
        ..test_config()
    };
    let app = app_with_sources(
        &cfg,
        vec![
            MockSource::stalling("a", Duration::from_secs(5)),
            MockSource::stalling("b", Duration::from_secs(5)),
        ],
        Arc::new(CountingTransport::new()),
    );

    let (status, _, text) = post_scrape(&app, r#"{"query": "Best Sony WH-1000XM5 headphones"}"#).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let v = parse(&text);
    assert!(v["error"].as_str().unwrap().contains("2 sources failed"));
    assert_eq!(v["product"], "sony wh 1000xm5 headphones");
    assert_eq!(v["results"], Json::Array(vec![]));
}

#[tokio::test]
async fn request_deadline_returns_partial_results() {
    let cfg = ScrapeConfig {
        source_timeout_ms: 10_000,
        request_deadline_ms: 300,
        ..test_config()
    };
    let fast = MockSource::found(
        "fast",
        vec![candidate("https://www.croma.com/p/1", "fast", Some("₹1,499"))],
    );
    let stuck = MockSource::stalling("stuck", Duration::from_secs(10));
    let app = app_with_sources(&cfg, vec![stuck, fast], Arc::new(CountingTransport::new()));

    let started = Instant::now();
    let (status, _, text) = post_scrape(&app, r#"{"query": "mixer grinder"}"#).await;
    assert!(started.elapsed() < Duration::from_secs(3), "deadline must cut the stalled source");
    assert_eq!(status, StatusCode::OK);
    let v = parse(&text);
    assert_eq!(v["results"][0]["url"], "https://www.croma.com/p/1");
}

#[tokio::test]
async fn results_never_exceed_cap_or_requested_max() {
    let cfg = ScrapeConfig {
        candidate_cap: 5,
        ..test_config()
    };
    let many: Vec<_> = (0..40)
        .map(|i| candidate(&format!("https://shop.example/product/{i}"), "bulk", None))
        .collect();
    let t = Arc::new(CountingTransport::new());
    let app = app_with_sources(&cfg, vec![MockSource::found("bulk", many)], t.clone());

    let (_, _, text) = post_scrape(&app, r#"{"query": "usb cable", "max_results": 20}"#).await;
    let v = parse(&text);
    assert_eq!(v["results"].as_array().unwrap().len(), 5);
    assert_eq!(t.calls(), 5, "price fan-out is bounded by the cap");

    let (_, _, text) = post_scrape(&app, r#"{"query": "usb cable", "max_results": 3}"#).await;
    assert_eq!(parse(&text)["results"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn unpriced_policy_and_placeholder_message() {
    let cfg = ScrapeConfig {
        include_unpriced: false,
        ..test_config()
    };
    let src = MockSource::found(
        "only",
        vec![candidate("https://shop.example/product/1", "only", None)],
    );
    let app = app_with_sources(&cfg, vec![src], Arc::new(CountingTransport::new()));

    let (status, _, text) = post_scrape(&app, r#"{"query": "kettle"}"#).await;
    assert_eq!(status, StatusCode::OK, "zero priced results is still a success");
    let v = parse(&text);
    assert_eq!(v["results"], Json::Array(vec![]));
    assert_eq!(v["message"], "No price results found");
}

#[tokio::test]
async fn priced_results_rank_above_unpriced_tier_one() {
    let src = MockSource::found(
        "mixed",
        vec![
            candidate("https://www.amazon.in/dp/A", "mixed", None),
            candidate("https://local.example/shop/a", "mixed", Some("₹10")),
        ],
    );
    let app = app_with_sources(&test_config(), vec![src], Arc::new(CountingTransport::new()));
    let (_, _, text) = post_scrape(&app, r#"{"query": "anything"}"#).await;
    let v = parse(&text);
    assert_eq!(v["results"][0]["url"], "https://local.example/shop/a");
    assert_eq!(v["results"][1]["url"], "https://www.amazon.in/dp/A");
    assert!(v["results"][1].get("price").is_none());
}
