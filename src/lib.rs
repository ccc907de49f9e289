// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod price;
pub mod query;
pub mod rank;
pub mod refine;
pub mod shopping;
pub mod sources;
pub mod types;

pub use crate::api::router;
pub use crate::error::{FetchError, ScrapeError, SourceError};
pub use crate::pipeline::Aggregator;
pub use crate::types::{Candidate, ScrapeRequest, ScrapeResponse};

use anyhow::Context;
use axum::Router;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::ScrapeConfig;

/// Install the global subscriber. `LOG_FORMAT=json` selects JSON lines.
/// A no-op when the host runtime already installed one.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pricewise=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

/// Build the full router from `config::load_default()`.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = config::load_default().context("loading pricewise config")?;
    let aggregator = Aggregator::from_config(&cfg).context("building aggregator")?;
    Ok(app_with(&cfg, aggregator))
}

/// Router around a prepared aggregator: cache sweeper, optional `/metrics`.
pub fn app_with(cfg: &ScrapeConfig, aggregator: Aggregator) -> Router {
    cache::spawn_sweeper(aggregator.cache(), cfg.cache_ttl());
    info!(
        target: "pricewise",
        sources = aggregator.source_count(),
        workers = cfg.workers,
        cache_ttl_ms = cfg.cache_ttl_ms,
        metrics = cfg.metrics.enabled,
        "pricewise ready"
    );

    let mut app = api::router(api::AppState::new(aggregator));
    if cfg.metrics.enabled {
        if let Some(m) = metrics::Metrics::init(cfg.cache_ttl_ms) {
            app = app.merge(m.router());
        }
    }
    app
}
