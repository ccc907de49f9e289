// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time series descriptions. Only meaningful once a recorder is installed.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scrape_requests_total", "POST /scrape requests received.");
        describe_counter!("scrape_cache_hits_total", "Requests answered from the result cache.");
        describe_counter!("scrape_cache_misses_total", "Requests that ran the pipeline.");
        describe_counter!(
            "scrape_source_errors_total",
            "Source adapters that failed or timed out, by source."
        );
        describe_counter!("scrape_prices_found_total", "Candidates priced by the extractor.");
        describe_counter!("scrape_prices_missing_total", "Candidates left without a price.");
        describe_counter!("fetch_retries_total", "Fetch attempts retried after a transient status.");
        describe_counter!("fetch_rejected_total", "Fetches that produced no usable page.");
        describe_histogram!("scrape_duration_ms", "Pipeline wall time per uncached request.");
        describe_gauge!("scrape_cache_ttl_ms", "Configured result cache TTL.");
    });
}

/// Process-wide Prometheus recorder. Installing twice is an error in the
/// `metrics` facade, so the handle is kept once and shared.
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the recorder (first call only) and publish the cache TTL gauge.
    /// `None` when another recorder already owns the process.
    pub fn init(ttl_ms: u64) -> Option<Self> {
        static HANDLE: OnceCell<Option<PrometheusHandle>> = OnceCell::new();
        let handle = HANDLE
            .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
                Ok(h) => Some(h),
                Err(e) => {
                    tracing::warn!(error = %e, "prometheus recorder not installed");
                    None
                }
            })
            .clone()?;
        ensure_metrics_described();
        gauge!("scrape_cache_ttl_ms").set(ttl_ms as f64);
        Some(Self { handle })
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
