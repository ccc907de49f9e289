// src/api.rs
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::error::ScrapeError;
use crate::pipeline::{Aggregator, CacheStatus};
use crate::query::clean_query;
use crate::types::{ErrorResponse, ScrapeRequest};

pub const CACHE_HEADER: &str = "x-cache";

const BANNER: &str = "pricewise: POST /scrape {\"query\": \"...\", \"max_results\": 5}";

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
}

impl AppState {
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/ping", get(ping))
        .route("/scrape", post(scrape))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn home() -> &'static str {
    BANNER
}

async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn scrape(State(state): State<AppState>, body: Bytes) -> Response {
    let req = parse_request(&body);

    match state.aggregator.scrape(&req).await {
        Ok(served) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/json"),
                (HeaderName::from_static(CACHE_HEADER), served.cache.as_str()),
            ],
            served.payload.as_str().to_owned(),
        )
            .into_response(),
        Err(err) => error_response(&req, err),
    }
}

/// Fields are read independently: a malformed body is a missing query, and a
/// `max_results` that is not a non-negative integer falls back to the default.
fn parse_request(body: &[u8]) -> ScrapeRequest {
    let Ok(v) = serde_json::from_slice::<serde_json::Value>(body) else {
        return ScrapeRequest {
            query: None,
            max_results: None,
        };
    };
    ScrapeRequest {
        query: v.get("query").and_then(|q| q.as_str()).map(str::to_string),
        max_results: v
            .get("max_results")
            .and_then(|m| m.as_u64())
            .and_then(|m| usize::try_from(m).ok()),
    }
}

fn error_response(req: &ScrapeRequest, err: ScrapeError) -> Response {
    let body = match &err {
        ScrapeError::EmptyQuery => ErrorResponse {
            error: err.to_string(),
            product: None,
            results: None,
        },
        ScrapeError::AllSourcesFailed { .. } => ErrorResponse {
            error: err.to_string(),
            product: req.query.as_deref().map(clean_query),
            results: Some(Vec::new()),
        },
    };
    (
        err.status(),
        [(HeaderName::from_static(CACHE_HEADER), CacheStatus::Miss.as_str())],
        Json(body),
    )
        .into_response()
}
