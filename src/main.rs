//! pricewise binary entrypoint: loads `.env`, initializes tracing and serves
//! the Axum router on Shuttle.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    pricewise::init_tracing();

    let router = pricewise::app().await?;
    Ok(router.into())
}
