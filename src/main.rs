//! News aggregation service: binary entrypoint.
//! Loads config + credentials, registers providers, boots the Axum router
//! with the Prometheus `/metrics` route merged in.

use news_aggregator::config::{ApiKeys, NewsConfig};
use news_aggregator::logging::init_tracing;
use news_aggregator::metrics::Metrics;
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = NewsConfig::load_default()?;
    let keys = ApiKeys::from_env();

    let metrics = Metrics::init(cfg.cache.ttl().as_millis() as u64)?;
    let state = news_aggregator::build_state(&cfg, &keys)?;

    let router = news_aggregator::router(state).merge(metrics.router());
    Ok(router.into())
}
