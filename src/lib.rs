// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod query;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::cache::{CacheConfig, CacheStats, ResultCache};
pub use crate::config::{ApiKeys, NewsConfig};
pub use crate::engine::{AggregateResult, Aggregator, CacheStatus, ProviderStats};
pub use crate::error::{AggregateError, ApiError, QueryError};
pub use crate::ingest::types::{Category, FetchParams, NewsItem, SourceProvider};
pub use crate::query::AggregateQuery;

use std::sync::Arc;

/// Build the full application state from config + env: providers, cache,
/// per-provider timeout. Shared by the Shuttle entrypoint and tests.
pub fn build_state(cfg: &NewsConfig, keys: &ApiKeys) -> anyhow::Result<AppState> {
    let providers = ingest::providers::build_providers(cfg, keys)?;
    let aggregator = Aggregator::new(
        providers,
        CacheConfig {
            ttl: cfg.cache.ttl(),
            max_entries: cfg.cache.max_entries,
        },
    )
    .with_provider_timeout(cfg.http.timeout());
    Ok(AppState::new(Arc::new(aggregator), cfg.paging.clone()))
}
