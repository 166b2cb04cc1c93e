//! # Aggregation Engine
//! Scatter-gather over every registered provider, then merge → dedup → sort →
//! paginate, with results cached per query signature.
//!
//! Policy: providers are fault-isolated (a failure, panic or timeout yields an
//! empty batch and a zero in `sourceStats`); only a fan-out the engine itself
//! could not complete (runtime shutting down) surfaces as [`AggregateError`].
//! Items without a timestamp sort as oldest, keeping their relative order.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{CacheConfig, CacheStats, ResultCache};
use crate::error::AggregateError;
use crate::fingerprint;
use crate::ingest::types::{Category, FetchParams, NewsItem, SourceProvider};
use crate::query::{AggregateQuery, MAX_PAGE_SIZE};

/// Per-provider upper bound on one fetch.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Output of one aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub items: Vec<NewsItem>,
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page: Option<u32>,
    /// Items yielded per provider display name, zero included.
    pub source_stats: BTreeMap<String, usize>,
    /// Deduplicated count before slicing.
    pub total_items: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Tagged result of one provider task.
#[derive(Debug)]
pub enum ProviderOutcome {
    Fetched(Vec<NewsItem>),
    Failed(String),
}

impl ProviderOutcome {
    fn into_items(self) -> Vec<NewsItem> {
        match self {
            ProviderOutcome::Fetched(items) => items,
            ProviderOutcome::Failed(_) => Vec::new(),
        }
    }
}

/// Read-only introspection for the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStats {
    pub total_providers: usize,
    pub provider_names: Vec<String>,
    pub cache: CacheStats,
}

/// Merge already-fetched batches into one page (steps 3-6 of an aggregation).
///
/// Batches are concatenated in the order given, deduplicated (first wins),
/// stably sorted newest-first (missing timestamps last) and sliced.
/// Returns (page items, total deduplicated, next page).
pub fn merge_page(
    batches: Vec<Vec<NewsItem>>,
    page: u32,
    page_size: u32,
) -> (Vec<NewsItem>, usize, Option<u32>) {
    let all: Vec<NewsItem> = batches.into_iter().flatten().collect();
    let (mut unique, _dropped) = fingerprint::dedup(all);

    // Option<i64>: None < Some, so descending puts missing timestamps last.
    unique.sort_by_cached_key(|it| std::cmp::Reverse(it.published_ts()));

    let total = unique.len();
    let start = (page.saturating_sub(1) as usize).saturating_mul(page_size as usize);
    let end = start.saturating_add(page_size as usize);

    let items = if start >= total {
        Vec::new()
    } else {
        unique
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect()
    };
    let next_page = (end < total).then_some(page + 1);

    (items, total, next_page)
}

/// Aggregation engine: an ordered provider list plus a result cache.
///
/// Built once at startup and shared by reference (`Arc`) with the HTTP layer.
pub struct Aggregator {
    providers: Vec<Arc<dyn SourceProvider>>,
    cache: ResultCache,
    provider_timeout: Duration,
}

impl Aggregator {
    pub fn new(providers: Vec<Arc<dyn SourceProvider>>, cache: CacheConfig) -> Self {
        info!(
            providers = providers.len(),
            names = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "initialized news providers"
        );
        crate::metrics::ensure_metrics_described();
        metrics::gauge!("news_cache_ttl_ms").set(cache.ttl.as_millis() as f64);
        Self {
            providers,
            cache: ResultCache::new(cache),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub async fn fetch_aggregate(
        &self,
        query: &AggregateQuery,
    ) -> Result<Arc<AggregateResult>, AggregateError> {
        self.fetch_aggregate_traced(query).await.map(|(r, _)| r)
    }

    /// Like [`Self::fetch_aggregate`], also reporting whether the cache answered.
    pub async fn fetch_aggregate_traced(
        &self,
        query: &AggregateQuery,
    ) -> Result<(Arc<AggregateResult>, CacheStatus), AggregateError> {
        debug_assert!(query.page() >= 1, "page must be validated upstream");
        debug_assert!(
            (1..=MAX_PAGE_SIZE).contains(&query.page_size()),
            "page size must be validated upstream"
        );

        // 1) Cache
        let key = query.signature();
        if let Some(hit) = self.cache.get(&key) {
            debug!(%key, "returning cached news results");
            metrics::counter!("news_cache_hits_total").increment(1);
            return Ok((hit, CacheStatus::Hit));
        }
        metrics::counter!("news_cache_misses_total").increment(1);

        // 2) Fan out
        let t0 = Instant::now();
        let params = query.fetch_params();
        let outcomes = self.fan_out(&params).await?;

        let mut source_stats = BTreeMap::new();
        let mut batches = Vec::with_capacity(outcomes.len());
        for (provider, outcome) in self.providers.iter().zip(outcomes) {
            if let ProviderOutcome::Failed(reason) = &outcome {
                warn!(provider = provider.name(), %reason, "provider contributed no items");
                metrics::counter!("news_provider_failures_total", "provider" => provider.name().to_string())
                    .increment(1);
            }
            let items = outcome.into_items();
            metrics::counter!("news_provider_items_total", "provider" => provider.name().to_string())
                .increment(items.len() as u64);
            // Two providers sharing a display name share one counter.
            *source_stats.entry(provider.name().to_string()).or_insert(0) += items.len();
            batches.push(items);
        }

        // 3-6) Merge, dedup, sort, paginate
        let (items, total_items, next_page) = merge_page(batches, query.page(), query.page_size());
        let result = Arc::new(AggregateResult {
            items,
            page: query.page(),
            next_page,
            source_stats,
            total_items,
        });

        // 7) Cache
        self.cache.insert(key, Arc::clone(&result));

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        metrics::histogram!("news_aggregate_ms").record(ms);
        metrics::counter!("news_aggregations_total").increment(1);
        info!(
            total = total_items,
            page = query.page(),
            elapsed_ms = ms as u64,
            "aggregated news"
        );

        Ok((result, CacheStatus::Miss))
    }

    /// One spawned task per provider, joined in registration order.
    ///
    /// A panicking provider is just a failed outcome; a cancelled task means
    /// the runtime is going away and the aggregation cannot finish.
    async fn fan_out(&self, params: &FetchParams) -> Result<Vec<ProviderOutcome>, AggregateError> {
        let timeout = self.provider_timeout;
        let handles = self.providers.iter().map(|p| {
            let provider = Arc::clone(p);
            let mut params = params.clone();
            // Category-blind upstreams get an unscoped fetch
            if !provider.supports_categories() {
                params.category = None;
            }
            tokio::spawn(async move {
                match tokio::time::timeout(timeout, provider.fetch_items(&params)).await {
                    Ok(items) => ProviderOutcome::Fetched(items),
                    Err(_) => ProviderOutcome::Failed(format!("timed out after {timeout:?}")),
                }
            })
        });

        join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(outcome) => Ok(outcome),
                Err(e) if e.is_cancelled() => Err(AggregateError::Internal(format!(
                    "provider task cancelled: {e}"
                ))),
                Err(e) => Ok(ProviderOutcome::Failed(format!("provider task failed: {e}"))),
            })
            .collect()
    }

    pub async fn search_news(
        &self,
        q: &str,
        category: Option<Category>,
        page: u32,
        page_size: u32,
    ) -> Result<Arc<AggregateResult>, AggregateError> {
        let query = AggregateQuery::new(category, Some(q), page, page_size)?;
        self.fetch_aggregate(&query).await
    }

    pub async fn news_by_category(
        &self,
        category: Category,
        page: u32,
        page_size: u32,
    ) -> Result<Arc<AggregateResult>, AggregateError> {
        let query = AggregateQuery::new(Some(category), None, page, page_size)?;
        self.fetch_aggregate(&query).await
    }

    pub async fn latest_news(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Arc<AggregateResult>, AggregateError> {
        let query = AggregateQuery::new(None, None, page, page_size)?;
        self.fetch_aggregate(&query).await
    }

    pub fn provider_stats(&self) -> ProviderStats {
        ProviderStats {
            total_providers: self.providers.len(),
            provider_names: self.providers.iter().map(|p| p.name().to_string()).collect(),
            cache: self.cache.stats(),
        }
    }
}
