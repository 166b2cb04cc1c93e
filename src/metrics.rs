// src/metrics.rs
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use ::metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// Attach help text to every series the crate emits. Idempotent.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "news_provider_items_total",
            "Items returned per provider before deduplication."
        );
        describe_counter!(
            "news_provider_failures_total",
            "Provider fetches that failed, panicked or timed out."
        );
        describe_counter!("news_rss_feed_failures_total", "Individual RSS feeds that failed.");
        describe_counter!("news_cache_hits_total", "Aggregations answered from cache.");
        describe_counter!("news_cache_misses_total", "Aggregations that fanned out.");
        describe_counter!("news_aggregations_total", "Completed fan-out aggregations.");
        describe_histogram!("news_aggregate_ms", "Fan-out plus merge time in milliseconds.");
        describe_histogram!("news_rss_parse_ms", "RSS document parse time in milliseconds.");
        describe_gauge!("news_cache_ttl_ms", "Configured result cache TTL in milliseconds.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Call once, from the binary.
    pub fn init(ttl_ms: u64) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        ensure_metrics_described();
        // Idle TTL: every hit restarts it
        gauge!("news_cache_ttl_ms").set(ttl_ms as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
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
