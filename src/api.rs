// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::cache::CacheStats;
use crate::config::PagingSection;
use crate::engine::Aggregator;
use crate::error::ApiError;
use crate::query::{AggregateQuery, RawQuery};

/// Shared CDN caching policy for news pages.
pub const CACHE_CONTROL: &str = "public, s-maxage=300, stale-while-revalidate=600";
/// Diagnostics header carrying HIT or MISS.
pub const CACHE_STATUS_HEADER: &str = "x-news-cache";

#[derive(Clone)]
pub struct AppState {
    aggregator: Arc<Aggregator>,
    paging: PagingSection,
}

impl AppState {
    pub fn new(aggregator: Arc<Aggregator>, paging: PagingSection) -> Self {
        Self { aggregator, paging }
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/news", get(get_news).head(head_news))
        .route("/api/news/health", get(news_health))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn get_news(
    State(state): State<AppState>,
    Query(raw): Query<RawQuery>,
) -> Result<Response, ApiError> {
    let query = AggregateQuery::from_raw(
        &raw,
        state.paging.default_page_size,
        state.paging.max_page_size,
    )?;
    let (result, status) = state.aggregator.fetch_aggregate_traced(&query).await?;

    let mut resp = Json(&*result).into_response();
    let headers = resp.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static(status.as_str()));
    Ok(resp)
}

/// Liveness probe: no aggregation, no body.
async fn head_news() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResp {
    status: &'static str,
    providers: usize,
    provider_names: Vec<String>,
    cache: CacheStats,
    timestamp: String,
}

async fn news_health(State(state): State<AppState>) -> Json<HealthResp> {
    let stats = state.aggregator.provider_stats();
    Json(HealthResp {
        status: "healthy",
        providers: stats.total_providers,
        provider_names: stats.provider_names,
        cache: stats.cache,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
