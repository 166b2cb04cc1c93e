// src/ingest/providers/mod.rs
pub mod guardian;
pub mod newsapi;
pub mod nyt;
pub mod rss;

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;

use crate::config::{ApiKeys, NewsConfig};
use crate::ingest::types::SourceProvider;

pub use guardian::GuardianProvider;
pub use newsapi::NewsApiProvider;
pub use nyt::NytProvider;
pub use rss::RssProvider;

/// Shared HTTP client for upstream calls (timeout + UA from config).
pub fn http_client(cfg: &NewsConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(cfg.http.user_agent.as_str())
        .connect_timeout(cfg.http.timeout().min(std::time::Duration::from_secs(4)))
        .timeout(cfg.http.timeout())
        .build()
        .context("building http client")
}

/// Keyed APIs are registered only when their credential is present; RSS is
/// always registered (unless disabled in config) as the keyless fallback.
pub fn build_providers(cfg: &NewsConfig, keys: &ApiKeys) -> Result<Vec<Arc<dyn SourceProvider>>> {
    let client = http_client(cfg)?;
    let mut out: Vec<Arc<dyn SourceProvider>> = Vec::new();

    if let Some(key) = &keys.newsapi {
        out.push(Arc::new(NewsApiProvider::new(
            client.clone(),
            &cfg.providers.newsapi.base_url,
            key,
        )));
    }
    if let Some(key) = &keys.guardian {
        out.push(Arc::new(GuardianProvider::new(
            client.clone(),
            &cfg.providers.guardian.base_url,
            key,
        )));
    }
    if let Some(key) = &keys.nyt {
        out.push(Arc::new(NytProvider::new(
            client.clone(),
            &cfg.providers.nyt.base_url,
            key,
        )));
    }
    if cfg.rss.enabled {
        out.push(Arc::new(RssProvider::new(client, cfg.rss.clone())));
    }

    if out.is_empty() {
        return Err(anyhow!("no news providers configured"));
    }
    Ok(out)
}

/// Map a non-2xx upstream status to an error, calling out rate limits.
pub(crate) fn check_status(provider: &str, status: reqwest::StatusCode) -> Result<()> {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!(provider, "upstream rate limit exceeded");
        return Err(anyhow!("{provider}: rate limited (429)"));
    }
    if !status.is_success() {
        return Err(anyhow!("{provider}: upstream returned {status}"));
    }
    Ok(())
}
