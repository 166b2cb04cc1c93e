// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::fingerprint::news_id;

/// Closed set of feed categories, in declaration order.
///
/// Declaration order matters: keyword classification scans categories in
/// this order and the first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    World,
    Business,
    Tech,
    Sports,
    Entertainment,
    Science,
    Crypto,
    Finance,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::World,
        Category::Business,
        Category::Tech,
        Category::Sports,
        Category::Entertainment,
        Category::Science,
        Category::Crypto,
        Category::Finance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::World => "world",
            Category::Business => "business",
            Category::Tech => "tech",
            Category::Sports => "sports",
            Category::Entertainment => "entertainment",
            Category::Science => "science",
            Category::Crypto => "crypto",
            Category::Finance => "finance",
        }
    }

    /// Human label used by the feed UI.
    pub fn label(self) -> &'static str {
        match self {
            Category::World => "World",
            Category::Business => "Business",
            Category::Tech => "Technology",
            Category::Sports => "Sports",
            Category::Entertainment => "Entertainment",
            Category::Science => "Science",
            Category::Crypto => "Cryptocurrency",
            Category::Finance => "Finance",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// One normalized article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    /// Content fingerprint of (title, url, published_at); see [`crate::fingerprint`].
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub source: String, // e.g., "The Guardian", "RSS: bbci"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// ISO-8601 timestamp as emitted by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickers: Option<Vec<String>>,
}

impl NewsItem {
    /// Build an item with its id derived from the identity triple.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
        published_at: Option<String>,
    ) -> Self {
        let title = title.into();
        let url = url.into();
        let id = news_id(&title, &url, published_at.as_deref());
        Self {
            id,
            title,
            description: None,
            url,
            image_url: None,
            source: source.into(),
            category: None,
            published_at,
            author: None,
            tickers: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.is_empty());
        self
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url.filter(|u| !u.is_empty());
        self
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author.filter(|a| !a.is_empty());
        self
    }

    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    pub fn with_tickers(mut self, tickers: Vec<String>) -> Self {
        self.tickers = if tickers.is_empty() {
            None
        } else {
            Some(tickers)
        };
        self
    }

    /// Unix seconds of `published_at`, `None` when absent or unparseable.
    pub fn published_ts(&self) -> Option<i64> {
        self.published_at
            .as_deref()
            .and_then(crate::ingest::parse_timestamp)
    }
}

/// Parameters handed to every provider for one aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchParams {
    pub category: Option<Category>,
    pub q: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

/// Category heuristic: (title, description) -> category.
pub type Classifier = fn(&str, Option<&str>) -> Option<Category>;

/// Ticker heuristic: (title, description) -> uppercase symbols.
pub type TickerExtractor = fn(&str, Option<&str>) -> Vec<String>;

/// One upstream source (REST API or group of RSS feeds).
///
/// Implementors only write `fetch_from_source`; callers use `fetch_items`,
/// which never fails: any upstream error becomes an empty batch plus a log line.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Display name, used as the `sourceStats` key.
    fn name(&self) -> &str;

    fn supports_categories(&self) -> bool {
        true
    }

    async fn fetch_from_source(&self, params: &FetchParams) -> Result<Vec<NewsItem>>;

    async fn fetch_items(&self, params: &FetchParams) -> Vec<NewsItem> {
        match self.fetch_from_source(params).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = ?e, provider = self.name(), "provider fetch failed");
                metrics::counter!("news_provider_failures_total", "provider" => self.name().to_string())
                    .increment(1);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("Tech".parse::<Category>(), Ok(Category::Tech));
        assert_eq!(" crypto ".parse::<Category>(), Ok(Category::Crypto));
        assert!("weather".parse::<Category>().is_err());
    }

    #[test]
    fn item_serializes_camel_case_and_skips_absent_fields() {
        let it = NewsItem::new("T", "https://x.test/a", "Src", None)
            .with_image_url(Some("https://x.test/i.png".into()));
        let v = serde_json::to_value(&it).unwrap();
        assert!(v.get("imageUrl").is_some());
        assert!(v.get("publishedAt").is_none());
        assert!(v.get("tickers").is_none());
    }

    #[test]
    fn empty_tickers_are_dropped() {
        let it = NewsItem::new("T", "u", "S", None).with_tickers(vec![]);
        assert!(it.tickers.is_none());
    }
}
