// src/ingest/providers/newsapi.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::ingest::providers::check_status;
use crate::ingest::types::{
    Category, Classifier, FetchParams, NewsItem, SourceProvider, TickerExtractor,
};
use crate::ingest::{classify_with, extract_tickers, normalize_timestamp, sanitize_opt, sanitize_text, Lexicon};

pub const NAME: &str = "NewsAPI";
/// Upstream maximum page size.
const UPSTREAM_MAX_PAGE_SIZE: u32 = 100;

pub const LEXICON: &Lexicon = &[
    (Category::World, &["world", "global", "international", "politics", "government", "election"]),
    (Category::Business, &["business", "economy", "market", "markets", "trade", "corporate", "company"]),
    (Category::Tech, &["technology", "tech", "software", "ai", "artificial intelligence", "startup", "app"]),
    (Category::Sports, &["sport", "sports", "football", "basketball", "tennis", "olympics", "championship", "league"]),
    (Category::Entertainment, &["entertainment", "movie", "film", "music", "celebrity", "hollywood", "actor"]),
    (Category::Science, &["science", "research", "study", "discovery", "medical", "health", "covid"]),
    (Category::Crypto, &["cryptocurrency", "bitcoin", "ethereum", "blockchain", "crypto", "nft"]),
    (Category::Finance, &["finance", "investment", "stock", "stocks", "market", "banking", "trading", "fed"]),
];

pub fn classify(title: &str, description: Option<&str>) -> Option<Category> {
    classify_with(LEXICON, title, description)
}

/// `top-headlines` category for one of ours.
fn upstream_category(c: Category) -> &'static str {
    match c {
        Category::World => "world",
        Category::Business | Category::Finance => "business",
        Category::Tech => "technology",
        Category::Crypto => "cryptocurrency",
        Category::Sports => "sports",
        Category::Entertainment => "entertainment",
        Category::Science => "science",
    }
}

#[derive(Debug, Deserialize)]
struct Resp {
    status: String,
    #[serde(default)]
    articles: Vec<Article>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    source: Option<ArticleSource>,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

/// NewsAPI.org adapter (`/top-headlines` for categories, `/everything` otherwise).
pub struct NewsApiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    classify: Classifier,
    tickers: TickerExtractor,
}

impl NewsApiProvider {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            classify,
            tickers: extract_tickers,
        }
    }

    pub fn with_classifier(mut self, f: Classifier) -> Self {
        self.classify = f;
        self
    }

    pub fn with_ticker_extractor(mut self, f: TickerExtractor) -> Self {
        self.tickers = f;
        self
    }

    /// Endpoint path and query pairs for one fetch.
    pub fn request(&self, params: &FetchParams) -> (&'static str, Vec<(&'static str, String)>) {
        let mut query = vec![
            ("pageSize", params.page_size.min(UPSTREAM_MAX_PAGE_SIZE).to_string()),
            ("page", params.page.to_string()),
            ("language", "en".to_string()),
            ("sortBy", "publishedAt".to_string()),
        ];
        match params.category {
            // Headlines are browsed by category alone; `q` is not forwarded
            Some(c) => {
                query.push(("category", upstream_category(c).to_string()));
                query.push(("country", "us".to_string()));
                ("/top-headlines", query)
            }
            None => {
                query.push(("q", params.q.as_deref().unwrap_or("news").to_string()));
                ("/everything", query)
            }
        }
    }

    /// Parse a response body. `requested` tags items when the upstream was
    /// asked for one category; otherwise the classifier decides.
    pub fn items_from_body(&self, body: &str, requested: Option<Category>) -> Result<Vec<NewsItem>> {
        let resp: Resp = serde_json::from_str(body).context("parsing newsapi json")?;
        if resp.status != "ok" {
            return Err(anyhow!(
                "newsapi error: {}",
                resp.message.unwrap_or_else(|| resp.status.clone())
            ));
        }

        let mut out = Vec::with_capacity(resp.articles.len());
        for a in resp.articles {
            let (Some(raw_title), Some(url)) = (a.title.as_deref(), a.url) else {
                continue;
            };
            let title = sanitize_text(raw_title);
            if title.is_empty() || title == "[Removed]" || url.is_empty() {
                continue;
            }
            let description = sanitize_opt(a.description.as_deref());
            let category = requested.or_else(|| (self.classify)(&title, description.as_deref()));
            let tickers = (self.tickers)(&title, description.as_deref());
            let source = a
                .source
                .and_then(|s| s.name)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| NAME.to_string());

            out.push(
                NewsItem::new(
                    title,
                    url,
                    source,
                    a.published_at.as_deref().and_then(normalize_timestamp),
                )
                .with_description(description)
                .with_image_url(a.url_to_image)
                .with_author(sanitize_opt(a.author.as_deref()))
                .with_category(category)
                .with_tickers(tickers),
            );
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for NewsApiProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_from_source(&self, params: &FetchParams) -> Result<Vec<NewsItem>> {
        if self.api_key.is_empty() {
            return Err(anyhow!("NewsAPI key not configured"));
        }
        let (endpoint, query) = self.request(params);
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, endpoint))
            .header("X-Api-Key", &self.api_key)
            .query(&query)
            .send()
            .await
            .context("newsapi http get()")?;
        check_status(NAME, resp.status())?;
        let body = resp.text().await.context("newsapi http .text()")?;
        self.items_from_body(&body, params.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> NewsApiProvider {
        NewsApiProvider::new(reqwest::Client::new(), "https://newsapi.test/v2/", "k")
    }

    fn params(category: Option<Category>, q: Option<&str>, page_size: u32) -> FetchParams {
        FetchParams {
            category,
            q: q.map(String::from),
            page: 2,
            page_size,
        }
    }

    #[test]
    fn category_uses_top_headlines() {
        let (ep, q) = provider().request(&params(Some(Category::Crypto), None, 20));
        assert_eq!(ep, "/top-headlines");
        assert!(q.contains(&("category", "cryptocurrency".to_string())));
        assert!(q.contains(&("country", "us".to_string())));

        let (_, q) = provider().request(&params(Some(Category::World), None, 20));
        assert!(q.contains(&("category", "world".to_string())));
    }

    #[test]
    fn headlines_drop_the_search_term() {
        let (ep, q) = provider().request(&params(Some(Category::Tech), Some("rust"), 20));
        assert_eq!(ep, "/top-headlines");
        assert!(q.contains(&("category", "technology".to_string())));
        assert!(q.iter().all(|(k, _)| *k != "q"));
    }

    #[test]
    fn no_category_searches_everything_with_default_query() {
        let (ep, q) = provider().request(&params(None, None, 20));
        assert_eq!(ep, "/everything");
        assert!(q.contains(&("q", "news".to_string())));
        assert!(q.contains(&("page", "2".to_string())));
    }

    #[test]
    fn page_size_never_exceeds_request() {
        let (_, q) = provider().request(&params(None, Some("fed"), 7));
        assert!(q.contains(&("pageSize", "7".to_string())));
    }

    #[test]
    fn error_status_is_an_error() {
        let body = r#"{"status":"error","code":"apiKeyInvalid","message":"bad key"}"#;
        let err = provider().items_from_body(body, None).unwrap_err();
        assert!(err.to_string().contains("bad key"));
    }

    #[test]
    fn requested_category_beats_classifier() {
        let body = r#"{"status":"ok","articles":[
            {"source":{"name":"Wire"},"title":"Bitcoin hits record","url":"https://w.test/1"}
        ]}"#;
        let items = provider()
            .items_from_body(body, Some(Category::Finance))
            .unwrap();
        assert_eq!(items[0].category, Some(Category::Finance));
        let items = provider().items_from_body(body, None).unwrap();
        assert_eq!(items[0].category, Some(Category::Crypto));
    }
}
