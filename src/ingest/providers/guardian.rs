// src/ingest/providers/guardian.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::ingest::providers::check_status;
use crate::ingest::types::{
    Category, Classifier, FetchParams, NewsItem, SourceProvider, TickerExtractor,
};
use crate::ingest::{classify_with, extract_tickers, normalize_timestamp, sanitize_opt, sanitize_text, Lexicon};

pub const NAME: &str = "The Guardian";
const UPSTREAM_MAX_PAGE_SIZE: u32 = 50;

pub const LEXICON: &Lexicon = &[
    (Category::World, &["world", "global", "international", "politics", "government", "election", "brexit"]),
    (Category::Business, &["business", "economy", "market", "markets", "trade", "corporate", "company", "banking"]),
    (Category::Tech, &["technology", "tech", "software", "ai", "artificial intelligence", "startup", "app", "digital"]),
    (Category::Sports, &["sport", "sports", "football", "basketball", "tennis", "olympics", "championship", "league", "premier league"]),
    (Category::Entertainment, &["entertainment", "movie", "film", "music", "celebrity", "hollywood", "actor", "arts"]),
    (Category::Science, &["science", "research", "study", "discovery", "medical", "health", "covid", "climate"]),
    (Category::Crypto, &["cryptocurrency", "bitcoin", "ethereum", "blockchain", "crypto", "nft"]),
    (Category::Finance, &["finance", "investment", "stock", "stocks", "market", "banking", "trading", "fed", "economy"]),
];

pub fn classify(title: &str, description: Option<&str>) -> Option<Category> {
    classify_with(LEXICON, title, description)
}

fn upstream_section(c: Category) -> &'static str {
    match c {
        Category::World => "world",
        Category::Business | Category::Finance => "business",
        Category::Tech | Category::Crypto => "technology",
        Category::Sports => "sport",
        Category::Entertainment => "culture",
        Category::Science => "science",
    }
}

/// Guardian section ids that map cleanly onto one of our categories.
fn category_from_section(section: &str) -> Option<Category> {
    match section {
        "world" | "politics" | "us-news" | "uk-news" | "australia-news" => Some(Category::World),
        "business" => Some(Category::Business),
        "technology" => Some(Category::Tech),
        "sport" | "football" => Some(Category::Sports),
        "culture" | "film" | "music" | "tv-and-radio" | "stage" | "books" => {
            Some(Category::Entertainment)
        }
        "science" | "environment" => Some(Category::Science),
        "money" => Some(Category::Finance),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    response: Resp,
}

#[derive(Debug, Deserialize)]
struct Resp {
    status: String,
    #[serde(default)]
    results: Vec<Article>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    section_id: Option<String>,
    web_title: Option<String>,
    web_url: Option<String>,
    web_publication_date: Option<String>,
    #[serde(default)]
    fields: Fields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Fields {
    trail_text: Option<String>,
    byline: Option<String>,
    thumbnail: Option<String>,
}

/// Guardian Open Platform adapter (`/search`).
pub struct GuardianProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    classify: Classifier,
    tickers: TickerExtractor,
}

impl GuardianProvider {
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

    pub fn request(&self, params: &FetchParams) -> Vec<(&'static str, String)> {
        let section = params.category.map(upstream_section).unwrap_or("news");
        let mut query = vec![
            ("page-size", params.page_size.min(UPSTREAM_MAX_PAGE_SIZE).to_string()),
            ("page", params.page.to_string()),
            ("show-fields", "headline,trailText,byline,thumbnail,lastModified".to_string()),
            ("order-by", "newest".to_string()),
            ("section", section.to_string()),
        ];
        if let Some(q) = params.q.as_deref() {
            query.push(("q", q.to_string()));
        }
        query
    }

    /// Parse a `/search` body. Section ids take precedence over keywords.
    pub fn items_from_body(&self, body: &str) -> Result<Vec<NewsItem>> {
        let env: Envelope = serde_json::from_str(body).context("parsing guardian json")?;
        let resp = env.response;
        if resp.status != "ok" {
            return Err(anyhow!(
                "guardian error: {}",
                resp.message.unwrap_or_else(|| resp.status.clone())
            ));
        }

        let mut out = Vec::with_capacity(resp.results.len());
        for a in resp.results {
            let (Some(raw_title), Some(url)) = (a.web_title.as_deref(), a.web_url) else {
                continue;
            };
            let title = sanitize_text(raw_title);
            if title.is_empty() || url.is_empty() {
                continue;
            }
            let description = sanitize_opt(a.fields.trail_text.as_deref());
            let category = a
                .section_id
                .as_deref()
                .and_then(category_from_section)
                .or_else(|| (self.classify)(&title, description.as_deref()));
            let tickers = (self.tickers)(&title, description.as_deref());

            out.push(
                NewsItem::new(
                    title,
                    url,
                    NAME,
                    a.web_publication_date.as_deref().and_then(normalize_timestamp),
                )
                .with_description(description)
                .with_image_url(a.fields.thumbnail)
                .with_author(sanitize_opt(a.fields.byline.as_deref()))
                .with_category(category)
                .with_tickers(tickers),
            );
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for GuardianProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_from_source(&self, params: &FetchParams) -> Result<Vec<NewsItem>> {
        if self.api_key.is_empty() {
            return Err(anyhow!("Guardian API key not configured"));
        }
        let mut query = self.request(params);
        query.push(("api-key", self.api_key.clone()));
        let resp = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&query)
            .send()
            .await
            .context("guardian http get()")?;
        check_status(NAME, resp.status())?;
        let body = resp.text().await.context("guardian http .text()")?;
        self.items_from_body(&body)
    }
}
