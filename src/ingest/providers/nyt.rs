// src/ingest/providers/nyt.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::ingest::providers::check_status;
use crate::ingest::types::{
    Category, Classifier, FetchParams, NewsItem, SourceProvider, TickerExtractor,
};
use crate::ingest::{classify_with, extract_tickers, normalize_timestamp, sanitize_opt, sanitize_text, Lexicon};

pub const NAME: &str = "The New York Times";
const ENDPOINT: &str = "/search/v2/articlesearch.json";
const IMAGE_BASE: &str = "https://www.nytimes.com/";

pub const LEXICON: &Lexicon = &[
    (Category::World, &["world", "global", "international", "politics", "government", "election", "foreign"]),
    (Category::Business, &["business", "economy", "market", "markets", "trade", "corporate", "company", "banking"]),
    (Category::Tech, &["technology", "tech", "software", "ai", "artificial intelligence", "startup", "app", "digital"]),
    (Category::Sports, &["sport", "sports", "football", "basketball", "tennis", "olympics", "championship", "league", "baseball"]),
    (Category::Entertainment, &["entertainment", "movie", "film", "music", "celebrity", "hollywood", "actor", "arts"]),
    (Category::Science, &["science", "research", "study", "discovery", "medical", "health", "covid", "climate"]),
    (Category::Crypto, &["cryptocurrency", "bitcoin", "ethereum", "blockchain", "crypto", "nft"]),
    (Category::Finance, &["finance", "investment", "stock", "stocks", "market", "banking", "trading", "fed", "economy"]),
];

pub fn classify(title: &str, description: Option<&str>) -> Option<Category> {
    classify_with(LEXICON, title, description)
}

fn upstream_desk(c: Category) -> &'static str {
    match c {
        Category::World => "world",
        Category::Business | Category::Finance => "business",
        Category::Tech | Category::Crypto => "technology",
        Category::Sports => "sports",
        Category::Entertainment => "arts",
        Category::Science => "science",
    }
}

#[derive(Debug, Deserialize)]
struct Resp {
    status: String,
    response: Option<Docs>,
    fault: Option<Fault>,
}

#[derive(Debug, Deserialize)]
struct Fault {
    faultstring: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Docs {
    #[serde(default)]
    docs: Vec<Doc>,
}

#[derive(Debug, Deserialize)]
struct Doc {
    headline: Option<Headline>,
    web_url: Option<String>,
    #[serde(rename = "abstract")]
    summary: Option<String>,
    pub_date: Option<String>,
    byline: Option<Byline>,
    #[serde(default)]
    multimedia: Vec<Media>,
}

#[derive(Debug, Deserialize)]
struct Headline {
    main: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Byline {
    original: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Media {
    subtype: Option<String>,
    url: Option<String>,
}

/// NYT Article Search adapter. Upstream pages are 0-based and fixed-size,
/// so the response is truncated to the requested page size.
pub struct NytProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    classify: Classifier,
    tickers: TickerExtractor,
}

impl NytProvider {
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
        let mut query = vec![
            ("page", params.page.saturating_sub(1).to_string()),
            ("sort", "newest".to_string()),
        ];
        if let Some(c) = params.category {
            query.push(("fq", format!("news_desk:(\"{}\")", upstream_desk(c))));
        }
        if let Some(q) = params.q.as_deref() {
            query.push(("q", q.to_string()));
        }
        query
    }

    pub fn items_from_body(&self, body: &str, page_size: u32) -> Result<Vec<NewsItem>> {
        let resp: Resp = serde_json::from_str(body).context("parsing nyt json")?;
        if resp.status != "OK" {
            let msg = resp
                .fault
                .and_then(|f| f.faultstring)
                .unwrap_or_else(|| resp.status.clone());
            return Err(anyhow!("nyt error: {msg}"));
        }
        let docs = resp.response.map(|r| r.docs).unwrap_or_default();

        let mut out = Vec::with_capacity(docs.len().min(page_size as usize));
        for d in docs {
            if out.len() >= page_size as usize {
                break;
            }
            let (Some(raw_title), Some(url)) = (d.headline.and_then(|h| h.main), d.web_url) else {
                continue;
            };
            let title = sanitize_text(&raw_title);
            if title.is_empty() || url.is_empty() {
                continue;
            }
            let description = sanitize_opt(d.summary.as_deref());
            let category = (self.classify)(&title, description.as_deref());
            let tickers = (self.tickers)(&title, description.as_deref());
            let image_url = d
                .multimedia
                .iter()
                .find(|m| m.subtype.as_deref() == Some("photo") && m.url.is_some())
                .and_then(|m| m.url.as_deref())
                .map(|u| format!("{IMAGE_BASE}{}", u.trim_start_matches('/')));

            out.push(
                NewsItem::new(
                    title,
                    url,
                    NAME,
                    d.pub_date.as_deref().and_then(normalize_timestamp),
                )
                .with_description(description)
                .with_image_url(image_url)
                .with_author(sanitize_opt(
                    d.byline.and_then(|b| b.original).as_deref(),
                ))
                .with_category(category)
                .with_tickers(tickers),
            );
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for NytProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_from_source(&self, params: &FetchParams) -> Result<Vec<NewsItem>> {
        if self.api_key.is_empty() {
            return Err(anyhow!("NYT API key not configured"));
        }
        let mut query = self.request(params);
        query.push(("api-key", self.api_key.clone()));
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, ENDPOINT))
            .query(&query)
            .send()
            .await
            .context("nyt http get()")?;
        check_status(NAME, resp.status())?;
        let body = resp.text().await.context("nyt http .text()")?;
        self.items_from_body(&body, params.page_size)
    }
}
