// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::cmp::Reverse;
use std::time::Duration;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

use crate::config::RssSection;
use crate::ingest::types::{
    Category, Classifier, FetchParams, NewsItem, SourceProvider, TickerExtractor,
};
use crate::ingest::{
    classify_with, extract_image_url, no_tickers, normalize_timestamp, sanitize_opt,
    sanitize_text, Lexicon,
};

pub const NAME: &str = "RSS";

pub const LEXICON: &Lexicon = &[
    (Category::World, &["world", "global", "international", "politics", "government"]),
    (Category::Business, &["business", "economy", "market", "trade", "finance", "corporate"]),
    (Category::Tech, &["technology", "tech", "software", "ai", "artificial intelligence", "startup"]),
    (Category::Sports, &["sport", "football", "basketball", "tennis", "olympics", "championship"]),
    (Category::Entertainment, &["entertainment", "movie", "film", "music", "celebrity", "hollywood"]),
    (Category::Science, &["science", "research", "study", "discovery", "medical", "health"]),
    (Category::Crypto, &["cryptocurrency", "bitcoin", "ethereum", "blockchain", "crypto"]),
    (Category::Finance, &["finance", "investment", "stock", "market", "banking", "trading"]),
];

pub fn classify(title: &str, description: Option<&str>) -> Option<Category> {
    classify_with(LEXICON, title, description)
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "encoded", alias = "content:encoded")]
    content: Option<String>,
    #[serde(rename = "creator", alias = "dc:creator")]
    creator: Option<String>,
    author: Option<String>,
    enclosure: Option<Enclosure>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
}

/// RFC 2822 `pubDate` to RFC 3339 UTC; other shapes go through the shared
/// normalizer.
fn normalize_pub_date(ts: &str) -> Option<String> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .and_then(|dt| dt.to_offset(UtcOffset::UTC).format(&Rfc3339).ok())
        .or_else(|| normalize_timestamp(ts))
}

/// `"RSS: bbc"` for `https://www.bbc.co.uk/...`.
pub fn source_label(link: &str) -> String {
    let host = url::Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));
    let name = host
        .as_deref()
        .map(|h| h.strip_prefix("www.").unwrap_or(h))
        .and_then(|h| h.split('.').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("Unknown");
    format!("{NAME}: {name}")
}

/// One provider over every configured feed. Feeds are fetched concurrently,
/// each under its own timeout; a failing or hanging feed is logged and skipped.
pub struct RssProvider {
    client: reqwest::Client,
    rss: RssSection,
    feed_timeout: Duration,
    classify: Classifier,
    tickers: TickerExtractor,
}

impl RssProvider {
    pub fn new(client: reqwest::Client, rss: RssSection) -> Self {
        Self {
            client,
            feed_timeout: rss.feed_timeout(),
            rss,
            classify,
            tickers: no_tickers,
        }
    }

    pub fn with_feed_timeout(mut self, timeout: Duration) -> Self {
        self.feed_timeout = timeout;
        self
    }

    pub fn with_classifier(mut self, f: Classifier) -> Self {
        self.classify = f;
        self
    }

    pub fn with_ticker_extractor(mut self, f: TickerExtractor) -> Self {
        self.tickers = f;
        self
    }

    /// The requested category when it selects its own feed list.
    fn scoped_category(&self, requested: Option<Category>) -> Option<Category> {
        requested.filter(|c| {
            self.rss
                .sources
                .get(c.as_str())
                .is_some_and(|l| !l.is_empty())
        })
    }

    /// Parse one feed document. `scoped` tags every item with that category;
    /// otherwise the classifier decides.
    pub fn parse_feed(&self, xml: &str, scoped: Option<Category>) -> Result<Vec<NewsItem>> {
        let t0 = std::time::Instant::now();
        let rss: Rss = from_str(xml).context("parsing rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let (Some(raw_title), Some(link)) = (it.title.as_deref(), it.link) else {
                continue;
            };
            let title = sanitize_text(raw_title);
            let link = link.trim().to_string();
            if title.is_empty() || link.is_empty() {
                continue;
            }
            let html = it.content.as_deref().or(it.description.as_deref());
            let description = sanitize_opt(it.description.as_deref().or(it.content.as_deref()));
            let image_url = it
                .enclosure
                .and_then(|e| e.url)
                .filter(|u| !u.trim().is_empty())
                .or_else(|| html.and_then(extract_image_url));
            let category =
                scoped.or_else(|| (self.classify)(&title, html.map(sanitize_text).as_deref()));
            let tickers = (self.tickers)(&title, description.as_deref());

            out.push(
                NewsItem::new(
                    title,
                    link.clone(),
                    source_label(&link),
                    it.pub_date.as_deref().and_then(normalize_pub_date),
                )
                .with_description(description)
                .with_image_url(image_url)
                .with_author(sanitize_opt(it.creator.as_deref().or(it.author.as_deref())))
                .with_category(category)
                .with_tickers(tickers),
            );
        }

        histogram!("news_rss_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }

    async fn fetch_feed(&self, url: &str, scoped: Option<Category>) -> Result<Vec<NewsItem>> {
        tokio::time::timeout(self.feed_timeout, self.fetch_feed_inner(url, scoped))
            .await
            .map_err(|_| anyhow::anyhow!("rss feed timed out after {:?}", self.feed_timeout))?
    }

    async fn fetch_feed_inner(&self, url: &str, scoped: Option<Category>) -> Result<Vec<NewsItem>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("rss http get({url})"))?;
        super::check_status(NAME, resp.status())?;
        let body = resp.text().await.context("rss http .text()")?;
        self.parse_feed(&body, scoped)
    }
}

#[async_trait]
impl SourceProvider for RssProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_from_source(&self, params: &FetchParams) -> Result<Vec<NewsItem>> {
        let scoped = self.scoped_category(params.category);
        let feeds = self.rss.feeds_for(params.category);

        let results = join_all(feeds.iter().map(|url| self.fetch_feed(url, scoped))).await;

        let mut items = Vec::new();
        for (url, res) in feeds.iter().zip(results) {
            match res {
                Ok(batch) => items.extend(batch),
                Err(e) => {
                    tracing::warn!(feed = %url, error = ?e, "rss feed failed");
                    counter!("news_rss_feed_failures_total").increment(1);
                }
            }
        }

        items.sort_by_cached_key(|it| Reverse(it.published_ts()));
        let cap = (params.page as usize).saturating_mul(params.page_size as usize);
        items.truncate(cap);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_label_strips_www_and_takes_first_label() {
        assert_eq!(source_label("https://www.bbc.co.uk/news/1"), "RSS: bbc");
        assert_eq!(source_label("https://feeds.npr.org/x"), "RSS: feeds");
        assert_eq!(source_label("not a url"), "RSS: Unknown");
    }

    #[test]
    fn rfc2822_dates_become_rfc3339_utc() {
        assert_eq!(
            normalize_pub_date("Wed, 01 May 2024 12:00:00 +0200").as_deref(),
            Some("2024-05-01T10:00:00Z")
        );
        assert_eq!(
            normalize_pub_date("2024-05-01T10:00:00Z").as_deref(),
            Some("2024-05-01T10:00:00Z")
        );
        assert_eq!(normalize_pub_date("yesterday"), None);
    }

    #[test]
    fn finance_wording_lands_in_business_first() {
        assert_eq!(classify("Personal finance tips", None), Some(Category::Business));
        assert_eq!(classify("Banking shake-up", None), Some(Category::Finance));
    }

    #[test]
    fn scoped_only_when_category_has_feeds() {
        let p = RssProvider::new(reqwest::Client::new(), RssSection::default());
        assert_eq!(p.scoped_category(Some(Category::Tech)), Some(Category::Tech));
        assert_eq!(p.scoped_category(None), None);
    }
}
