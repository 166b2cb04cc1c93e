// src/config.rs
//! Service configuration: cache sizing, HTTP settings, provider endpoints and
//! RSS feed lists. Credentials never live in the file; see [`ApiKeys`].

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::MAX_TTL;
use crate::ingest::types::Category;

pub const ENV_CONFIG_PATH: &str = "NEWS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/news.toml";
pub const ENV_CACHE_TTL_MS: &str = "NEWS_CACHE_TTL_MS";
pub const ENV_CACHE_MAX_ENTRIES: &str = "NEWS_CACHE_MAX_ENTRIES";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct NewsConfig {
    pub cache: CacheSection,
    pub http: HttpSection,
    pub paging: PagingSection,
    pub providers: ProvidersSection,
    pub rss: RssSection,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheSection {
    pub ttl_secs: u64,
    /// Millisecond override, takes precedence over `ttl_secs` (used by tests).
    pub ttl_ms: Option<u64>,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpSection {
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PagingSection {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvidersSection {
    pub newsapi: EndpointCfg,
    pub guardian: EndpointCfg,
    pub nyt: EndpointCfg,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EndpointCfg {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RssSection {
    pub enabled: bool,
    /// Budget for one feed; must stay below `http.timeout_secs` so a hanging
    /// feed is dropped before the whole provider is.
    pub feed_timeout_ms: u64,
    /// Feed URLs keyed by category name.
    pub sources: BTreeMap<String, Vec<String>>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            ttl_ms: None,
            max_entries: 500,
        }
    }
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: "news-aggregator/0.1".to_string(),
        }
    }
}

impl Default for PagingSection {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl Default for ProvidersSection {
    fn default() -> Self {
        Self {
            newsapi: EndpointCfg {
                base_url: "https://newsapi.org/v2".to_string(),
            },
            guardian: EndpointCfg {
                base_url: "https://content.guardianapis.com".to_string(),
            },
            nyt: EndpointCfg {
                base_url: "https://api.nytimes.com/svc".to_string(),
            },
        }
    }
}

impl Default for RssSection {
    fn default() -> Self {
        Self {
            enabled: true,
            feed_timeout_ms: 8_000,
            sources: default_rss_sources(),
        }
    }
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            cache: CacheSection::default(),
            http: HttpSection::default(),
            paging: PagingSection::default(),
            providers: ProvidersSection::default(),
            rss: RssSection::default(),
        }
    }
}

fn default_rss_sources() -> BTreeMap<String, Vec<String>> {
    let table: [(Category, &[&str]); 8] = [
        (
            Category::World,
            &[
                "https://feeds.bbci.co.uk/news/world/rss.xml",
                "https://rss.cnn.com/rss/edition_world.rss",
                "https://feeds.reuters.com/Reuters/worldNews",
            ],
        ),
        (
            Category::Business,
            &[
                "https://feeds.bbci.co.uk/news/business/rss.xml",
                "https://rss.cnn.com/rss/money_latest.rss",
                "https://feeds.reuters.com/reuters/businessNews",
            ],
        ),
        (
            Category::Tech,
            &[
                "https://feeds.feedburner.com/TechCrunch/",
                "https://rss.cnn.com/rss/edition_technology.rss",
                "https://feeds.arstechnica.com/arstechnica/index",
            ],
        ),
        (
            Category::Sports,
            &[
                "https://feeds.bbci.co.uk/sport/rss.xml",
                "https://rss.cnn.com/rss/edition_sport.rss",
                "https://feeds.reuters.com/reuters/sportsNews",
            ],
        ),
        (
            Category::Entertainment,
            &[
                "https://feeds.bbci.co.uk/news/entertainment_and_arts/rss.xml",
                "https://rss.cnn.com/rss/edition_entertainment.rss",
            ],
        ),
        (
            Category::Science,
            &[
                "https://feeds.bbci.co.uk/news/science_and_environment/rss.xml",
                "https://rss.cnn.com/rss/edition_space.rss",
            ],
        ),
        (
            Category::Crypto,
            &["https://cointelegraph.com/rss", "https://cryptonews.com/news/feed"],
        ),
        (
            Category::Finance,
            &[
                "https://feeds.reuters.com/reuters/businessNews",
                "https://www.ft.com/rss/home",
            ],
        ),
    ];
    table
        .into_iter()
        .map(|(cat, urls)| {
            (
                cat.as_str().to_string(),
                urls.iter().map(|u| u.to_string()).collect(),
            )
        })
        .collect()
}

impl NewsConfig {
    /// Load from an explicit TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading news config from {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let cfg: NewsConfig = toml::from_str(s).context("parsing news config toml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $NEWS_CONFIG_PATH (must exist)
    /// 2) config/news.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if p.exists() {
                Self::load_from(&p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(ms) = parse_env_u64(ENV_CACHE_TTL_MS) {
            self.cache.ttl_ms = Some(ms);
        }
        if let Some(n) = parse_env_u64(ENV_CACHE_MAX_ENTRIES) {
            self.cache.max_entries = n as usize;
        }
    }

    fn validate(&self) -> Result<()> {
        for name in self.rss.sources.keys() {
            name.parse::<Category>()
                .map_err(|e| anyhow!("rss.sources: {e}"))?;
        }
        if self.cache.max_entries == 0 {
            return Err(anyhow!("cache.max_entries must be > 0"));
        }
        let ttl_too_long = match self.cache.ttl_ms {
            Some(ms) => ms > MAX_TTL.as_millis() as u64,
            None => self.cache.ttl_secs > MAX_TTL.as_secs(),
        };
        if ttl_too_long {
            return Err(anyhow!(
                "cache TTL must not exceed {} seconds",
                MAX_TTL.as_secs()
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(anyhow!("http.timeout_secs must be > 0"));
        }
        if self.rss.feed_timeout_ms == 0 || self.rss.feed_timeout() >= self.http.timeout() {
            return Err(anyhow!(
                "rss.feed_timeout_ms must be > 0 and below http.timeout_secs"
            ));
        }
        if self.paging.max_page_size == 0
            || self.paging.default_page_size == 0
            || self.paging.default_page_size > self.paging.max_page_size
        {
            return Err(anyhow!(
                "paging.default_page_size must be within 1..=paging.max_page_size"
            ));
        }
        Ok(())
    }
}

impl CacheSection {
    pub fn ttl(&self) -> Duration {
        self.ttl_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_secs(self.ttl_secs))
    }
}

impl HttpSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RssSection {
    pub fn feed_timeout(&self) -> Duration {
        Duration::from_millis(self.feed_timeout_ms)
    }

    /// Feeds for a category; every configured feed (deduplicated, in config
    /// order) when no category is given or the category has no feeds.
    pub fn feeds_for(&self, category: Option<Category>) -> Vec<String> {
        if let Some(list) = category.and_then(|c| self.sources.get(c.as_str())) {
            if !list.is_empty() {
                return list.clone();
            }
        }
        let mut all: Vec<String> = Vec::new();
        for url in self.sources.values().flatten() {
            if !all.contains(url) {
                all.push(url.clone());
            }
        }
        all
    }
}

/// Upstream credentials, read from the environment only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiKeys {
    pub newsapi: Option<String>,
    pub guardian: Option<String>,
    pub nyt: Option<String>,
}

impl ApiKeys {
    pub fn from_env() -> Self {
        fn key(name: &str) -> Option<String> {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            newsapi: key("NEWSAPI_KEY"),
            guardian: key("GUARDIAN_KEY"),
            nyt: key("NYT_KEY"),
        }
    }
}

fn parse_env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.trim().parse::<u64>().ok())
}
