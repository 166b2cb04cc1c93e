// tests/common/mod.rs
//
// Shared helpers: scripted in-process providers and a loopback HTTP server
// standing in for upstream APIs and feeds.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::Router;

use news_aggregator::ingest::types::{FetchParams, NewsItem, SourceProvider};

#[derive(Clone)]
pub enum Behavior {
    Items(Vec<NewsItem>),
    Fail,
    Panic,
    Sleep(Duration, Vec<NewsItem>),
}

/// Scripted provider counting how often it is invoked.
pub struct FakeProvider {
    pub name: String,
    pub behavior: Behavior,
    pub calls: Arc<AtomicUsize>,
}

impl FakeProvider {
    pub fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SourceProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_from_source(&self, _params: &FetchParams) -> Result<Vec<NewsItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Items(items) => Ok(items.clone()),
            Behavior::Fail => Err(anyhow!("upstream exploded")),
            Behavior::Panic => panic!("provider bug"),
            Behavior::Sleep(d, items) => {
                tokio::time::sleep(*d).await;
                Ok(items.clone())
            }
        }
    }
}

pub fn item(title: &str, published_at: Option<&str>) -> NewsItem {
    NewsItem::new(
        title,
        format!("https://news.test/{}", title.replace(' ', "-")),
        "Fake",
        published_at.map(String::from),
    )
}

pub fn arc<P: SourceProvider + 'static>(p: P) -> Arc<dyn SourceProvider> {
    Arc::new(p)
}

/// Serve `router` on an ephemeral loopback port; returns the base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}
