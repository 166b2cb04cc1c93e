//! # Result Cache
//! Process-local TTL + LRU cache from a query signature to a finished
//! aggregate, backed by `moka`.
//!
//! - An entry lives for its TTL since it was last written or read; every hit
//!   restarts the clock. Expired entries are invisible to readers.
//! - Bounded entry count; at capacity the least recently used entry goes.
//! - Values are shared as `Arc`, so a hit hands back the exact stored result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use moka::Expiry;
use serde::Serialize;

use crate::engine::AggregateResult;
use crate::ingest::types::Category;

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_MAX_ENTRIES: usize = 500;
/// Longest TTL the cache accepts; larger values are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Occupancy snapshot for the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Live (non-expired) entries.
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub ttl_ms: u64,
}

/// Canonical signature for a query shape.
///
/// `news:<category|all>:<q=...|none>:<page>:<pageSize>`. The `q=` prefix keeps
/// a literal search for "none" apart from no search; the numeric tail makes
/// colons inside `q` harmless.
pub fn cache_key(category: Option<Category>, q: Option<&str>, page: u32, page_size: u32) -> String {
    let cat = category.map(Category::as_str).unwrap_or("all");
    let q = match q {
        Some(q) => format!("q={q}"),
        None => "none".to_string(),
    };
    format!("news:{cat}:{q}:{page}:{page_size}")
}

#[derive(Debug, Clone)]
struct Entry {
    value: Arc<AggregateResult>,
    ttl: Duration,
}

/// Per-entry idle expiry: creation, update and every read restart the TTL.
struct IdleTtl;

impl Expiry<String, Entry> for IdleTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_read(
        &self,
        _key: &String,
        entry: &Entry,
        _read_at: Instant,
        _duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Thread-safe TTL/LRU cache of aggregate results.
pub struct ResultCache {
    inner: Cache<String, Entry>,
    ttl: Duration,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttl", &self.ttl)
            .field("capacity", &self.capacity)
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl ResultCache {
    pub fn new(cfg: CacheConfig) -> Self {
        let capacity = cfg.max_entries.max(1);
        let inner = Cache::builder()
            .max_capacity(capacity as u64)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(IdleTtl)
            .eviction_listener(|key: Arc<String>, _entry: Entry, cause| {
                tracing::debug!(victim = %key, ?cause, "cache dropped entry");
            })
            .build();
        Self {
            inner,
            ttl: cfg.ttl.min(MAX_TTL),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Live entry for `key`; a hit refreshes its recency and its TTL.
    pub fn get(&self, key: &str) -> Option<Arc<AggregateResult>> {
        match self.inner.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store with the cache-wide TTL.
    pub fn insert(&self, key: String, value: Arc<AggregateResult>) {
        self.insert_with_ttl(key, value, self.ttl)
    }

    /// Store with an explicit TTL, evicting the least recently used entry when full.
    pub fn insert_with_ttl(&self, key: String, value: Arc<AggregateResult>, ttl: Duration) {
        self.inner.insert(
            key,
            Entry {
                value,
                ttl: ttl.min(MAX_TTL),
            },
        );
        // Apply capacity eagerly so the bound holds after every write
        self.inner.run_pending_tasks();
    }

    pub fn remove(&self, key: &str) -> bool {
        let removed = self.inner.remove(key).is_some();
        self.inner.run_pending_tasks();
        removed
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks();
    }

    /// Snapshot after pending maintenance, so expired entries are not counted.
    pub fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks();
        CacheStats {
            size: self.inner.entry_count() as usize,
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ttl_ms: self.ttl.as_millis() as u64,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
