//! Content fingerprints for news items.
//!
//! The id of an item is the SHA-256 of `title|url|published_at` (empty string
//! when the timestamp is absent), hex encoded. It is a dedup/display key only.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt::Write as _;

use crate::ingest::types::NewsItem;

/// Stable id for the identity triple.
pub fn news_id(title: &str, url: &str, published_at: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(url.as_bytes());
    hasher.update(b"|");
    hasher.update(published_at.unwrap_or_default().as_bytes());
    let digest = hasher.finalize();

    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Drop items whose fingerprint was already seen; first occurrence wins.
///
/// The id is recomputed from the triple rather than trusted, so items built
/// by hand (or mutated after construction) still collapse correctly.
/// Returns the kept items and the number of duplicates removed.
pub fn dedup(items: Vec<NewsItem>) -> (Vec<NewsItem>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    let mut keep = Vec::with_capacity(items.len());
    let mut dropped = 0usize;

    for mut it in items {
        let id = news_id(&it.title, &it.url, it.published_at.as_deref());
        if !seen.insert(id.clone()) {
            dropped += 1;
            continue;
        }
        it.id = id;
        keep.push(it);
    }

    (keep, dropped)
}
