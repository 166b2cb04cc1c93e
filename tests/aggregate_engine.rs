// tests/aggregate_engine.rs
//
// End-to-end behavior of the aggregation engine against scripted providers.
//
// Covered:
// - merge/dedup/sort scenario across two providers
// - partial failure (error, panic, timeout) still yields surviving items
// - every provider failing yields a well-formed empty result
// - cache hit equivalence (no provider re-invocation, identical bytes)
// - TTL expiry forces a refetch
// - pagination exactness over a grid of page/pageSize
// - convenience entry points validate their arguments
// - concurrent callers sharing one engine and its cache

mod common;

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{arc, item, Behavior, FakeProvider};
use news_aggregator::cache::CacheConfig;
use news_aggregator::engine::{merge_page, Aggregator, CacheStatus};
use news_aggregator::error::AggregateError;
use news_aggregator::query::AggregateQuery;
use news_aggregator::Category;

const T1: &str = "2024-05-01T00:00:00Z";
const T2: &str = "2024-05-02T00:00:00Z";
const T3: &str = "2024-05-03T00:00:00Z";

fn query(page: u32, page_size: u32) -> AggregateQuery {
    AggregateQuery::new(None, None, page, page_size).expect("valid query")
}

#[tokio::test]
async fn two_providers_merge_into_sorted_unique_page() {
    let a = item("A", Some(T3));
    let b = item("B", Some(T1));
    let c = item("C", Some(T2));
    let a_dup = item("A", Some(T3));

    let engine = Aggregator::new(
        vec![
            arc(FakeProvider::new("One", Behavior::Items(vec![a.clone(), b.clone()]))),
            arc(FakeProvider::new("Two", Behavior::Items(vec![a_dup, c.clone()]))),
        ],
        CacheConfig::default(),
    );

    let res = engine.fetch_aggregate(&query(1, 10)).await.expect("aggregate");
    let titles: Vec<&str> = res.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["A", "C", "B"]);
    assert_eq!(res.total_items, 3);
    assert_eq!(res.next_page, None);
    assert_eq!(res.page, 1);
    assert_eq!(res.source_stats.get("One"), Some(&2));
    assert_eq!(res.source_stats.get("Two"), Some(&2));
    assert_eq!(res.items[0].id, a.id);
}

#[tokio::test]
async fn failing_panicking_and_slow_providers_contribute_zero() {
    let good = vec![item("kept one", Some(T2)), item("kept two", Some(T1))];
    let engine = Aggregator::new(
        vec![
            arc(FakeProvider::new("Good", Behavior::Items(good))),
            arc(FakeProvider::new("Broken", Behavior::Fail)),
            arc(FakeProvider::new("Buggy", Behavior::Panic)),
            arc(FakeProvider::new(
                "Slow",
                Behavior::Sleep(Duration::from_secs(30), vec![item("late", Some(T3))]),
            )),
        ],
        CacheConfig::default(),
    )
    .with_provider_timeout(Duration::from_millis(200));

    let t0 = Instant::now();
    let res = engine.fetch_aggregate(&query(1, 20)).await.expect("no error");
    assert!(t0.elapsed() < Duration::from_secs(5), "bounded by provider timeout");

    assert_eq!(res.total_items, 2);
    assert!(res.items.iter().all(|i| i.title.starts_with("kept")));
    assert_eq!(res.source_stats.get("Good"), Some(&2));
    for name in ["Broken", "Buggy", "Slow"] {
        assert_eq!(res.source_stats.get(name), Some(&0), "{name} should report 0");
    }
}

#[tokio::test]
async fn all_providers_failing_is_an_empty_result_not_an_error() {
    let engine = Aggregator::new(
        vec![
            arc(FakeProvider::new("X", Behavior::Fail)),
            arc(FakeProvider::new("Y", Behavior::Fail)),
        ],
        CacheConfig::default(),
    );
    let res = engine.fetch_aggregate(&query(1, 20)).await.expect("no error");
    assert!(res.items.is_empty());
    assert_eq!(res.total_items, 0);
    assert_eq!(res.next_page, None);
    assert_eq!(res.source_stats.len(), 2);
}

#[tokio::test]
async fn identical_query_within_ttl_is_served_from_cache() {
    let p = FakeProvider::new("Only", Behavior::Items(vec![item("A", Some(T1))]));
    let calls = p.calls();
    let engine = Aggregator::new(vec![arc(p)], CacheConfig::default());

    let q = query(1, 10);
    let (first, s1) = engine.fetch_aggregate_traced(&q).await.unwrap();
    let (second, s2) = engine.fetch_aggregate_traced(&q).await.unwrap();

    assert_eq!(s1, CacheStatus::Miss);
    assert_eq!(s2, CacheStatus::Hit);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "second call must not fan out");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        serde_json::to_vec(&*first).unwrap(),
        serde_json::to_vec(&*second).unwrap()
    );

    // Different page is a different signature
    engine.fetch_aggregate(&query(2, 10)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let stats = engine.provider_stats();
    assert_eq!(stats.cache.hits, 1);
    assert_eq!(stats.cache.size, 2);
}

#[tokio::test]
async fn expired_entry_triggers_refetch() {
    let p = FakeProvider::new("Only", Behavior::Items(vec![item("A", Some(T1))]));
    let calls = p.calls();
    let engine = Aggregator::new(
        vec![arc(p)],
        CacheConfig {
            ttl: Duration::from_millis(50),
            max_entries: 10,
        },
    );

    let q = query(1, 10);
    engine.fetch_aggregate(&q).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    let (_, status) = engine.fetch_aggregate_traced(&q).await.unwrap();

    assert_eq!(status, CacheStatus::Miss);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn pagination_is_exact_for_every_page_and_size() {
    // 23 distinct items, one minute apart
    let items: Vec<_> = (0..23)
        .map(|i| {
            let ts = format!("2024-05-01T10:{i:02}:00Z");
            item(&format!("n{i}"), Some(&ts))
        })
        .collect();
    let engine = Aggregator::new(
        vec![arc(FakeProvider::new("Many", Behavior::Items(items)))],
        CacheConfig::default(),
    );

    for s in [1u32, 5, 7, 10, 23, 30] {
        for p in 1u32..=6 {
            let res = engine.fetch_aggregate(&query(p, s)).await.unwrap();
            let offset = ((p - 1) * s) as usize;
            let expected = (s as usize).min(23usize.saturating_sub(offset));
            assert_eq!(res.items.len(), expected, "p={p} s={s}");
            assert_eq!(res.total_items, 23);
            assert_eq!(
                res.next_page.is_some(),
                offset + res.items.len() < 23,
                "p={p} s={s}"
            );
            if let Some(n) = res.next_page {
                assert_eq!(n, p + 1);
            }
        }
    }
}

#[test]
fn dedup_is_order_independent_and_idempotent() {
    let batch = vec![
        item("x", Some(T1)),
        item("y", Some(T2)),
        item("x", Some(T1)),
        item("z", None),
        item("y", Some(T2)),
    ];
    let ids = |items: &[news_aggregator::NewsItem]| -> BTreeSet<String> {
        items.iter().map(|i| i.id.clone()).collect()
    };

    let (forward, total_f, _) = merge_page(vec![batch.clone()], 1, 100);
    let mut reversed = batch.clone();
    reversed.reverse();
    let (backward, total_b, _) = merge_page(vec![reversed], 1, 100);
    let (again, total_a, _) = merge_page(vec![forward.clone()], 1, 100);

    assert_eq!(total_f, 3);
    assert_eq!(total_b, 3);
    assert_eq!(total_a, 3);
    assert_eq!(ids(&forward), ids(&backward));
    assert_eq!(ids(&forward), ids(&again));
}

#[test]
fn sort_is_newest_first_with_undated_last() {
    let (items, _, _) = merge_page(
        vec![
            vec![item("old", Some(T1)), item("undated", None)],
            vec![item("new", Some(T3)), item("garbled", Some("not a date"))],
            vec![item("mid", Some("Thu, 02 May 2024 00:00:00 GMT"))],
        ],
        1,
        10,
    );
    let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["new", "mid", "old", "undated", "garbled"]);

    for pair in items.windows(2) {
        if let (Some(a), Some(b)) = (pair[0].published_ts(), pair[1].published_ts()) {
            assert!(a >= b);
        }
    }
}

#[tokio::test]
async fn convenience_entry_points_validate_and_filter() {
    let p = FakeProvider::new("Only", Behavior::Items(vec![item("A", Some(T1))]));
    let engine = Aggregator::new(vec![arc(p)], CacheConfig::default());

    let latest = engine.latest_news(1, 20).await.unwrap();
    assert_eq!(latest.total_items, 1);

    let tech = engine.news_by_category(Category::Tech, 1, 5).await.unwrap();
    assert_eq!(tech.page, 1);

    let found = engine.search_news("rust", None, 1, 5).await.unwrap();
    assert_eq!(found.total_items, 1);

    let err = engine.search_news("rust", None, 0, 5).await.unwrap_err();
    assert!(matches!(err, AggregateError::Query(_)));
    let err = engine.latest_news(1, 101).await.unwrap_err();
    assert!(matches!(err, AggregateError::Query(_)));

    let stats = engine.provider_stats();
    assert_eq!(stats.total_providers, 1);
    assert_eq!(stats.provider_names, vec!["Only".to_string()]);
    assert_eq!(stats.cache.size, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_queries_share_one_engine_safely() {
    let batch: Vec<_> = (0..30)
        .map(|i| item(&format!("story {i}"), Some(&format!("2024-05-01T00:00:{i:02}Z"))))
        .collect();
    let engine = Arc::new(Aggregator::new(
        vec![
            arc(FakeProvider::new(
                "Slow",
                Behavior::Sleep(Duration::from_millis(20), batch.clone()),
            )),
            arc(FakeProvider::new("Fast", Behavior::Items(batch))),
        ],
        CacheConfig::default(),
    ));

    // 4 distinct shapes, 8 callers each
    let shapes = [(1, 10), (2, 10), (3, 10), (1, 25)];
    let handles: Vec<_> = (0..32)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let (page, page_size) = shapes[i % shapes.len()];
            tokio::spawn(async move {
                let q = query(page, page_size);
                let res = engine.fetch_aggregate(&q).await.expect("aggregate");
                (q.signature(), res)
            })
        })
        .collect();

    let mut by_signature = std::collections::HashMap::new();
    for h in handles {
        let (sig, res) = h.await.expect("task");
        assert_eq!(res.total_items, 30);
        assert!(res.items.len() <= 25);
        let ts: Vec<_> = res.items.iter().map(|i| i.published_ts()).collect();
        assert!(ts.windows(2).all(|w| w[0] >= w[1]), "sorted newest-first");

        let bytes = serde_json::to_vec(&*res).unwrap();
        let first = by_signature.entry(sig).or_insert_with(|| bytes.clone());
        assert_eq!(*first, bytes, "identical queries agree");
    }

    assert_eq!(by_signature.len(), shapes.len());
    assert_eq!(engine.provider_stats().cache.size, shapes.len());
}
