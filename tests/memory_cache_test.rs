//! In-memory TTL cache: expiry, batch eviction, memoization.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use smartspend::{CacheConfig, MemoryCache, SmartSpendError};

#[tokio::test(start_paused = true)]
async fn entries_expire_after_ttl() {
    let cache = MemoryCache::new(&CacheConfig::default());
    cache.set("k", "v".to_string(), Duration::from_millis(100));

    tokio::time::advance(Duration::from_millis(99)).await;
    assert_eq!(cache.get("k").as_deref(), Some("v"));
    assert!(cache.has("k"));

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(cache.get("k"), None);
    assert!(cache.is_empty(), "expired entry is reclaimed on read");
}

#[tokio::test(start_paused = true)]
async fn insert_uses_default_ttl() {
    let cache = MemoryCache::new(&CacheConfig::new().ttl(Duration::from_secs(5)));
    cache.insert("k", 1);
    tokio::time::advance(Duration::from_secs(4)).await;
    assert!(cache.has("k"));
    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(!cache.has("k"));
}

#[tokio::test(start_paused = true)]
async fn full_cache_evicts_oldest_quarter() {
    let cache = MemoryCache::new(&CacheConfig::new().max_entries(50));
    for i in 0..51 {
        cache.insert(format!("key-{i}"), i);
    }

    assert!(cache.len() <= 50);
    for i in 0..13 {
        assert!(!cache.has(&format!("key-{i}")), "key-{i} should be evicted");
    }
    for i in 13..51 {
        assert_eq!(cache.get(&format!("key-{i}")), Some(i));
    }
}

#[tokio::test(start_paused = true)]
async fn reads_do_not_protect_from_eviction() {
    let cache = MemoryCache::new(&CacheConfig::new().max_entries(4));
    for k in ["a", "b", "c", "d"] {
        cache.insert(k, k.to_string());
    }
    assert!(cache.get("a").is_some());
    cache.insert("e", "e".to_string());

    assert!(!cache.has("a"));
    assert!(cache.has("b"));
    assert!(cache.has("e"));
}

#[tokio::test(start_paused = true)]
async fn overwrite_replaces_value_and_ttl() {
    let cache = MemoryCache::new(&CacheConfig::default());
    cache.set("k", 1, Duration::from_millis(10));
    cache.set("k", 2, Duration::from_secs(10));
    tokio::time::advance(Duration::from_millis(50)).await;
    assert_eq!(cache.get("k"), Some(2));
    assert_eq!(cache.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn delete_and_clear() {
    let cache = MemoryCache::new(&CacheConfig::default());
    cache.insert("a", 1);
    cache.insert("b", 2);

    assert!(cache.delete("a"));
    assert!(!cache.delete("a"));
    assert_eq!(cache.len(), 1);

    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.get("b"), None);
}

#[tokio::test(start_paused = true)]
async fn with_cache_runs_producer_once() {
    let cache = MemoryCache::new(&CacheConfig::default());
    let calls = AtomicU32::new(0);

    for _ in 0..3 {
        let value = cache
            .with_cache("report", Duration::from_secs(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn with_cache_refreshes_after_expiry() {
    let cache = MemoryCache::new(&CacheConfig::default());
    let calls = AtomicU32::new(0);
    let produce = || async { Ok(calls.fetch_add(1, Ordering::SeqCst)) };
    let ttl = Duration::from_secs(1);

    assert_eq!(cache.with_cache("k", ttl, produce).await.unwrap(), 0);
    assert_eq!(cache.with_cache("k", ttl, produce).await.unwrap(), 0);
    tokio::time::advance(ttl).await;
    assert_eq!(cache.with_cache("k", ttl, produce).await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn with_cache_does_not_store_errors() {
    let cache: MemoryCache<u32> = MemoryCache::new(&CacheConfig::default());

    let err = cache
        .with_cache("k", Duration::from_secs(60), || async {
            Err(SmartSpendError::Failed("upstream".into()))
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "upstream");
    assert!(!cache.has("k"));

    let value = cache
        .with_cache("k", Duration::from_secs(60), || async { Ok(5) })
        .await
        .unwrap();
    assert_eq!(value, 5);
}
