//! Bounded in-memory TTL cache.
//!
//! Eviction approximates LRU with insertion order: when a new key arrives
//! and the cache is full, the oldest `ceil(capacity / 4)` entries are
//! dropped in one batch. Reads do not refresh an entry's position, and
//! overwriting a key keeps its original position.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::Result;
use crate::telemetry;

/// Configuration for a [`MemoryCache`].
///
/// ```rust
/// # use smartspend::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(50)
///     .ttl(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 100.
    pub max_entries: usize,
    /// Time-to-live used by [`MemoryCache::insert`]. Default: 5 minutes.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            ttl: Duration::from_secs(300),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// A cached value with its storage time and lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    /// An entry is fresh strictly before `stored_at + ttl`.
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

struct Slot<V> {
    entry: CacheEntry<V>,
    seq: u64,
}

struct Inner<V> {
    entries: HashMap<String, Slot<V>>,
    /// Insertion sequence → key, oldest first.
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl<V> Inner<V> {
    fn remove(&mut self, key: &str) -> Option<Slot<V>> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.seq);
        Some(slot)
    }

    fn evict_oldest(&mut self, count: usize) {
        for _ in 0..count {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&key);
        }
    }
}

/// Thread-safe bounded TTL cache keyed on strings.
pub struct MemoryCache<V> {
    inner: Mutex<Inner<V>>,
    capacity: usize,
    default_ttl: Duration,
}

impl<V: Clone> MemoryCache<V> {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
            }),
            capacity: config.max_entries.max(1),
            default_ttl: config.ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `data` under `key` for `ttl`.
    pub fn set(&self, key: impl Into<String>, data: V, ttl: Duration) {
        let key = key.into();
        let entry = CacheEntry {
            data,
            stored_at: Instant::now(),
            ttl,
        };
        let mut inner = self.lock();

        if let Some(slot) = inner.entries.get_mut(&key) {
            slot.entry = entry;
            return;
        }

        if inner.entries.len() >= self.capacity {
            let batch = self.capacity.div_ceil(4);
            inner.evict_oldest(batch);
            debug!(
                evicted = batch,
                capacity = self.capacity,
                "memory cache full, evicted oldest entries"
            );
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, key.clone());
        inner.entries.insert(key, Slot { entry, seq });
    }

    /// Store `data` with the configured default TTL.
    pub fn insert(&self, key: impl Into<String>, data: V) {
        self.set(key, data, self.default_ttl);
    }

    /// Fresh value for `key`, removing it if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.lock();
        let fresh = inner.entries.get(key).map(|slot| slot.entry.is_fresh(now));
        let value = match fresh {
            Some(true) => inner.entries.get(key).map(|slot| slot.entry.data.clone()),
            Some(false) => {
                inner.remove(key);
                None
            }
            None => None,
        };
        drop(inner);

        if value.is_some() {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => "memory").increment(1);
        } else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => "memory").increment(1);
        }
        value
    }

    /// Whether `key` holds a fresh value. Expired entries are removed.
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.lock();
        match inner.entries.get(key).map(|slot| slot.entry.is_fresh(now)) {
            Some(true) => true,
            Some(false) => {
                inner.remove(key);
                false
            }
            None => false,
        }
    }

    /// Remove `key`. Returns whether an entry was present.
    pub fn delete(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Number of stored entries, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Return the cached value for `key`, or run `f` and cache its result.
    ///
    /// Errors from `f` are returned as-is and nothing is cached.
    pub async fn with_cache<F, Fut>(&self, key: &str, ttl: Duration, f: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let value = f().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }
}

impl<V: Clone> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
