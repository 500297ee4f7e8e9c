//! Caching subsystem.
//!
//! Two independent caches with the same TTL contract:
//!
//! - [`MemoryCache`]: bounded in-process store for session memoization.
//!   Evicts the oldest quarter of its entries (by insertion order) when a
//!   new key arrives at capacity.
//!
//! - [`LocalCache`]: durable store under a cache directory, one JSON
//!   record per key. Survives restarts; corrupt records self-heal by
//!   deletion and write failures never reach the caller.
//!
//! The [`ApiClient`](crate::ApiClient) owns a `LocalCache` of its own for
//! `with_cache`; the [`GovernedAdvisor`](crate::GovernedAdvisor) memoizes
//! through a `MemoryCache`.

pub mod local;
pub mod memory;

pub use local::LocalCache;
pub use memory::{CacheConfig, CacheEntry, MemoryCache};

/// Build a cache key of the form `operation:part:part`.
///
/// Parts are joined verbatim, so callers should pass identifiers that do
/// not themselves contain `:` when collisions matter.
pub fn cache_key(operation: &str, parts: &[&str]) -> String {
    let mut key = String::from(operation);
    for part in parts {
        key.push(':');
        key.push_str(part);
    }
    key
}
