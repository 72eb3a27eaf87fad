//! TTL'd response cache.
//!
//! Stores opaque JSON payloads keyed by `provider:endpoint`. An entry is
//! valid only while its TTL has not elapsed; stale entries are treated as
//! absent and lazily evicted on the next lookup. A periodic sweep removes
//! whatever lazy eviction never touched.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::debug;
use serde_json::Value;

/// Default TTL for cached responses: 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Clone, Debug)]
struct CacheEntry {
    data: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() <= self.ttl
    }
}

/// Concurrent response cache with per-entry TTLs.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResponseCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Store a payload under `key` with the given TTL.
    pub fn insert(&self, key: impl Into<String>, data: Value, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                data,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Fetch a payload if present and unexpired.
    ///
    /// A stale entry is evicted and reported as a miss.
    pub fn get(&self, key: &str) -> Option<Value> {
        let stale = {
            let entry = self.entries.get(key)?;
            if entry.is_fresh() {
                return Some(entry.data.clone());
            }
            true
        };
        if stale {
            debug!("evicting stale cache entry '{}'", key);
            self.entries.remove(key);
        }
        None
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries currently held, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every expired entry. Called from the maintenance task.
    pub fn sweep_expired(&self) {
        self.entries.retain(|_, entry| entry.is_fresh());
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_within_ttl() {
        let cache = ResponseCache::new();
        let value = json!({"price": 150.25, "currency": "USD"});

        cache.insert("yahoo:quote", value.clone(), Duration::from_secs(60));
        assert_eq!(cache.get("yahoo:quote"), Some(value));
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = ResponseCache::new();
        cache.insert("yahoo:quote", json!(1), Duration::from_millis(10));

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("yahoo:quote"), None);
        // Lazily evicted too.
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_missing_key_is_a_miss() {
        let cache = ResponseCache::new();
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn test_overwrite_refreshes_entry() {
        let cache = ResponseCache::new();
        cache.insert("k", json!(1), Duration::from_secs(60));
        cache.insert("k", json!(2), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(json!(2)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_sweep_removes_expired_entries() {
        let cache = ResponseCache::new();
        cache.insert("stale", json!(1), Duration::from_millis(10));
        cache.insert("fresh", json!(2), Duration::from_secs(60));

        std::thread::sleep(Duration::from_millis(20));
        cache.sweep_expired();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh"), Some(json!(2)));
    }

    #[test]
    fn test_clear() {
        let cache = ResponseCache::new();
        cache.insert("a", json!(1), Duration::from_secs(60));
        cache.insert("b", json!(2), Duration::from_secs(60));
        cache.clear();
        assert!(cache.is_empty());
    }
}
