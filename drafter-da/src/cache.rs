//! Result cache collaborator boundary
//!
//! **[DA-EXT-010]** The cache manager proper is an external collaborator;
//! this is only its narrow consumed interface (get/set with TTL and
//! tag-based invalidation) plus an in-memory implementation used when no
//! external cache is deployed. Completed analysis results are cached keyed
//! by upload content hash.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Narrow key/value cache interface consumed by the pipeline
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;
    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration, tags: &[&str]);
    fn delete_by_tag(&self, tag: &str) -> usize;
}

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
    tags: Vec<String>,
}

/// In-memory TTL cache
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration, tags: &[&str]) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        );
    }

    fn delete_by_tag(&self, tag: &str) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !entry.tags.iter().any(|t| t == tag));
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_and_tag_invalidation() {
        let cache = MemoryCache::new();
        cache.set("a", json!({"n": 1}), Duration::from_secs(60), &["cad-results"]);
        cache.set("b", json!({"n": 2}), Duration::from_secs(60), &["other"]);

        assert_eq!(cache.get("a").unwrap()["n"], 1);
        assert_eq!(cache.delete_by_tag("cad-results"), 1);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_expired_entry_is_miss() {
        let cache = MemoryCache::new();
        cache.set("k", json!(true), Duration::from_millis(0), &[]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_none());
    }
}
