//! Bounded TTL cache with tag invalidation
//!
//! Entries expire lazily: an expired entry is dropped the next time it is
//! read. Capacity is enforced on insert by evicting in insertion order, so
//! inserting `max_size + 1` distinct keys removes exactly the oldest one.
//! The insertion-order index is kept in step with the entry map on every
//! removal path.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::config::CacheConfig;

/// Counters reported with every cache acknowledgment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    tags: BTreeSet<String>,
}

/// Keyed result cache
#[derive(Debug)]
pub struct CacheEngine<V> {
    entries: HashMap<String, CacheEntry<V>>,
    order: VecDeque<String>,
    ttl: Duration,
    max_size: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V: Clone> CacheEngine<V> {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            ttl,
            max_size: max_size.max(1),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl_duration(), config.max_entries())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fetch a live entry, dropping it if its TTL has passed
    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            None => {
                self.misses += 1;
                return None;
            }
            Some(entry) => entry.inserted_at.elapsed() >= self.ttl,
        };

        if expired {
            self.remove_entry(key);
            self.evictions += 1;
            self.misses += 1;
            debug!(cache_key = key, "Cache entry expired");
            return None;
        }

        self.hits += 1;
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Whether `key` holds a live entry. Does not touch the counters.
    pub fn has(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.inserted_at.elapsed() < self.ttl)
    }

    /// Insert or replace `key`. A replaced key moves to the newest position.
    pub fn set<I, S>(&mut self, key: &str, value: V, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.entries.contains_key(key) {
            self.remove_entry(key);
        }
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                tags: tags.into_iter().map(Into::into).collect(),
            },
        );
        self.order.push_back(key.to_string());
        self.enforce_capacity();
    }

    /// Drop one key. Returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.remove_entry(key)
    }

    /// Drop every entry carrying `tag`. Returns the number removed.
    pub fn invalidate_by_tag(&mut self, tag: &str) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.tags.contains(tag))
            .map(|(key, _)| key.clone())
            .collect();
        self.remove_keys(&keys)
    }

    /// Drop every entry whose key starts with `prefix`
    pub fn clear_by_prefix(&mut self, prefix: &str) -> usize {
        let keys: Vec<String> = self
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        self.remove_keys(&keys)
    }

    /// Drop everything. Counters are kept.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.order.clear();
        removed
    }

    /// New lifetime for existing and future entries
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    /// New capacity, trimming the oldest entries immediately if needed
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size.max(1);
        self.enforce_capacity();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }

    /// Keys in insertion order, oldest first
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    fn enforce_capacity(&mut self) {
        while self.entries.len() > self.max_size {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                self.evictions += 1;
                debug!(cache_key = %oldest, max_size = self.max_size, "Evicted oldest cache entry");
            }
        }
    }

    fn remove_keys(&mut self, keys: &[String]) -> usize {
        keys.iter().filter(|key| self.remove_entry(key)).count()
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_none() {
            return false;
        }
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_cache(max_size: usize) -> CacheEngine<u32> {
        CacheEngine::new(Duration::from_secs(60), max_size)
    }

    #[test]
    fn test_capacity_evicts_exactly_the_oldest() {
        let mut cache = make_cache(3);
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            cache.set(key, i as u32, ["t"]);
        }

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(1));
        assert_eq!(cache.get("d"), Some(3));
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_replacing_a_key_refreshes_its_position() {
        let mut cache = make_cache(2);
        cache.set("a", 1, ["t"]);
        cache.set("b", 2, ["t"]);
        cache.set("a", 3, ["t"]);
        cache.set("c", 4, ["t"]);

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(3));
        assert_eq!(cache.keys().count(), cache.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let mut cache = CacheEngine::new(Duration::from_millis(1_000), 10);
        cache.set("k", 7u32, Vec::<String>::new());
        assert_eq!(cache.get("k"), Some(7));

        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(cache.get("k"), Some(7));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!cache.has("k"));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.keys().count(), 0);

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_tag_invalidation_keeps_order_consistent() {
        let mut cache = make_cache(3);
        cache.set("a", 1, ["student-1", "patterns"]);
        cache.set("b", 2, ["student-2", "patterns"]);
        cache.set("c", 3, ["student-1"]);

        assert_eq!(cache.invalidate_by_tag("student-1"), 2);
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec!["b"]);

        // Freed slots are reusable without evicting the survivor
        cache.set("d", 4, ["x"]);
        cache.set("e", 5, ["x"]);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_clear_by_prefix_and_all() {
        let mut cache = make_cache(10);
        cache.set("emotion-patterns:1", 1, ["p"]);
        cache.set("emotion-patterns:2", 2, ["p"]);
        cache.set("anomalies:1", 3, ["p"]);

        assert_eq!(cache.clear_by_prefix("emotion-patterns:"), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.clear_all(), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.keys().count(), 0);
    }

    #[test]
    fn test_shrinking_max_size_trims_immediately() {
        let mut cache = make_cache(5);
        for i in 0..5u32 {
            cache.set(&format!("k{}", i), i, ["t"]);
        }
        cache.set_max_size(2);
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec!["k3", "k4"]);
        assert_eq!(cache.stats().evictions, 3);
    }

    #[test]
    fn test_from_config_applies_floor() {
        let config = CacheConfig {
            ttl: 10,
            max_size: 0,
            invalidate_on_config_change: true,
        };
        let cache: CacheEngine<u32> = CacheEngine::from_config(&config);
        assert_eq!(cache.ttl(), Duration::from_millis(1_000));
        assert_eq!(cache.max_size(), 1);
    }
}
