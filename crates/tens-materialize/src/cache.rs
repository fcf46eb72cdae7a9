//! Bounded in-memory cache of materialized results.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tens_canonical::ContentHash;

use crate::materializer::MaterializedResult;
use crate::profile::ProfileId;

/// Cache key: source dataset and target profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Content hash of the source dataset.
    pub source_hash: ContentHash,
    /// Target profile.
    pub profile: ProfileId,
}

/// Insertion-ordered cache that drops its oldest quarter when full.
#[derive(Debug)]
pub struct MaterializationCache {
    capacity: usize,
    entries: HashMap<CacheKey, Arc<MaterializedResult>>,
    order: VecDeque<CacheKey>,
}

impl MaterializationCache {
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Returns the cached result for `key`.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<MaterializedResult>> {
        self.entries.get(key).cloned()
    }

    /// Inserts a result, evicting first if the cache is full.
    /// Returns the number of evicted entries.
    pub fn insert(&mut self, key: CacheKey, value: Arc<MaterializedResult>) -> usize {
        if self.entries.insert(key.clone(), value).is_some() {
            return 0;
        }
        let mut evicted = 0;
        if self.entries.len() > self.capacity {
            let quarter = (self.capacity / 4).max(1);
            while evicted < quarter {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                self.entries.remove(&oldest);
                evicted += 1;
            }
        }
        self.order.push_back(key);
        evicted
    }

    /// Drops every entry materialized with `encoding`. Returns how many.
    pub fn remove_encoding(&mut self, encoding: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, v| v.encoding_name != encoding);
        let entries = &self.entries;
        self.order.retain(|k| entries.contains_key(k));
        before - self.entries.len()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materializer::MATERIALIZE_CODEC_VERSION;

    fn key(i: usize) -> CacheKey {
        CacheKey {
            source_hash: ContentHash::of(i.to_string().as_bytes()),
            profile: ProfileId::parse("bytes").unwrap(),
        }
    }

    fn result(encoding: &str) -> Arc<MaterializedResult> {
        Arc::new(MaterializedResult {
            ids: vec![1, 2, 3],
            target_profile: "bytes".to_string(),
            encoding_name: encoding.to_string(),
            id_count: 3,
            source_hash: ContentHash::of(b""),
            codec_version: MATERIALIZE_CODEC_VERSION.to_string(),
            codec_fingerprint: "f".repeat(64),
        })
    }

    #[test]
    fn evicts_oldest_quarter_when_full() {
        let mut cache = MaterializationCache::new(8);
        for i in 0..8 {
            assert_eq!(cache.insert(key(i), result("bytes")), 0);
        }
        assert_eq!(cache.insert(key(8), result("bytes")), 2);
        assert_eq!(cache.len(), 7);
        assert!(cache.get(&key(0)).is_none());
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.get(&key(2)).is_some());
        assert!(cache.get(&key(8)).is_some());
    }

    #[test]
    fn reinserting_a_key_does_not_evict() {
        let mut cache = MaterializationCache::new(2);
        cache.insert(key(0), result("bytes"));
        cache.insert(key(1), result("bytes"));
        assert_eq!(cache.insert(key(1), result("bytes")), 0);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn remove_encoding_only_drops_matching_entries() {
        let mut cache = MaterializationCache::new(10);
        cache.insert(key(0), result("bytes"));
        cache.insert(key(1), result("other"));
        assert_eq!(cache.remove_encoding("bytes"), 1);
        assert!(cache.get(&key(0)).is_none());
        assert!(cache.get(&key(1)).is_some());

        // Removed keys no longer hold a place in the eviction order.
        for i in 2..10 {
            cache.insert(key(i), result("other"));
        }
        assert_eq!(cache.len(), 9);
    }
}
