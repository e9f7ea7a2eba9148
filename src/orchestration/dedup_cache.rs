//! # Dedup Cache
//!
//! Capacity-bounded, insertion-ordered set. A hash set answers membership and
//! a ring of keys records admission order; both are updated together by every
//! mutating call so they always hold the same keys.
//!
//! The cache is not internally synchronized. The work finder owns its cache
//! exclusively and runs single-flight under a lease monitor.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct DedupCache<K = String> {
    capacity: usize,
    members: HashSet<K>,
    order: VecDeque<K>,
}

impl<K> DedupCache<K>
where
    K: Hash + Eq + Clone,
{
    /// Create a cache holding at most `capacity` keys (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            members: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Admit `key` if absent, evicting the oldest key when full.
    ///
    /// Returns `false` and changes nothing when the key is already present.
    pub fn add(&mut self, key: K) -> bool {
        if self.members.contains(&key) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.members.insert(key.clone());
        self.order.push_back(key);
        true
    }

    pub fn remove(&mut self, key: &K) -> bool {
        if !self.members.remove(key) {
            return false;
        }
        self.order.retain(|k| k != key);
        true
    }

    pub fn contains(&self, key: &K) -> bool {
        self.members.contains(key)
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from oldest to newest admission
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_of(capacity: usize, keys: &[&str]) -> DedupCache {
        let mut cache = DedupCache::new(capacity);
        for key in keys {
            cache.add(key.to_string());
        }
        cache
    }

    #[test]
    fn test_fifo_eviction() {
        let mut cache = cache_of(2, &["a", "b", "c"]);

        assert!(!cache.contains(&"a".to_string()));
        assert!(cache.contains(&"b".to_string()));
        assert!(cache.contains(&"c".to_string()));

        // Re-adding a present key neither admits nor evicts
        assert!(!cache.add("b".to_string()));
        assert!(cache.contains(&"b".to_string()));
        assert!(cache.contains(&"c".to_string()));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_readmission_after_eviction() {
        let mut cache = cache_of(2, &["a", "b", "c"]);
        assert!(cache.add("a".to_string()));
        let order: Vec<&String> = cache.iter().collect();
        assert_eq!(order, vec!["c", "a"]);
    }

    #[test]
    fn test_remove_keeps_structures_in_step() {
        let mut cache = cache_of(3, &["a", "b", "c"]);

        assert!(cache.remove(&"b".to_string()));
        assert!(!cache.remove(&"b".to_string()));
        assert_eq!(cache.len(), 2);

        // Freed slot is reused without evicting
        assert!(cache.add("d".to_string()));
        assert!(cache.contains(&"a".to_string()));
        assert_eq!(cache.len(), 3);

        // Now full: "a" is oldest
        assert!(cache.add("e".to_string()));
        assert!(!cache.contains(&"a".to_string()));
    }

    #[test]
    fn test_clear_and_minimum_capacity() {
        let mut cache = cache_of(0, &["a", "b"]);
        assert_eq!(cache.capacity(), 1);
        assert!(cache.contains(&"b".to_string()));

        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.contains(&"b".to_string()));
    }
}
