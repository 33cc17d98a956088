//! Bounded least-recently-used map
//!
//! Entries are stamped with a monotonically increasing tick on every read or
//! write; a `BTreeMap` ordered by tick finds the eviction victim. All access
//! goes through one mutex, which is never held across an `.await`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

struct Entry<V> {
    value: V,
    tick: u64,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    recency: BTreeMap<u64, String>,
    next_tick: u64,
}

impl<V> Inner<V> {
    fn touch(&mut self, key: &str) -> Option<&Entry<V>> {
        let tick = self.next_tick;
        let entry = self.entries.get_mut(key)?;
        self.recency.remove(&entry.tick);
        entry.tick = tick;
        self.recency.insert(tick, key.to_string());
        self.next_tick += 1;
        self.entries.get(key)
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.recency.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }
}

/// Thread-safe LRU cache keyed by string
pub struct LruCache<V> {
    capacity: usize,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> LruCache<V> {
    /// Creates a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                next_tick: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns a clone of the cached value, marking it most recently used
    pub fn get(&self, key: &str) -> Option<V> {
        self.lock().touch(key).map(|entry| entry.value.clone())
    }

    /// Inserts or replaces a value, evicting the least recently used entry if full
    ///
    /// Returns the key that was evicted, if any.
    pub fn insert(&self, key: impl Into<String>, value: V) -> Option<String> {
        let key = key.into();
        let mut inner = self.lock();
        let tick = inner.next_tick;
        inner.next_tick += 1;

        if let Some(old) = inner.entries.insert(key.clone(), Entry { value, tick }) {
            inner.recency.remove(&old.tick);
            inner.recency.insert(tick, key);
            return None;
        }

        inner.recency.insert(tick, key);
        if inner.entries.len() > self.capacity {
            inner.evict_oldest()
        } else {
            None
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every entry
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.recency.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_insert_and_get() {
        let cache = LruCache::new(4);
        cache.insert("U1", "alice".to_string());
        assert_eq!(cache.get("U1"), Some("alice".to_string()));
        assert_eq!(cache.get("U2"), None);
    }

    #[test]
    fn test_overflow_evicts_exactly_one_lru_entry() {
        let cache = LruCache::new(3);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        // Reading "a" makes "b" the least recently used
        assert_eq!(cache.get("a"), Some(1));

        let evicted = cache.insert("d", 4);
        assert_eq!(evicted, Some("b".to_string()));
        assert_eq!(cache.len(), 3);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert!(cache.contains("d"));
    }

    #[test]
    fn test_replacing_key_does_not_evict() {
        let cache = LruCache::new(2);
        cache.insert("general", 1);
        cache.insert("random", 2);
        assert_eq!(cache.insert("general", 10), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("general"), Some(10));
    }

    #[test]
    fn test_zero_capacity_clamped_to_one() {
        let cache = LruCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("b"));
    }

    #[test]
    fn test_clear() {
        let cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(LruCache::new(64));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        cache.insert(format!("{}-{}", t, i), i);
                        cache.get(&format!("{}-{}", t, i / 2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 64);
    }
}
