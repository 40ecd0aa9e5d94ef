//! The unlocked LRU engine (§4.1): a hash index over an intrusive list.
//!
//! This is the innermost layer with no synchronisation of its own — every
//! concurrency wrapper in this module owns one (or, for the striped
//! variant, several) behind its own lock. Bounds a single entry-count
//! capacity (no separate byte-size budget) behind the six-operation
//! interface in §4.1.

use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::entry::CacheEntry;
use crate::list::{List, Node};

/// Counters kept alongside the store for the `metrics` module to snapshot.
///
/// Atomic so `get` can take a shared reference (and, in `RwLockStore`, a
/// shared lock) while still recording hit/miss counts.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) evictions: AtomicU64,
}

impl Counters {
    pub(crate) fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub(crate) fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub(crate) fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

/// A single-threaded, fixed-capacity LRU map.
///
/// `max_size` bounds the entry count, not a byte budget (§3).
pub struct LruStore<K, V, S = std::collections::hash_map::RandomState> {
    list: List<CacheEntry<K, V>>,
    index: HashMap<K, *mut Node<CacheEntry<K, V>>, S>,
    max_size: usize,
    pub(crate) counters: Counters,
}

// Safety: a `LruStore` is only ever reached through one of the wrappers in
// this module, each of which serialises access with its own lock before
// touching the list/index. The raw pointers stored in `index` are never
// dereferenced without that lock held.
unsafe impl<K: Send, V: Send, S: Send> Send for LruStore<K, V, S> {}

// Safety: the only raw-pointer-mediated access from a shared reference is
// `get`, which performs an immutable read of a node already reachable
// through `index`; `RwLockStore` is the sole caller that reaches `get`
// through a shared `&self`, and it does so under the rwlock's read guard,
// which already excludes concurrent mutators.
unsafe impl<K: Send + Sync, V: Send + Sync, S: Send + Sync> Sync for LruStore<K, V, S> {}

impl<K, V> LruStore<K, V, std::collections::hash_map::RandomState>
where
    K: Eq + Hash,
{
    /// Builds a store with the given entry-count capacity.
    pub fn new(max_size: usize) -> Self {
        Self::with_hasher(max_size, Default::default())
    }
}

impl<K, V, S> LruStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    pub(crate) fn with_hasher(max_size: usize, hash_builder: S) -> Self {
        LruStore {
            list: List::new(),
            index: HashMap::with_hasher(hash_builder),
            max_size: max_size.max(1),
            counters: Counters::default(),
        }
    }

    pub(crate) fn max_size(&self) -> usize {
        self.max_size
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl<K, V, S> LruStore<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher,
{
    /// §4.1 `Put`: insert-or-overwrite, refreshing LRU, evicting from the
    /// back while over capacity.
    pub(crate) fn put(&mut self, key: K, value: V) -> bool {
        let existed = self.remove_internal(&key).is_some();
        let node = self.list.push_front(CacheEntry::new(key.clone(), value));
        self.index.insert(key, node);
        while self.index.len() > self.max_size {
            self.evict_oldest();
        }
        existed
    }

    /// §4.1 `PutIfAbsent`.
    pub(crate) fn put_if_absent(&mut self, key: K, value: V) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.put(key, value);
        true
    }

    /// §4.1 `Set`: no-op on absent key, otherwise behaves as `Put`.
    pub(crate) fn set(&mut self, key: K, value: V) -> bool {
        if !self.index.contains_key(&key) {
            return false;
        }
        self.put(key, value);
        true
    }

    /// §4.1 `Delete`.
    pub(crate) fn delete(&mut self, key: &K) -> bool {
        self.remove_internal(key).is_some()
    }

    /// §4.1 `Get`: pure read, does **not** touch LRU order (Open Question
    /// decision, §9). Takes `&self`, not `&mut self`, so that `RwLockStore`
    /// can serve it behind a shared lock.
    pub(crate) fn get(&self, key: &K) -> Option<V> {
        match self.index.get(key) {
            // Safety: nodes in `index` are always live list nodes.
            Some(&node) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(unsafe { self.list.get(node) }.value.clone())
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// §4.1 `evict_oldest`: removes the back entry. Used directly by the
    /// striped wrapper when saturated (§4.2).
    pub(crate) fn evict_oldest(&mut self) -> bool {
        match self.list.pop_back() {
            Some(entry) => {
                self.index.remove(&entry.key);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    fn remove_internal(&mut self, key: &K) -> Option<CacheEntry<K, V>> {
        let node = self.index.remove(key)?;
        // Safety: `node` came from `index`, which only ever stores live
        // nodes of `self.list`.
        Some(unsafe { self.list.remove(node) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(cap: usize) -> LruStore<String, String> {
        LruStore::new(cap)
    }

    #[test]
    fn put_then_get_roundtrip() {
        let mut s = store(4);
        assert!(!s.put("a".into(), "1".into()));
        assert_eq!(s.get(&"a".to_string()), Some("1".to_string()));
    }

    #[test]
    fn put_returns_whether_key_existed() {
        let mut s = store(4);
        assert!(!s.put("a".into(), "1".into()));
        assert!(s.put("a".into(), "2".into()));
        assert_eq!(s.get(&"a".to_string()), Some("2".to_string()));
    }

    #[test]
    fn put_if_absent_does_not_overwrite() {
        let mut s = store(4);
        assert!(s.put_if_absent("a".into(), "1".into()));
        assert!(!s.put_if_absent("a".into(), "2".into()));
        assert_eq!(s.get(&"a".to_string()), Some("1".to_string()));
    }

    #[test]
    fn set_is_noop_on_missing_key() {
        let mut s = store(4);
        assert!(!s.set("a".into(), "1".into()));
        assert_eq!(s.get(&"a".to_string()), None);
    }

    #[test]
    fn delete_reports_prior_presence() {
        let mut s = store(4);
        assert!(!s.delete(&"a".to_string()));
        s.put("a".into(), "1".into());
        assert!(s.delete(&"a".to_string()));
        assert_eq!(s.get(&"a".to_string()), None);
    }

    #[test]
    fn get_does_not_refresh_lru_order() {
        let mut s = store(2);
        s.put("a".into(), "1".into());
        s.put("b".into(), "2".into());
        // repeatedly reading "a" must not save it from eviction, because
        // Get is specified as a pure read.
        for _ in 0..5 {
            s.get(&"a".to_string());
        }
        s.put("c".into(), "3".into());
        assert_eq!(s.get(&"a".to_string()), None);
        assert_eq!(s.get(&"b".to_string()), Some("2".to_string()));
        assert_eq!(s.get(&"c".to_string()), Some("3".to_string()));
    }

    #[test]
    fn eviction_removes_least_recently_touched() {
        let mut s = store(2);
        s.put("a".into(), "1".into());
        s.put("b".into(), "2".into());
        s.put("c".into(), "3".into()); // a evicted
        assert_eq!(s.len(), 2);
        assert_eq!(s.get(&"a".to_string()), None);
        assert_eq!(s.get(&"b".to_string()), Some("2".to_string()));
        assert_eq!(s.get(&"c".to_string()), Some("3".to_string()));
    }

    #[test]
    fn set_refreshes_lru_order() {
        let mut s = store(2);
        s.put("a".into(), "1".into());
        s.put("b".into(), "2".into());
        s.set("a".into(), "1b".into()); // a is now most recent
        s.put("c".into(), "3".into()); // b evicted, not a
        assert_eq!(s.get(&"a".to_string()), Some("1b".to_string()));
        assert_eq!(s.get(&"b".to_string()), None);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut s = store(3);
        for i in 0..100 {
            s.put(format!("k{i}"), format!("v{i}"));
            assert!(s.len() <= 3);
        }
    }

    #[test]
    fn evict_oldest_reports_emptiness() {
        let mut s = store(1);
        assert!(!s.evict_oldest());
        s.put("a".into(), "1".into());
        assert!(s.evict_oldest());
        assert!(!s.evict_oldest());
    }
}
