//! Reader/writer-lock concurrency wrapper (§4.2).
//!
//! `get` takes a shared lock; every mutator takes the exclusive lock. This
//! split is only sound because `Get` is specified as a pure read in this
//! implementation (§3 Open Questions) — a store whose `get` refreshed LRU
//! order could never be expressed behind a read lock.

use parking_lot::RwLock;

use super::unlocked::LruStore;
use super::Store;
use crate::metrics::StoreMetrics;

pub struct RwLockStore {
    inner: RwLock<LruStore<Vec<u8>, Vec<u8>>>,
}

impl RwLockStore {
    pub fn new(max_size: usize) -> Self {
        RwLockStore {
            inner: RwLock::new(LruStore::new(max_size)),
        }
    }

    pub fn metrics(&self) -> StoreMetrics {
        let guard = self.inner.read();
        StoreMetrics::snapshot(&guard.counters, guard.len(), guard.max_size())
    }
}

impl Store for RwLockStore {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> bool {
        self.inner.write().put(key, value)
    }

    fn put_if_absent(&self, key: Vec<u8>, value: Vec<u8>) -> bool {
        self.inner.write().put_if_absent(key, value)
    }

    fn set(&self, key: Vec<u8>, value: Vec<u8>) -> bool {
        self.inner.write().set(key, value)
    }

    fn delete(&self, key: &[u8]) -> bool {
        self.inner.write().delete(&key.to_vec())
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        // `get` only ever reads `counters.hits`/`misses` and clones a value
        // out of the list — no pointer surgery — so a shared lock suffices.
        self.inner.read().get(&key.to_vec())
    }

    fn len(&self) -> usize {
        self.inner.read().len()
    }
}
