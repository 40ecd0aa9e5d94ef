//! Global-lock concurrency wrapper (§4.2): a single mutex around the
//! unlocked store. Every public call takes it for the duration of the
//! underlying operation — simplest variant, most contention.

use parking_lot::Mutex;

use super::unlocked::LruStore;
use super::Store;
use crate::metrics::StoreMetrics;

pub struct GlobalLockStore {
    inner: Mutex<LruStore<Vec<u8>, Vec<u8>>>,
}

impl GlobalLockStore {
    pub fn new(max_size: usize) -> Self {
        GlobalLockStore {
            inner: Mutex::new(LruStore::new(max_size)),
        }
    }

    pub fn metrics(&self) -> StoreMetrics {
        let guard = self.inner.lock();
        StoreMetrics::snapshot(&guard.counters, guard.len(), guard.max_size())
    }
}

impl Store for GlobalLockStore {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> bool {
        self.inner.lock().put(key, value)
    }

    fn put_if_absent(&self, key: Vec<u8>, value: Vec<u8>) -> bool {
        self.inner.lock().put_if_absent(key, value)
    }

    fn set(&self, key: Vec<u8>, value: Vec<u8>) -> bool {
        self.inner.lock().set(key, value)
    }

    fn delete(&self, key: &[u8]) -> bool {
        self.inner.lock().delete(&key.to_vec())
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.lock().get(&key.to_vec())
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
