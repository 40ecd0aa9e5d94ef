//! Deterministic metrics snapshot for a store (§1a).
//!
//! Reports via a `BTreeMap` rather than a `HashMap` so output ordering is
//! reproducible across runs — matters for anything that logs or serialises
//! a snapshot.

use std::collections::BTreeMap;

use crate::store::unlocked::Counters;

/// A point-in-time snapshot of one store's (or, for the striped variant,
/// one bucket's) counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
    pub max_size: usize,
}

impl StoreMetrics {
    pub(crate) fn snapshot(counters: &Counters, len: usize, max_size: usize) -> Self {
        StoreMetrics {
            hits: counters.hits(),
            misses: counters.misses(),
            evictions: counters.evictions(),
            len,
            max_size,
        }
    }

    /// Combines two snapshots, as when aggregating stripes of a
    /// `StripedStore` into a single report.
    pub fn merge(self, other: StoreMetrics) -> StoreMetrics {
        StoreMetrics {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            evictions: self.evictions + other.evictions,
            len: self.len + other.len,
            max_size: self.max_size.max(other.max_size),
        }
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Deterministic-order report suitable for logging.
    pub fn to_btreemap(&self) -> BTreeMap<String, u64> {
        let mut map = BTreeMap::new();
        map.insert("hits".to_string(), self.hits);
        map.insert("misses".to_string(), self.misses);
        map.insert("evictions".to_string(), self.evictions);
        map.insert("len".to_string(), self.len as u64);
        map.insert("max_size".to_string(), self.max_size as u64);
        map
    }
}
