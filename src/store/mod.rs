//! The bounded LRU store and its three concurrency variants.
//!
//! [`unlocked::LruStore`] is the single-threaded engine: an intrusive list
//! ([`crate::list`]) in recency order plus a hash index from key to list
//! node. The three wrappers in this module give it to multiple threads
//! safely, each trading off differently between contention and ordering
//! guarantees (§4.2).

pub(crate) mod unlocked;

mod global_lock;
mod rw_lock;
mod striped;

pub use global_lock::GlobalLockStore;
pub use rw_lock::RwLockStore;
pub use striped::StripedStore;
pub use unlocked::LruStore;

/// The operation surface shared by the unlocked store and all three
/// concurrency wrappers (§4.1 / §4.2).
///
/// Keys and values are `Vec<u8>`: the wire protocol deals exclusively in
/// byte strings, and cloning them out on `get` keeps the trait object-safe
/// and avoids smuggling a lock guard's lifetime into callers.
pub trait Store {
    /// Inserts or overwrites `key`. Returns `true` iff a previous entry for
    /// `key` existed.
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> bool;

    /// Inserts `key` only if absent. Returns `true` iff the insertion
    /// happened.
    fn put_if_absent(&self, key: Vec<u8>, value: Vec<u8>) -> bool;

    /// Overwrites `key` only if already present, refreshing its LRU
    /// position. Returns `true` iff `key` was present.
    fn set(&self, key: Vec<u8>, value: Vec<u8>) -> bool;

    /// Removes `key`. Returns `true` iff a removal happened.
    fn delete(&self, key: &[u8]) -> bool;

    /// Reads the value for `key` without disturbing LRU order (§3 Open
    /// Questions: `Get` is a pure read by design in this implementation).
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Current number of entries.
    fn len(&self) -> usize;

    /// Whether the store currently holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
