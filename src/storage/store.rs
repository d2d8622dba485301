//! Key-Value Store
//!
//! This module wraps the [`HashIndex`] in the byte-string map the command layer
//! talks to. It enforces the maximum value length and keeps operation counters.
//!
//! ## Ownership Model
//!
//! The store is a plain value: the reactor owns it and lends `&mut Store` to
//! each command it executes. There are no locks because only the reactor
//! thread ever reaches it.

use crate::protocol::MAX_PAYLOAD_LEN;
use crate::storage::index::{HashIndex, IndexConfig};
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

/// Largest value the store accepts. Any stored value fits in one GET response.
pub const MAX_VALUE_LEN: usize = MAX_PAYLOAD_LEN;

/// Errors returned by store mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("value too large: {size} bytes (max: {max})")]
    ValueTooLarge { size: usize, max: usize },
}

/// Statistics about store usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub keys: usize,
    pub capacity: usize,
    pub resizing: bool,
    pub get_ops: u64,
    pub set_ops: u64,
    pub del_ops: u64,
}

/// The key-value map behind GET/SET/DEL.
///
/// # Example
///
/// ```
/// use pollkv::storage::Store;
/// use bytes::Bytes;
///
/// let mut store = Store::new();
/// store.set(Bytes::from("name"), Bytes::from("Ariz")).unwrap();
/// assert_eq!(store.get(b"name"), Some(Bytes::from("Ariz")));
/// assert!(store.delete(b"name"));
/// assert_eq!(store.get(b"name"), None);
/// ```
pub struct Store {
    index: HashIndex<Bytes, Bytes>,
    get_count: u64,
    set_count: u64,
    del_count: u64,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("keys", &self.index.len())
            .field("capacity", &self.index.capacity())
            .field("resizing", &self.index.is_resizing())
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates an empty store with default index settings.
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    /// Creates an empty store with explicit index tuning.
    pub fn with_config(config: IndexConfig) -> Self {
        Self {
            index: HashIndex::with_config(config),
            get_count: 0,
            set_count: 0,
            del_count: 0,
        }
    }

    /// Gets the value for a key.
    pub fn get(&mut self, key: &[u8]) -> Option<Bytes> {
        self.get_count += 1;
        self.index.lookup(key).cloned()
    }

    /// Sets a key-value pair, overwriting any existing value.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was updated.
    pub fn set(&mut self, key: Bytes, value: Bytes) -> Result<bool, StoreError> {
        if value.len() > MAX_VALUE_LEN {
            return Err(StoreError::ValueTooLarge {
                size: value.len(),
                max: MAX_VALUE_LEN,
            });
        }

        self.set_count += 1;
        let was_resizing = self.index.is_resizing();
        let created = self.index.insert(key, value).is_none();
        if !was_resizing && self.index.is_resizing() {
            debug!(
                keys = self.index.len(),
                capacity = self.index.capacity(),
                "Index resize started"
            );
        }
        Ok(created)
    }

    /// Deletes a key.
    ///
    /// # Returns
    ///
    /// Returns `true` if the key was deleted, `false` if it didn't exist.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        self.del_count += 1;
        self.index.remove(key)
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Advances a pending index resize by one slice.
    ///
    /// Called by the reactor when a poll cycle finds nothing to do, so
    /// migration also progresses while clients are idle.
    pub fn housekeeping(&mut self) -> bool {
        if !self.index.is_resizing() {
            return false;
        }
        let still_resizing = self.index.step_resize();
        if !still_resizing {
            debug!(capacity = self.index.capacity(), "Index resize finished");
        }
        still_resizing
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.index.len(),
            capacity: self.index.capacity(),
            resizing: self.index.is_resizing(),
            get_ops: self.get_count,
            set_ops: self.set_count,
            del_ops: self.del_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut store = Store::new();

        assert_eq!(store.set(Bytes::from("key"), Bytes::from("value")), Ok(true));
        assert_eq!(store.get(b"key"), Some(Bytes::from("value")));
    }

    #[test]
    fn test_get_nonexistent() {
        let mut store = Store::new();
        assert_eq!(store.get(b"nonexistent"), None);
    }

    #[test]
    fn test_overwrite() {
        let mut store = Store::new();

        store.set(Bytes::from("key"), Bytes::from("v1")).unwrap();
        assert_eq!(store.set(Bytes::from("key"), Bytes::from("v2")), Ok(false));
        assert_eq!(store.get(b"key"), Some(Bytes::from("v2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete() {
        let mut store = Store::new();

        store.set(Bytes::from("key"), Bytes::from("value")).unwrap();
        assert!(store.delete(b"key"));
        assert_eq!(store.get(b"key"), None);
        assert!(!store.delete(b"key")); // Already deleted
    }

    #[test]
    fn test_value_too_large() {
        let mut store = Store::new();

        let big = Bytes::from(vec![0u8; MAX_VALUE_LEN + 1]);
        assert_eq!(
            store.set(Bytes::from("key"), big),
            Err(StoreError::ValueTooLarge {
                size: MAX_VALUE_LEN + 1,
                max: MAX_VALUE_LEN,
            })
        );
        assert!(store.is_empty());

        let exact = Bytes::from(vec![0u8; MAX_VALUE_LEN]);
        assert_eq!(store.set(Bytes::from("key"), exact), Ok(true));
    }

    #[test]
    fn test_housekeeping_finishes_resize() {
        let mut store = Store::with_config(IndexConfig {
            initial_capacity: 4,
            resize_work: 1,
        });
        // one past the load-factor threshold of a 4-bucket table
        for i in 0..33 {
            store
                .set(Bytes::from(format!("key:{}", i)), Bytes::from("v"))
                .unwrap();
        }
        assert!(store.stats().resizing);

        while store.housekeeping() {}

        let stats = store.stats();
        assert!(!stats.resizing);
        assert_eq!(stats.keys, 33);
        assert_eq!(stats.capacity, 8);
    }

    #[test]
    fn test_stats() {
        let mut store = Store::new();

        store.set(Bytes::from("a"), Bytes::from("1")).unwrap();
        store.get(b"a");
        store.get(b"b");
        store.delete(b"a");

        let stats = store.stats();
        assert_eq!(stats.set_ops, 1);
        assert_eq!(stats.get_ops, 2);
        assert_eq!(stats.del_ops, 1);
        assert_eq!(stats.keys, 0);
    }
}
