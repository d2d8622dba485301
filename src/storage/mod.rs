//! Storage Engine Module
//!
//! This module provides the in-memory storage for pollkv: a chained hash
//! index that grows without ever rehashing everything at once, and the
//! key-value store built on top of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │     get / set / delete, value-size limit, op counters       │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │                    HashIndex                          │  │
//! │  │   ┌──────────────┐          ┌──────────────────┐      │  │
//! │  │   │   primary    │ <─────── │ retiring (resize)│      │  │
//! │  │   └──────────────┘ K/op     └──────────────────┘      │  │
//! │  │            node arena (Vec + free list)               │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Incremental Resize**: migration work is spread over later operations
//! - **Arena Chains**: nodes are linked by index, not by pointer
//! - **Single Owner**: the store is owned by the reactor, no locking
//!
//! ## Example
//!
//! ```
//! use pollkv::storage::Store;
//! use bytes::Bytes;
//!
//! let mut store = Store::new();
//! store.set(Bytes::from("name"), Bytes::from("Ariz")).unwrap();
//! assert_eq!(store.get(b"name"), Some(Bytes::from("Ariz")));
//! ```

pub mod index;
pub mod store;

// Re-export commonly used types
pub use index::{fnv1a, HashIndex, IndexConfig};
pub use store::{StorageStats, Store, StoreError, MAX_VALUE_LEN};
