//! Incrementally Resizing Hash Index
//!
//! This module implements the chained hash table that backs the [`Store`].
//! Nodes live in an arena (`Vec<Option<Node>>`) and chains are linked by
//! integer handles, so detaching and re-linking a node never moves or frees
//! anything behind a live reference.
//!
//! ## Incremental Resize
//!
//! A plain hash map doubles its capacity in one go, rehashing every entry
//! while the caller waits. Here a resize only swaps tables:
//!
//! ```text
//!   before                      during                         after
//! ┌─────────┐          ┌─────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │ primary │   ──>    │retiring │──>│ primary (2x cap) │──>│ primary (2x cap) │
//! │  cap N  │          │  cap N  │   │                  │   │                  │
//! └─────────┘          └─────────┘   └──────────────────┘   └──────────────────┘
//!                       cursor ──^   K buckets moved per call
//! ```
//!
//! Every insert, lookup and removal first migrates at most `resize_work`
//! buckets from the retiring table, starting at the resume cursor. Lookups
//! probe the primary table first and then the retiring one. Inserts only ever
//! go into the primary table.
//!
//! [`Store`]: crate::storage::Store

use std::mem;

/// Average chain length that triggers a resize.
pub const MAX_LOAD_FACTOR: usize = 8;

/// Buckets migrated per operation while a resize is in flight.
pub const RESIZE_WORK: usize = 128;

/// Capacity of a freshly created index.
pub const INITIAL_CAPACITY: usize = 4;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over a byte string.
#[inline]
pub fn fnv1a(data: &[u8]) -> u64 {
    data.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Tuning knobs for a [`HashIndex`].
#[derive(Debug, Clone, Copy)]
pub struct IndexConfig {
    /// Starting bucket count, rounded up to a power of two
    pub initial_capacity: usize,
    /// Bucket migrations performed per operation during a resize
    pub resize_work: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            initial_capacity: INITIAL_CAPACITY,
            resize_work: RESIZE_WORK,
        }
    }
}

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    hash: u64,
    next: Option<usize>,
}

/// One generation of buckets. Each bucket holds the arena handle of the
/// first node in its chain.
#[derive(Debug)]
struct Table {
    buckets: Vec<Option<usize>>,
    mask: usize,
    size: usize,
}

impl Table {
    fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        Self {
            buckets: vec![None; capacity],
            mask: capacity - 1,
            size: 0,
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & self.mask
    }
}

/// Where a matching node sits in its chain.
struct Found {
    handle: usize,
    prev: Option<usize>,
    bucket: usize,
}

/// A chained hash table with stop-and-resume resizing.
///
/// # Example
///
/// ```
/// use pollkv::storage::HashIndex;
///
/// let mut index = HashIndex::new();
/// index.insert(b"name".to_vec(), "Ariz");
/// assert_eq!(index.lookup(b"name"), Some(&"Ariz"));
/// assert!(index.remove(b"name"));
/// assert!(index.is_empty());
/// ```
#[derive(Debug)]
pub struct HashIndex<K, V> {
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    primary: Table,
    retiring: Option<Table>,
    resize_cursor: usize,
    resize_work: usize,
}

impl<K: AsRef<[u8]>, V> Default for HashIndex<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: AsRef<[u8]>, V> HashIndex<K, V> {
    /// Creates an empty index with default settings.
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    /// Creates an empty index with explicit tuning.
    pub fn with_config(config: IndexConfig) -> Self {
        let capacity = config.initial_capacity.max(1).next_power_of_two();
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            primary: Table::new(capacity),
            retiring: None,
            resize_cursor: 0,
            resize_work: config.resize_work.max(1),
        }
    }

    /// Number of entries across both generations.
    pub fn len(&self) -> usize {
        self.primary.size + self.retiring.as_ref().map_or(0, |t| t.size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bucket count of the primary table.
    pub fn capacity(&self) -> usize {
        self.primary.capacity()
    }

    /// Returns true while entries remain in the retiring table.
    pub fn is_resizing(&self) -> bool {
        self.retiring.is_some()
    }

    /// Inserts or overwrites `key`, returning the previous value if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.help_resize();

        let hash = fnv1a(key.as_ref());
        if let Some((_, found)) = self.find(key.as_ref(), hash) {
            let node = self.node_mut(found.handle);
            return Some(mem::replace(&mut node.value, value));
        }

        let handle = self.alloc(Node {
            key,
            value,
            hash,
            next: None,
        });
        Self::link(&mut self.nodes, &mut self.primary, handle);

        self.maybe_start_resize();
        None
    }

    /// Looks up the value stored under `key`.
    pub fn lookup(&mut self, key: &[u8]) -> Option<&V> {
        self.help_resize();

        let hash = fnv1a(key);
        let (_, found) = self.find(key, hash)?;
        self.nodes[found.handle].as_ref().map(|node| &node.value)
    }

    /// Returns true if `key` is present.
    pub fn contains(&mut self, key: &[u8]) -> bool {
        self.lookup(key).is_some()
    }

    /// Removes `key`, returning its value if it was present.
    pub fn pop(&mut self, key: &[u8]) -> Option<V> {
        self.help_resize();

        let hash = fnv1a(key);
        let (in_retiring, found) = self.find(key, hash)?;
        let table = if in_retiring {
            self.retiring.as_mut()?
        } else {
            &mut self.primary
        };
        Self::unlink(&mut self.nodes, table, &found);

        let node = self.nodes[found.handle].take()?;
        self.free.push(found.handle);
        self.finish_resize_if_drained();
        Some(node.value)
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        self.pop(key).is_some()
    }

    /// Performs one slice of pending migration work without touching any key.
    ///
    /// Returns true if a resize is still in flight afterwards.
    pub fn step_resize(&mut self) -> bool {
        self.help_resize();
        self.is_resizing()
    }

    fn node_mut(&mut self, handle: usize) -> &mut Node<K, V> {
        match self.nodes[handle].as_mut() {
            Some(node) => node,
            None => unreachable!("chain references freed slot {}", handle),
        }
    }

    fn alloc(&mut self, node: Node<K, V>) -> usize {
        match self.free.pop() {
            Some(handle) => {
                self.nodes[handle] = Some(node);
                handle
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    /// Pushes an allocated node onto the head of its chain in `table`.
    fn link(nodes: &mut [Option<Node<K, V>>], table: &mut Table, handle: usize) {
        if let Some(node) = nodes[handle].as_mut() {
            let bucket = table.bucket_of(node.hash);
            node.next = table.buckets[bucket];
            table.buckets[bucket] = Some(handle);
            table.size += 1;
        }
    }

    /// Detaches a node from its chain in `table`. The arena slot stays occupied.
    fn unlink(nodes: &mut [Option<Node<K, V>>], table: &mut Table, found: &Found) {
        let next = nodes[found.handle].as_ref().and_then(|node| node.next);
        match found.prev {
            Some(prev) => {
                if let Some(prev) = nodes[prev].as_mut() {
                    prev.next = next;
                }
            }
            None => table.buckets[found.bucket] = next,
        }
        table.size -= 1;
    }

    fn find_in(nodes: &[Option<Node<K, V>>], table: &Table, key: &[u8], hash: u64) -> Option<Found> {
        let bucket = table.bucket_of(hash);
        let mut prev = None;
        let mut cursor = table.buckets[bucket];

        while let Some(handle) = cursor {
            let node = nodes[handle].as_ref()?;
            if node.hash == hash && node.key.as_ref() == key {
                return Some(Found {
                    handle,
                    prev,
                    bucket,
                });
            }
            prev = Some(handle);
            cursor = node.next;
        }
        None
    }

    /// Probes the primary table, then the retiring one.
    ///
    /// The flag is true when the match lives in the retiring table.
    fn find(&self, key: &[u8], hash: u64) -> Option<(bool, Found)> {
        if let Some(found) = Self::find_in(&self.nodes, &self.primary, key, hash) {
            return Some((false, found));
        }
        let retiring = self.retiring.as_ref()?;
        Self::find_in(&self.nodes, retiring, key, hash).map(|found| (true, found))
    }

    fn maybe_start_resize(&mut self) {
        if self.retiring.is_some() {
            return;
        }
        if self.primary.size <= self.primary.capacity() * MAX_LOAD_FACTOR {
            return;
        }

        let doubled = Table::new(self.primary.capacity() << 1);
        self.retiring = Some(mem::replace(&mut self.primary, doubled));
        self.resize_cursor = 0;
    }

    /// Moves up to `resize_work` buckets from the retiring table into the primary.
    fn help_resize(&mut self) {
        let Some(retiring) = self.retiring.as_mut() else {
            return;
        };

        let mut work = 0;
        while work < self.resize_work
            && retiring.size > 0
            && self.resize_cursor < retiring.capacity()
        {
            let mut cursor = retiring.buckets[self.resize_cursor].take();
            while let Some(handle) = cursor {
                cursor = self.nodes[handle].as_ref().and_then(|node| node.next);
                retiring.size -= 1;
                Self::link(&mut self.nodes, &mut self.primary, handle);
            }
            self.resize_cursor += 1;
            work += 1;
        }

        self.finish_resize_if_drained();
    }

    fn finish_resize_if_drained(&mut self) {
        if self.retiring.as_ref().is_some_and(|t| t.size == 0) {
            self.retiring = None;
            self.resize_cursor = 0;
        }
    }

    /// Verifies the structural invariants of both generations.
    #[cfg(test)]
    fn check_invariants(&self) {
        let tables = std::iter::once(&self.primary).chain(self.retiring.as_ref());
        let mut reachable = 0;

        for table in tables {
            assert!(table.capacity().is_power_of_two());
            assert_eq!(table.mask, table.capacity() - 1);

            let mut counted = 0;
            for (bucket, head) in table.buckets.iter().enumerate() {
                let mut cursor = *head;
                while let Some(handle) = cursor {
                    let node = self.nodes[handle].as_ref().expect("chain hits a free slot");
                    assert_eq!(table.bucket_of(node.hash), bucket);
                    assert_eq!(node.hash, fnv1a(node.key.as_ref()));
                    counted += 1;
                    cursor = node.next;
                }
            }
            assert_eq!(counted, table.size);
            reachable += counted;
        }

        let live = self.nodes.iter().filter(|slot| slot.is_some()).count();
        assert_eq!(reachable, live);
        assert_eq!(live + self.free.len(), self.nodes.len());
        if let Some(retiring) = &self.retiring {
            assert!(retiring.size > 0);
            assert_eq!(self.primary.capacity(), retiring.capacity() * 2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tight_index() -> HashIndex<Vec<u8>, u64> {
        HashIndex::with_config(IndexConfig {
            initial_capacity: 4,
            resize_work: 1,
        })
    }

    fn key(i: u64) -> Vec<u8> {
        format!("key:{}", i).into_bytes()
    }

    #[test]
    fn test_fnv1a_known_values() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a(b"foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut index = HashIndex::new();
        assert_eq!(index.insert(b"key".to_vec(), 1), None);
        assert_eq!(index.lookup(b"key"), Some(&1));
        assert_eq!(index.lookup(b"missing"), None);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_contains() {
        let mut index = tight_index();
        for i in 0..100 {
            index.insert(key(i), i);
        }
        assert!(index.is_resizing() || index.capacity() > 4);

        for i in 0..100 {
            assert!(index.contains(&key(i)), "key {} missing", i);
        }
        assert!(!index.contains(b"key:100"));

        index.remove(&key(7));
        assert!(!index.contains(&key(7)));
    }

    #[test]
    fn test_insert_overwrites() {
        let mut index = HashIndex::new();
        index.insert(b"key".to_vec(), 1);
        assert_eq!(index.insert(b"key".to_vec(), 2), Some(1));
        assert_eq!(index.lookup(b"key"), Some(&2));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut index = HashIndex::new();
        index.insert(b"key".to_vec(), 1);
        assert!(index.remove(b"key"));
        assert!(!index.remove(b"key")); // Already removed
        assert_eq!(index.lookup(b"key"), None);
        assert!(index.is_empty());
    }

    #[test]
    fn test_remove_middle_of_chain() {
        // one bucket forces every key into the same chain
        let mut index = HashIndex::with_config(IndexConfig {
            initial_capacity: 1,
            resize_work: 1,
        });
        for i in 0..5 {
            index.insert(key(i), i);
        }
        assert_eq!(index.pop(&key(2)), Some(2));
        index.check_invariants();
        for i in [0, 1, 3, 4] {
            assert_eq!(index.lookup(&key(i)), Some(&i));
        }
    }

    #[test]
    fn test_slots_are_reused() {
        let mut index = tight_index();
        for round in 0..3 {
            for i in 0..10 {
                index.insert(key(i), round);
            }
            for i in 0..10 {
                assert!(index.remove(&key(i)));
            }
        }
        assert!(index.nodes.len() <= 10);
        index.check_invariants();
    }

    #[test]
    fn test_resize_triggers_on_load_factor() {
        let mut index = tight_index();
        for i in 0..(4 * MAX_LOAD_FACTOR) as u64 {
            index.insert(key(i), i);
        }
        assert!(!index.is_resizing());
        assert_eq!(index.capacity(), 4);

        index.insert(key(10_000), 0);
        assert!(index.is_resizing());
        assert_eq!(index.capacity(), 8);
        index.check_invariants();

        while index.step_resize() {
            index.check_invariants();
        }
        assert_eq!(index.len(), 4 * MAX_LOAD_FACTOR + 1);
        index.check_invariants();
    }

    #[test]
    fn test_lookup_during_resize_sees_both_tables() {
        let mut index = tight_index();
        let total = (4 * MAX_LOAD_FACTOR + 1) as u64;
        for i in 0..total {
            index.insert(key(i), i);
        }
        assert!(index.is_resizing());

        // every lookup migrates one bucket, so keys are split across both tables
        for i in 0..total {
            assert_eq!(index.lookup(&key(i)), Some(&i), "lost key {}", i);
        }
    }

    #[test]
    fn test_invariants_after_every_operation() {
        let mut index = tight_index();
        let mut model: HashMap<Vec<u8>, u64> = HashMap::new();
        let mut resizes = 0;
        let mut last_capacity = index.capacity();

        for i in 0..3_000u64 {
            let k = key(i % 1_200);
            match i % 7 {
                0 | 3 => {
                    assert_eq!(index.remove(&k), model.remove(&k).is_some());
                }
                5 => {
                    assert_eq!(index.lookup(&k), model.get(&k));
                }
                _ => {
                    assert_eq!(index.insert(k.clone(), i), model.insert(k, i));
                }
            }

            index.check_invariants();
            assert_eq!(index.len(), model.len());

            if index.capacity() != last_capacity {
                resizes += 1;
                last_capacity = index.capacity();
            }
        }

        assert!(resizes >= 3, "only {} resizes happened", resizes);
        for (k, v) in &model {
            assert_eq!(index.lookup(k), Some(v));
        }
    }

    #[test]
    fn test_full_drain_during_resize() {
        let mut index = tight_index();
        for i in 0..100 {
            index.insert(key(i), i);
        }
        for i in 0..100 {
            assert!(index.remove(&key(i)));
            index.check_invariants();
        }
        assert!(index.is_empty());
        assert!(!index.is_resizing());
    }

    #[test]
    fn test_capacity_rounds_to_power_of_two() {
        let index: HashIndex<Vec<u8>, ()> = HashIndex::with_config(IndexConfig {
            initial_capacity: 100,
            resize_work: 0,
        });
        assert_eq!(index.capacity(), 128);
        assert_eq!(index.resize_work, 1);
    }
}
