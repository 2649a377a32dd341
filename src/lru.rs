//! Bounded LRU cache.
//!
//! Entries live in a slot arena; recency is an intrusive doubly-linked list
//! of slot indices threaded through the arena, so promoting an entry is a
//! couple of index swaps and eviction reuses the freed slot. A `HashMap`
//! from key to slot index gives O(1) lookup.

use std::collections::HashMap;
use std::hash::Hash;

const NIL: usize = usize::MAX;

struct Entry<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// A fixed-capacity cache evicting the least recently used entry.
///
/// Both [`get`](Self::get) and [`set`](Self::set) mark the entry as most
/// recently used. A capacity of zero stores nothing.
///
/// # Examples
/// ```
/// use route_trie::LruCache;
///
/// let mut cache = LruCache::new(2);
/// cache.set("a", 1);
/// cache.set("b", 2);
/// cache.get(&"a");
/// cache.set("c", 3); // evicts "b", the least recently used
/// assert_eq!(cache.get(&"a"), Some(&1));
/// assert_eq!(cache.get(&"b"), None);
/// assert_eq!(cache.get(&"c"), Some(&3));
/// ```
pub struct LruCache<K, V> {
    capacity: usize,
    map: HashMap<K, usize>,
    entries: Vec<Entry<K, V>>,
    head: usize,
    tail: usize,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        LruCache {
            capacity,
            map: HashMap::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
            head: NIL,
            tail: NIL,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up `key`, promoting the entry to most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.promote(idx);
        Some(&self.entries[idx].value)
    }

    /// Inserts or replaces the value for `key` and marks it most recently
    /// used, evicting the least recently used entry when full.
    pub fn set(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }

        if let Some(&idx) = self.map.get(&key) {
            self.entries[idx].value = value;
            self.promote(idx);
            return;
        }

        if self.entries.len() == self.capacity {
            // reuse the evicted tail slot
            let idx = self.tail;
            self.unlink(idx);

            let entry = &mut self.entries[idx];
            self.map.remove(&entry.key);
            entry.key = key.clone();
            entry.value = value;

            self.map.insert(key, idx);
            self.push_front(idx);
            return;
        }

        let idx = self.entries.len();
        self.entries.push(Entry {
            key: key.clone(),
            value,
            prev: NIL,
            next: NIL,
        });
        self.map.insert(key, idx);
        self.push_front(idx);
    }

    fn promote(&mut self, idx: usize) {
        if self.head != idx {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.entries[idx].prev, self.entries[idx].next);

        match prev {
            NIL => self.head = next,
            p => self.entries[p].next = next,
        }
        match next {
            NIL => self.tail = prev,
            n => self.entries[n].prev = prev,
        }
    }

    fn push_front(&mut self, idx: usize) {
        self.entries[idx].prev = NIL;
        self.entries[idx].next = self.head;

        match self.head {
            NIL => self.tail = idx,
            h => self.entries[h].prev = idx,
        }
        self.head = idx;
    }
}
