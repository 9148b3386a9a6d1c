//! Cache Index Module
//!
//! Key to entry mapping, paired with LRU tracking when a capacity is set.

use std::collections::HashMap;
use std::hash::Hash;

use crate::cache::{CacheEntry, LruTracker};

// == Cache Index ==
/// Entry storage with optional LRU eviction.
///
/// Not synchronized itself; the cache keeps it behind one reader/writer lock.
/// Every mutation updates the map and the recency order together.
#[derive(Debug)]
pub struct CacheIndex<K, V> {
    /// Key-entry storage
    entries: HashMap<K, CacheEntry<V>>,
    /// LRU access tracker, present only in bounded mode
    lru: Option<LruTracker<K>>,
    /// Maximum number of entries allowed, 0 = unbounded
    max_entries: usize,
}

impl<K, V> CacheIndex<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates an index; `max_entries == 0` disables capacity and LRU tracking.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: (max_entries > 0).then(LruTracker::new),
            max_entries,
        }
    }

    // == Lookup ==
    pub fn lookup(&self, key: &K) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    /// Mutable lookup restricted to the entry with the given id.
    pub fn lookup_mut(&mut self, key: &K, id: u64) -> Option<&mut CacheEntry<V>> {
        self.entries.get_mut(key).filter(|entry| entry.id() == id)
    }

    // == Insert ==
    /// Stores an entry at the most recently used position.
    ///
    /// An existing entry for the key is replaced. Otherwise, if the index is
    /// at capacity, the least recently used entry is evicted first and
    /// returned to the caller.
    pub fn insert(&mut self, key: K, mut entry: CacheEntry<V>) -> Option<(K, CacheEntry<V>)> {
        let previous = self.entries.remove(&key);
        let evicted = match previous {
            Some(_) => None,
            None if self.is_full() => self.evict_lru(),
            None => None,
        };

        if let Some(lru) = self.lru.as_mut() {
            let stamp = lru.touch(previous.and_then(|old| old.recency()), key.clone());
            entry.set_recency(stamp);
        }
        self.entries.insert(key, entry);

        evicted
    }

    // == Touch ==
    /// Moves the entry to the most recently used position.
    ///
    /// Returns false if the key no longer maps to the entry with `id`.
    pub fn touch(&mut self, key: &K, id: u64) -> bool {
        let Some(entry) = self.entries.get_mut(key).filter(|entry| entry.id() == id) else {
            return false;
        };
        if let Some(lru) = self.lru.as_mut() {
            let stamp = lru.touch(entry.recency(), key.clone());
            entry.set_recency(stamp);
        }
        true
    }

    // == Remove ==
    /// Removes the mapping for `key`. No-op if already absent.
    pub fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.release_recency(&entry);
        Some(entry)
    }

    /// Removes the mapping only if it still holds the entry with `id`.
    pub fn remove_if(&mut self, key: &K, id: u64) -> Option<CacheEntry<V>> {
        if self.entries.get(key).map(CacheEntry::id) != Some(id) {
            return None;
        }
        self.remove(key)
    }

    // == Evict ==
    /// Removes and returns the least recently used entry (bounded mode only).
    pub fn evict_lru(&mut self) -> Option<(K, CacheEntry<V>)> {
        let (_, key) = self.lru.as_mut()?.evict_oldest()?;
        let entry = self.entries.remove(&key)?;
        Some((key, entry))
    }

    fn release_recency(&mut self, entry: &CacheEntry<V>) {
        if let (Some(lru), Some(stamp)) = (self.lru.as_mut(), entry.recency()) {
            lru.remove(stamp);
        }
    }

    // == Introspection ==
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys from most to least recently used in bounded mode; map order otherwise.
    pub fn keys(&self) -> Vec<K> {
        match &self.lru {
            Some(lru) => lru.iter_recent().cloned().collect(),
            None => self.entries.keys().cloned().collect(),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.lru.is_some()
    }

    pub fn is_full(&self) -> bool {
        self.is_bounded() && self.entries.len() >= self.max_entries
    }

    /// Number of keys in the recency order; equals `len()` in bounded mode.
    pub fn recency_len(&self) -> usize {
        self.lru.as_ref().map_or(0, LruTracker::len)
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
