//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use std::collections::BTreeMap;

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Every touch hands out a strictly increasing stamp; the stamp is the
/// handle the owner keeps to move or remove its key later.
/// - Lowest stamp = least recently used
/// - Highest stamp = most recently used
#[derive(Debug)]
pub struct LruTracker<K> {
    /// Keys ordered by access stamp
    order: BTreeMap<u64, K>,
    /// Next stamp to hand out
    next_stamp: u64,
}

impl<K> Default for LruTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> LruTracker<K> {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            next_stamp: 0,
        }
    }

    // == Touch ==
    /// Marks a key as most recently used.
    ///
    /// If `previous` is the key's current handle it is released first.
    /// Returns the key's new handle.
    pub fn touch(&mut self, previous: Option<u64>, key: K) -> u64 {
        if let Some(stamp) = previous {
            self.order.remove(&stamp);
        }
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.order.insert(stamp, key);
        stamp
    }

    // == Remove ==
    /// Removes the key held under `stamp`. No-op if already gone.
    pub fn remove(&mut self, stamp: u64) -> Option<K> {
        self.order.remove(&stamp)
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key with its handle.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<(u64, K)> {
        self.order.pop_first()
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    #[allow(dead_code)]
    pub fn peek_oldest(&self) -> Option<&K> {
        self.order.first_key_value().map(|(_, key)| key)
    }

    /// Keys from most to least recently used.
    pub fn iter_recent(&self) -> impl Iterator<Item = &K> {
        self.order.values().rev()
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Checks if a handle is still live.
    #[allow(dead_code)]
    pub fn contains(&self, stamp: u64) -> bool {
        self.order.contains_key(&stamp)
    }
}
