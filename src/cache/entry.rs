//! Cache Entry Module
//!
//! Defines an individual cache entry: the loaded value plus its hit flag.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Cache Entry ==
/// A single cached value and its per-key refresh state.
///
/// Owned by the index. The value is only replaced while the index write lock
/// is held, so readers under the shared lock always clone a whole value.
#[derive(Debug)]
pub struct CacheEntry<V> {
    /// Unique identity, never reused across entries of the same key
    id: u64,
    /// Last successfully loaded value
    value: V,
    /// Set by readers, cleared by the refresh loop
    hit: AtomicBool,
    /// Position in the recency order (bounded mode only)
    recency: Option<u64>,
    /// Wall-clock time of the last successful load
    loaded_at: DateTime<Utc>,
    /// Number of successful background refreshes
    refreshes: u64,
}

impl<V: Clone> CacheEntry<V> {
    // == Constructor ==
    /// Creates a fresh entry with the hit flag cleared.
    pub fn new(id: u64, value: V) -> Self {
        Self {
            id,
            value,
            hit: AtomicBool::new(false),
            recency: None,
            loaded_at: Utc::now(),
            refreshes: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn value(&self) -> V {
        self.value.clone()
    }

    // == Hit Flag ==
    /// Records an access since the last refresh tick.
    pub fn mark_hit(&self) {
        self.hit.store(true, Ordering::Release);
    }

    pub fn is_hit(&self) -> bool {
        self.hit.load(Ordering::Acquire)
    }

    /// Clears the hit flag, returning whether it was set.
    pub fn take_hit(&self) -> bool {
        self.hit.swap(false, Ordering::AcqRel)
    }

    // == Refresh ==
    /// Swaps in a freshly loaded value.
    pub fn replace_value(&mut self, value: V) {
        self.value = value;
        self.loaded_at = Utc::now();
        self.refreshes += 1;
    }

    pub fn recency(&self) -> Option<u64> {
        self.recency
    }

    pub fn set_recency(&mut self, stamp: u64) {
        self.recency = Some(stamp);
    }

    /// Copies the entry's observable state without touching it.
    pub fn snapshot(&self) -> EntrySnapshot<V> {
        EntrySnapshot {
            value: self.value.clone(),
            hit: self.is_hit(),
            refreshes: self.refreshes,
            loaded_at: self.loaded_at,
        }
    }
}

// == Entry Snapshot ==
/// Point-in-time view of an entry, returned by `RefreshCache::peek`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySnapshot<V> {
    pub value: V,
    pub hit: bool,
    pub refreshes: u64,
    pub loaded_at: DateTime<Utc>,
}
