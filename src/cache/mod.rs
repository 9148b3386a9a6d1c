//! Cache Module
//!
//! Provides an in-memory loading cache with LRU eviction and TTL-driven refresh.

mod entry;
mod index;
mod lru;
mod refresh_cache;


// Re-export public types
pub use entry::{CacheEntry, EntrySnapshot};
pub use index::CacheIndex;
pub use lru::LruTracker;
pub use refresh_cache::RefreshCache;

pub(crate) use refresh_cache::Shared;
