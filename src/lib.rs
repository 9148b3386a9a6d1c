//! Refresh Cache - an in-process loading cache
//!
//! Combines bounded LRU eviction with TTL-driven background refresh: entries
//! read since the last tick are reloaded, entries left alone are dropped.

pub mod cache;
pub mod config;
pub mod error;
mod tasks;

pub use cache::{EntrySnapshot, RefreshCache};
pub use config::Config;
pub use error::{CacheError, Result};
