//! Configuration Module
//!
//! Handles loading and validating cache configuration.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// Values can be loaded from environment variables or JSON with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of entries the cache can hold, 0 = unbounded
    pub max_entries: usize,
    /// Interval between refresh/retire decisions, in milliseconds
    pub ttl_ms: u64,
}

impl Config {
    /// Creates a bounded configuration.
    ///
    /// The TTL is rounded up to whole milliseconds, so any positive TTL stays positive.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            max_entries,
            ttl_ms: u64::try_from(ttl.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX),
        }
    }

    /// Creates a configuration with no entry limit.
    pub fn unbounded(ttl: Duration) -> Self {
        Self::new(0, ttl)
    }

    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries, 0 for unbounded (default: 1000)
    /// - `CACHE_TTL_MS` - Refresh interval in milliseconds (default: 30000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_entries),
            ttl_ms: env::var("CACHE_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ttl_ms),
        }
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|err| CacheError::InvalidConfig(err.to_string()))
    }

    /// Rejects configurations the cache cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.ttl_ms == 0 {
            return Err(CacheError::InvalidConfig(
                "ttl must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Refresh interval as a Duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Returns the entry limit, or None when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        (self.max_entries > 0).then_some(self.max_entries)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            ttl_ms: 30_000,
        }
    }
}
