//! Background Tasks Module
//!
//! Contains the background tasks spawned by the cache.
//!
//! # Tasks
//! - Refresh loop: one per cached entry, reloads or retires it every TTL

mod refresh;

pub(crate) use refresh::spawn_refresh_loop;
