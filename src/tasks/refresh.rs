//! Refresh Loop Task
//!
//! One background task per cached entry. Every TTL it either reloads the
//! entry (it was read since the last tick) or retires it (it was not).

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Weak;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::Shared;
use crate::error::CacheError;

/// Result of one refresh tick.
#[derive(Debug)]
enum Tick {
    /// Value reloaded; keep looping
    Refreshed,
    /// The key no longer maps to this loop's entry (evicted or replaced)
    Vanished,
    /// No access since the previous tick
    Idle,
    /// Reload failed; the entry was removed
    Failed(CacheError),
}

/// Spawns the refresh loop for the entry `entry_id` stored under `key`.
///
/// The loop holds only a weak reference to the cache, so it never keeps a
/// dropped cache alive. It ends when the entry is retired, evicted, or
/// replaced, or when the cache itself is gone.
pub(crate) fn spawn_refresh_loop<K, V>(
    cache: Weak<Shared<K, V>>,
    key: K,
    entry_id: u64,
    ttl: Duration,
) where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        debug!(?key, entry_id, "Refresh loop started");

        loop {
            tokio::time::sleep(ttl).await;

            let Some(shared) = cache.upgrade() else {
                debug!(?key, entry_id, "Cache dropped, refresh loop exiting");
                return;
            };

            match tick(&shared, &key, entry_id).await {
                Tick::Refreshed => debug!(?key, entry_id, "Entry refreshed"),
                Tick::Vanished => {
                    debug!(?key, entry_id, "Entry gone, refresh loop exiting");
                    return;
                }
                Tick::Idle => {
                    info!(?key, entry_id, "Retired idle entry");
                    return;
                }
                Tick::Failed(err) => {
                    warn!(?key, entry_id, error = %err, "Refresh failed, entry retired");
                    return;
                }
            }
        }
    });
}

async fn tick<K, V>(shared: &Shared<K, V>, key: &K, entry_id: u64) -> Tick
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // Decide and retire under one write lock so an idle entry cannot be
    // observed half-removed.
    {
        let mut state = shared.state.write().await;
        let Some(entry) = state.index.lookup(key).filter(|entry| entry.id() == entry_id) else {
            return Tick::Vanished;
        };
        if !entry.take_hit() {
            state.index.remove_if(key, entry_id);
            return Tick::Idle;
        }
    }

    // The loader runs without the lock held.
    let reloaded = shared.load(key).await;

    let mut state = shared.state.write().await;
    match reloaded {
        Ok(value) => match state.index.lookup_mut(key, entry_id) {
            Some(entry) => {
                entry.replace_value(value);
                Tick::Refreshed
            }
            None => Tick::Vanished,
        },
        Err(err) => {
            state.index.remove_if(key, entry_id);
            Tick::Failed(err)
        }
    }
}
