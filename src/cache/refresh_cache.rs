//! Refresh Cache Module
//!
//! The public cache handle. Composes the index, per-key refresh loops, and
//! single-flight load coordination around a caller-supplied async loader.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

use crate::cache::{CacheEntry, CacheIndex, EntrySnapshot};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::tasks::spawn_refresh_loop;

type LoadFuture<V> = Pin<Box<dyn Future<Output = anyhow::Result<V>> + Send>>;

type LoaderFn<K, V> = dyn Fn(K) -> LoadFuture<V> + Send + Sync;

/// `None` until the in-flight load settles.
type LoadOutcome<V> = Option<Result<V>>;

// == Cache State ==
/// Everything guarded by the cache's single reader/writer lock.
pub(crate) struct CacheState<K, V> {
    pub(crate) index: CacheIndex<K, V>,
    /// Loads in flight, keyed by the missing key
    pending: HashMap<K, watch::Receiver<LoadOutcome<V>>>,
}

// == Shared ==
/// State shared by every cache handle, load driver, and refresh loop.
pub(crate) struct Shared<K, V> {
    config: Config,
    loader: Box<LoaderFn<K, V>>,
    pub(crate) state: RwLock<CacheState<K, V>>,
    next_id: AtomicU64,
}

enum Miss<V> {
    /// Another caller's load committed while this one waited for the lock
    Hit(V),
    Wait(watch::Receiver<LoadOutcome<V>>),
}

impl<K, V> Shared<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Runs the loader for `key` in its own task so a panic surfaces as an error.
    pub(crate) async fn load(&self, key: &K) -> Result<V> {
        match tokio::spawn((self.loader)(key.clone())).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(CacheError::from(err)),
            Err(join_err) => Err(CacheError::LoadPanicked(join_err.to_string())),
        }
    }

    /// Reads an entry as an access: sets its hit flag and refreshes its recency.
    async fn lookup_hit(&self, key: &K) -> Option<V> {
        let (id, value) = {
            let state = self.state.read().await;
            let entry = state.index.lookup(key)?;
            entry.mark_hit();
            (entry.id(), entry.value())
        };

        if self.config.capacity().is_some() {
            self.state.write().await.index.touch(key, id);
        }
        Some(value)
    }

    /// Joins the in-flight load for `key`, starting one if there is none.
    async fn begin_load(self: &Arc<Self>, key: &K) -> Miss<V> {
        let mut state = self.state.write().await;

        if let Some(entry) = state.index.lookup(key) {
            entry.mark_hit();
            let (id, value) = (entry.id(), entry.value());
            state.index.touch(key, id);
            return Miss::Hit(value);
        }

        if let Some(receiver) = state.pending.get(key) {
            debug!(?key, "Joining in-flight load");
            return Miss::Wait(receiver.clone());
        }

        let (sender, receiver) = watch::channel(None);
        state.pending.insert(key.clone(), receiver.clone());
        drop(state);

        debug!(?key, "Cache miss, loading");
        let shared = Arc::clone(self);
        let key = key.clone();
        tokio::spawn(async move {
            let outcome = shared.load(&key).await;
            let outcome = shared.commit(key, outcome).await;
            sender.send_replace(Some(outcome));
        });

        Miss::Wait(receiver)
    }

    /// Publishes a finished load: clears the pending marker and, on success,
    /// inserts a new entry and starts its refresh loop.
    async fn commit(self: &Arc<Self>, key: K, outcome: Result<V>) -> Result<V> {
        let mut state = self.state.write().await;
        state.pending.remove(&key);
        let value = outcome?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let evicted = state
            .index
            .insert(key.clone(), CacheEntry::new(id, value.clone()));
        drop(state);

        if let Some((evicted_key, evicted)) = evicted {
            info!(key = ?evicted_key, entry_id = evicted.id(), "Evicted least recently used entry");
        }

        spawn_refresh_loop(Arc::downgrade(self), key, id, self.config.ttl());
        Ok(value)
    }
}

// == Refresh Cache ==
/// Loading cache with LRU eviction and TTL-driven background refresh.
///
/// Each cached key has one background loop. Every TTL it reloads the value
/// if the key was read since the previous tick, and drops the entry if it
/// was not. Handles are cheap to clone; background loops stop once the last
/// handle is dropped.
pub struct RefreshCache<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for RefreshCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> RefreshCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache backed by `loader`.
    ///
    /// Fails with `CacheError::InvalidConfig` if the TTL is zero.
    pub fn new<F, Fut>(config: Config, loader: F) -> Result<Self>
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        config.validate()?;

        let loader: Box<LoaderFn<K, V>> = Box::new(move |key| Box::pin(loader(key)));
        let shared = Shared {
            state: RwLock::new(CacheState {
                index: CacheIndex::new(config.max_entries),
                pending: HashMap::new(),
            }),
            config,
            loader,
            next_id: AtomicU64::new(0),
        };

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    // == Get ==
    /// Returns the cached value for `key`, loading it on a miss.
    ///
    /// Concurrent misses on the same key share one loader call. A loader
    /// error is returned as is and nothing is cached, so the next call retries.
    pub async fn get(&self, key: &K) -> Result<V> {
        if let Some(value) = self.shared.lookup_hit(key).await {
            debug!(?key, "Cache hit");
            return Ok(value);
        }

        let mut receiver = match self.shared.begin_load(key).await {
            Miss::Hit(value) => return Ok(value),
            Miss::Wait(receiver) => receiver,
        };

        let result = match receiver.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone().unwrap_or_else(|| {
                Err(CacheError::LoadPanicked("load settled without a result".to_string()))
            }),
            Err(_) => Err(CacheError::LoadPanicked(
                "load stopped before completing".to_string(),
            )),
        };
        result
    }

    // == Inspection ==
    /// Returns a copy of the entry's state without counting as an access.
    pub async fn peek(&self, key: &K) -> Option<EntrySnapshot<V>> {
        let state = self.shared.state.read().await;
        state.index.lookup(key).map(CacheEntry::snapshot)
    }

    pub async fn contains(&self, key: &K) -> bool {
        self.shared.state.read().await.index.contains(key)
    }

    /// Cached keys, most recently used first when bounded.
    pub async fn keys(&self) -> Vec<K> {
        self.shared.state.read().await.index.keys()
    }

    pub async fn len(&self) -> usize {
        self.shared.state.read().await.index.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shared.state.read().await.index.is_empty()
    }

    pub fn is_bounded(&self) -> bool {
        self.shared.config.capacity().is_some()
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tokio::task::JoinSet;
    use tokio_test::{assert_err, assert_ok};

    const TTL: Duration = Duration::from_millis(100);

    fn counting_cache(max_entries: usize) -> (RefreshCache<u64, u64>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = RefreshCache::new(Config::new(max_entries, TTL), move |key: u64| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(key * 10)
            }
        })
        .unwrap();
        (cache, calls)
    }

    #[test]
    fn test_new_rejects_zero_ttl() {
        let result = RefreshCache::new(Config::new(2, Duration::ZERO), |key: u64| async move {
            Ok(key)
        });
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_then_hit() {
        let (cache, calls) = counting_cache(10);

        assert_eq!(assert_ok!(cache.get(&4).await), 40);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!cache.peek(&4).await.unwrap().hit);

        assert_eq!(assert_ok!(cache.get(&4).await), 40);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.peek(&4).await.unwrap().hit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peek_is_not_an_access() {
        let (cache, _calls) = counting_cache(2);

        cache.get(&1).await.unwrap();
        cache.get(&2).await.unwrap();
        cache.peek(&1).await.unwrap();

        // 1 is still the LRU victim
        cache.get(&3).await.unwrap();
        assert!(!cache.contains(&1).await);
        assert!(!cache.peek(&2).await.unwrap().hit);
        assert_eq!(cache.keys().await, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_loader_error_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = RefreshCache::new(Config::unbounded(TTL), move |key: u64| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    anyhow::bail!("backend unavailable for {key}");
                }
                Ok(key)
            }
        })
        .unwrap();

        let err = assert_err!(cache.get(&9).await);
        assert_eq!(err.to_string(), "backend unavailable for 9");
        assert!(cache.is_empty().await);

        assert_eq!(assert_ok!(cache.get(&9).await), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_loader_panic_is_reported() {
        let cache = RefreshCache::new(Config::unbounded(TTL), |key: u64| async move {
            if key == 13 {
                panic!("unlucky key");
            }
            Ok(key)
        })
        .unwrap();

        let err = assert_err!(cache.get(&13).await);
        assert!(matches!(err, CacheError::LoadPanicked(_)));
        assert!(!cache.contains(&13).await);

        // The pending marker is cleared, so other loads still work
        assert_eq!(assert_ok!(cache.get(&1).await), 1);
        assert!(matches!(cache.get(&13).await, Err(CacheError::LoadPanicked(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = RefreshCache::new(Config::new(10, TTL), move |key: u64| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(key * 10)
            }
        })
        .unwrap();

        let mut tasks = JoinSet::new();
        for _ in 0..16 {
            let cache = cache.clone();
            tasks.spawn(async move { cache.get(&5).await });
        }
        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.unwrap().unwrap(), 50);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);

        // One entry means one refresh loop: a single hit yields a single reload
        cache.get(&5).await.unwrap();
        tokio::time::sleep(TTL + Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_get_does_not_strand_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = RefreshCache::new(Config::new(10, TTL), move |key: u64| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(key * 10)
            }
        })
        .unwrap();

        let first = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(&2).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());

        // The load started by the cancelled caller still completes and is shared
        assert_eq!(assert_ok!(cache.get(&2).await), 20);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&2).await);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache: RefreshCache<u64, u64> =
            RefreshCache::new(Config::unbounded(TTL), move |_key: u64| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    Err(anyhow::anyhow!("nope"))
                }
            })
            .unwrap();

        let (first, second) = tokio::join!(cache.get(&1), cache.get(&1));

        assert_eq!(assert_err!(first).to_string(), "nope");
        assert_eq!(assert_err!(second).to_string(), "nope");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_cache_releases_entries() {
        let probe = Arc::new(());
        let loader_probe = Arc::clone(&probe);
        let cache = RefreshCache::new(Config::unbounded(TTL), move |_key: u64| {
            let value = Arc::clone(&loader_probe);
            async move { Ok(value) }
        })
        .unwrap();

        cache.get(&1).await.unwrap();
        cache.get(&2).await.unwrap();
        drop(cache);

        // Loops notice the cache is gone at their next tick
        tokio::time::sleep(TTL + Duration::from_millis(10)).await;
        assert_eq!(Arc::strong_count(&probe), 1);
    }
}
