//! Refresh Cache demo
//!
//! Drives a cache with a slow loader under a skewed workload for a few TTL
//! periods, then prints the entries that survived as JSON.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use refresh_cache::{Config, RefreshCache};

/// Keys requested on every round.
const HOT_KEYS: u64 = 4;
/// Size of the cold key space, each visited once in a while.
const COLD_KEYS: u64 = 64;
/// Rounds per TTL period.
const ROUNDS_PER_TTL: u32 = 4;
/// TTL periods to run for.
const PERIODS: u32 = 3;

/// Main entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the cache around a simulated slow loader
/// 4. Run the workload, then dump surviving entries
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refresh_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_entries={}, ttl={}ms",
        config.max_entries, config.ttl_ms
    );

    let started = Instant::now();
    let cache = RefreshCache::new(config.clone(), move |key: u64| async move {
        // Stand-in for an expensive computation or remote call
        tokio::time::sleep(Duration::from_millis(20)).await;
        if key % 17 == 16 {
            anyhow::bail!("no value for key {key}");
        }
        Ok(format!("{key}@{}ms", started.elapsed().as_millis()))
    })
    .context("building cache")?;

    let round = config.ttl() / ROUNDS_PER_TTL;
    let mut failures = 0usize;
    for step in 0..(ROUNDS_PER_TTL * PERIODS) as u64 {
        for key in 0..HOT_KEYS {
            cache.get(&key).await?;
        }
        let cold = HOT_KEYS + (step * step * 7) % COLD_KEYS;
        if cache.get(&cold).await.is_err() {
            failures += 1;
        }
        let entries = cache.len().await;
        info!(step, entries, "Round complete");
        tokio::time::sleep(round).await;
    }

    let mut survivors = BTreeMap::new();
    for key in cache.keys().await {
        if let Some(snapshot) = cache.peek(&key).await {
            survivors.insert(key, snapshot);
        }
    }
    info!(failures, survivors = survivors.len(), "Workload finished");

    println!("{}", serde_json::to_string_pretty(&survivors)?);
    Ok(())
}
