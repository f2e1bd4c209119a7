//! Result cache for catalog queries
//!
//! Entries are keyed by domain, canonical query name and the canonical
//! parameter encoding, so aliases and equivalent parameter spellings share
//! one entry.
//!
//! # Available Backends
//!
//! - [`NoopCache`] - caching disabled
//! - [`InMemoryCache`] - LRU bounded by entry count, lazy TTL expiry
//!
//! Wrap any cache with [`TracedCache`] to add tracing spans and logging.
//!
//! # Expiry
//!
//! `get` never returns a stale entry. Entries nobody reads again are
//! reclaimed by the sweeper started with [`spawn_sweeper`]; each sweep is a
//! single pass under the cache lock.

mod config;
mod key;
mod memory;
mod noop;
mod provider;
mod traced;

use std::sync::Arc;
use std::time::Duration;

pub use config::{
    CacheBackend, CacheConfig, CacheTtlConfig, DEFAULT_MAX_ENTRIES, DEFAULT_SWEEP_INTERVAL,
    DEFAULT_TTL,
};
pub use key::CacheKey;
pub use memory::InMemoryCache;
pub use noop::NoopCache;
pub use provider::{CacheEntry, CacheProvider, CacheStats};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
pub use traced::TracedCache;

use crate::constants::SERVICE_NAME;

/// Create a cache provider based on configuration
#[must_use]
pub fn create_cache(config: &CacheConfig) -> Arc<dyn CacheProvider> {
    if !config.is_active() {
        return Arc::new(NoopCache::new());
    }

    match config.backend {
        CacheBackend::Noop => Arc::new(NoopCache::new()),
        CacheBackend::Memory => Arc::new(TracedCache::new(
            InMemoryCache::with_max_entries(config.max_entries),
            SERVICE_NAME,
        )),
    }
}

/// Periodically drop stale entries until the returned handle is aborted
pub fn spawn_sweeper(cache: Arc<dyn CacheProvider>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            cache.purge_expired().await;
        }
    })
}
