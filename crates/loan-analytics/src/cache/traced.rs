//! Traced cache wrapper for observability

use std::time::Duration;

use async_trait::async_trait;
use tracing::Instrument;

use super::key::CacheKey;
use super::provider::{CacheEntry, CacheProvider, CacheStats};
use crate::types::Rows;

/// Wrapper that adds tracing to any `CacheProvider`
///
/// Spans are debug-level: keys carry parameter values that do not belong in
/// production logs.
#[derive(Debug, Clone)]
pub struct TracedCache<C> {
    inner: C,
    service_name: String,
}

impl<C> TracedCache<C> {
    pub fn new(cache: C, service_name: impl Into<String>) -> Self {
        Self {
            inner: cache,
            service_name: service_name.into(),
        }
    }

    pub const fn inner(&self) -> &C {
        &self.inner
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

#[async_trait]
impl<C: CacheProvider> CacheProvider for TracedCache<C> {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let span = tracing::debug_span!(
            "cache.get",
            service = %self.service_name,
            cache.key = %key,
            cache.domain = key.domain().as_str(),
        );

        let result = self.inner.get(key).instrument(span).await;

        match &result {
            Some(entry) => {
                tracing::debug!(
                    cache.result = "hit",
                    cache.key = %key,
                    cache.rows = entry.rows.len(),
                    cache.ttl_remaining_ms = entry.ttl_remaining().as_millis() as u64,
                );
                #[cfg(feature = "metrics")]
                crate::observability::metrics::record_cache_hit(key.domain().as_str());
            }
            None => {
                tracing::debug!(cache.result = "miss", cache.key = %key);
                #[cfg(feature = "metrics")]
                crate::observability::metrics::record_cache_miss(key.domain().as_str());
            }
        }

        result
    }

    async fn put(&self, key: CacheKey, rows: Rows, ttl: Duration) {
        let span = tracing::debug_span!(
            "cache.put",
            service = %self.service_name,
            cache.key = %key,
            cache.rows = rows.len(),
            cache.ttl_secs = ttl.as_secs(),
        );
        self.inner.put(key, rows, ttl).instrument(span).await;
    }

    async fn invalidate(&self, key: &CacheKey) -> bool {
        let span = tracing::debug_span!("cache.invalidate", cache.key = %key);
        let removed = self.inner.invalidate(key).instrument(span).await;
        tracing::debug!(cache.key = %key, removed, "Cache entry invalidated");
        removed
    }

    async fn invalidate_prefix(&self, prefix: &str) -> u64 {
        let span = tracing::debug_span!("cache.invalidate_prefix", cache.prefix = prefix);
        let removed = self.inner.invalidate_prefix(prefix).instrument(span).await;
        tracing::info!(cache.prefix = prefix, removed, "Cache entries invalidated");
        removed
    }

    async fn invalidate_all(&self) {
        let span = tracing::debug_span!("cache.invalidate_all");
        self.inner.invalidate_all().instrument(span).await;
        tracing::info!("Cache cleared");
    }

    async fn purge_expired(&self) -> u64 {
        let span = tracing::debug_span!("cache.purge_expired");
        let removed = self.inner.purge_expired().instrument(span).await;
        if removed > 0 {
            tracing::debug!(removed, "Purged expired cache entries");
        }
        removed
    }

    async fn stats(&self) -> CacheStats {
        self.inner.stats().await
    }
}
