//! No-op cache implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::key::CacheKey;
use super::provider::{CacheEntry, CacheProvider, CacheStats};
use crate::types::Rows;

/// Cache that never stores
///
/// Used when caching is disabled; every lookup is a miss.
#[derive(Debug, Clone, Default)]
pub struct NoopCache {
    misses: Arc<AtomicU64>,
}

impl NoopCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheProvider for NoopCache {
    async fn get(&self, _key: &CacheKey) -> Option<CacheEntry> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn put(&self, _key: CacheKey, _rows: Rows, _ttl: Duration) {}

    async fn invalidate(&self, _key: &CacheKey) -> bool {
        false
    }

    async fn invalidate_prefix(&self, _prefix: &str) -> u64 {
        0
    }

    async fn invalidate_all(&self) {}

    async fn purge_expired(&self) -> u64 {
        0
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            misses: self.misses.load(Ordering::Relaxed),
            capacity: Some(0),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryDomain;

    fn key() -> CacheKey {
        CacheKey::new(QueryDomain::Loan, "loan_summary", "")
    }

    #[tokio::test]
    async fn test_noop_never_stores() {
        let cache = NoopCache::new();
        cache.put(key(), Arc::from(Vec::new()), Duration::from_secs(60)).await;
        assert!(cache.get(&key()).await.is_none());
        assert!(!cache.invalidate(&key()).await);
        assert_eq!(cache.invalidate_prefix("loan:").await, 0);
    }

    #[tokio::test]
    async fn test_noop_clone_shares_stats() {
        let cache = NoopCache::new();
        let clone = cache.clone();
        cache.get(&key()).await;
        clone.get(&key()).await;

        let stats = cache.stats().await;
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.entry_count, 0);
    }
}
