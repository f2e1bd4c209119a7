//! Cache provider trait definition

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::Instant;

use super::key::CacheKey;
use crate::types::Rows;

/// Cached rows together with their freshness window
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub rows: Rows,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(rows: Rows, ttl: Duration) -> Self {
        Self {
            rows,
            created_at: Instant::now(),
            ttl,
        }
    }

    /// Stale once strictly more than `ttl` has elapsed since creation
    pub fn is_stale_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now())
    }

    pub fn ttl_remaining(&self) -> Duration {
        self.ttl
            .saturating_sub(self.created_at.elapsed())
    }
}

/// Cache statistics for metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub invalidations: u64,
    /// Entries dropped to stay within capacity
    pub evictions: u64,
    /// Stale entries removed on access or by the sweep
    pub expirations: u64,
    pub entry_count: u64,
    pub capacity: Option<u64>,
}

impl CacheStats {
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Async result cache
///
/// All operations are async so network-backed stores can implement it.
#[async_trait]
pub trait CacheProvider: Send + Sync + std::fmt::Debug {
    /// Fresh entry for `key`; stale entries are removed and reported as a miss
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Store rows under `key` for `ttl`, replacing any previous entry
    async fn put(&self, key: CacheKey, rows: Rows, ttl: Duration);

    /// Remove one entry; returns whether it was present
    async fn invalidate(&self, key: &CacheKey) -> bool;

    /// Remove every entry whose key string starts with `prefix`
    async fn invalidate_prefix(&self, prefix: &str) -> u64;

    /// Remove everything
    async fn invalidate_all(&self);

    /// Remove stale entries; returns how many were dropped
    async fn purge_expired(&self) -> u64;

    async fn stats(&self) -> CacheStats;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_staleness_boundary() {
        let entry = CacheEntry::new(Arc::from(Vec::new()), Duration::from_secs(300));
        let created = entry.created_at;

        assert!(!entry.is_stale_at(created + Duration::from_secs(300)));
        assert!(entry.is_stale_at(created + Duration::from_secs(300) + Duration::from_millis(1)));

        tokio::time::advance(Duration::from_secs(100)).await;
        assert_eq!(entry.ttl_remaining(), Duration::from_secs(200));
    }

    #[test]
    fn test_hit_ratio() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_ratio() - 0.75).abs() < f64::EPSILON);
        assert!(CacheStats::default().hit_ratio().abs() < f64::EPSILON);
    }
}
