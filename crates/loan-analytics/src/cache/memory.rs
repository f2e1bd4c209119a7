//! In-memory LRU cache with TTL support

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::config::DEFAULT_MAX_ENTRIES;
use super::key::CacheKey;
use super::provider::{CacheEntry, CacheProvider, CacheStats};
use crate::types::Rows;

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// Thread-safe in-memory cache bounded by entry count
///
/// One mutex guards the LRU map; every operation holds it for a single
/// lookup or a single pass over the map. Counters are atomics updated after
/// the lock is released.
///
/// Expiry is lazy: `get` drops a stale entry it finds. [`Self::purge_expired`]
/// (driven by the background sweeper) reclaims entries nobody reads.
#[derive(Clone)]
pub struct InMemoryCache {
    store: Arc<Mutex<LruCache<CacheKey, CacheEntry>>>,
    counters: Arc<Counters>,
    capacity: NonZeroUsize,
}

impl std::fmt::Debug for InMemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCache")
            .field("capacity", &self.capacity)
            .field("entry_count", &self.store.lock().len())
            .finish_non_exhaustive()
    }
}

impl InMemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    #[must_use]
    pub fn with_max_entries(capacity: NonZeroUsize) -> Self {
        Self {
            store: Arc::new(Mutex::new(LruCache::new(capacity))),
            counters: Arc::new(Counters::default()),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// Whether `key` is present, without touching recency or counters
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.store.lock().contains(key)
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheProvider for InMemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = Instant::now();
        let mut store = self.store.lock();
        let lookup = store
            .get(key)
            .map(|entry| (!entry.is_stale_at(now)).then(|| entry.clone()));

        match lookup {
            Some(Some(entry)) => {
                drop(store);
                Counters::bump(&self.counters.hits, 1);
                Some(entry)
            }
            Some(None) => {
                store.pop(key);
                drop(store);
                Counters::bump(&self.counters.expirations, 1);
                Counters::bump(&self.counters.misses, 1);
                None
            }
            None => {
                drop(store);
                Counters::bump(&self.counters.misses, 1);
                None
            }
        }
    }

    async fn put(&self, key: CacheKey, rows: Rows, ttl: Duration) {
        let entry = CacheEntry::new(rows, ttl);
        let displaced = self.store.lock().push(key.clone(), entry);

        Counters::bump(&self.counters.puts, 1);
        if let Some((evicted, _)) = displaced
            && evicted != key
        {
            tracing::debug!(cache.key = %evicted, "Evicted least recently used entry");
            Counters::bump(&self.counters.evictions, 1);
            #[cfg(feature = "metrics")]
            crate::observability::metrics::record_cache_evictions(1);
        }
    }

    async fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.store.lock().pop(key).is_some();
        if removed {
            Counters::bump(&self.counters.invalidations, 1);
        }
        removed
    }

    async fn invalidate_prefix(&self, prefix: &str) -> u64 {
        let mut store = self.store.lock();
        let doomed: Vec<CacheKey> = store
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            store.pop(key);
        }
        drop(store);

        let removed = doomed.len() as u64;
        Counters::bump(&self.counters.invalidations, removed);
        removed
    }

    async fn invalidate_all(&self) {
        let mut store = self.store.lock();
        let removed = store.len() as u64;
        store.clear();
        drop(store);
        Counters::bump(&self.counters.invalidations, removed);
    }

    async fn purge_expired(&self) -> u64 {
        let now = Instant::now();
        let mut store = self.store.lock();
        let stale: Vec<CacheKey> = store
            .iter()
            .filter(|(_, entry)| entry.is_stale_at(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            store.pop(key);
        }
        drop(store);

        let removed = stale.len() as u64;
        Counters::bump(&self.counters.expirations, removed);
        removed
    }

    async fn stats(&self) -> CacheStats {
        let entry_count = self.store.lock().len() as u64;
        let c = &self.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            puts: c.puts.load(Ordering::Relaxed),
            invalidations: c.invalidations.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            expirations: c.expirations.load(Ordering::Relaxed),
            entry_count,
            capacity: Some(self.capacity.get() as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryDomain;
    use crate::types::{Row, Value};

    fn key(n: usize) -> CacheKey {
        CacheKey::new(QueryDomain::Loan, "q", format!("limit=i:{n}"))
    }

    fn rows(n: i64) -> Rows {
        let mut row = Row::new();
        row.insert("n".into(), Value::Int(n));
        Arc::from(vec![row])
    }

    const TTL: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn test_basic_put_get() {
        let cache = InMemoryCache::new();
        cache.put(key(1), rows(1), TTL).await;

        let entry = cache.get(&key(1)).await.unwrap();
        assert_eq!(entry.rows[0]["n"], Value::Int(1));
        assert_eq!(entry.ttl, TTL);

        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses, stats.puts), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let cache = InMemoryCache::new();
        assert!(cache.get(&key(1)).await.is_none());
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_hit_shares_rows() {
        let cache = InMemoryCache::new();
        let stored = rows(7);
        cache.put(key(1), Arc::clone(&stored), TTL).await;
        let entry = cache.get(&key(1)).await.unwrap();
        assert!(Arc::ptr_eq(&stored, &entry.rows));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_removed_on_get() {
        let cache = InMemoryCache::new();
        cache.put(key(1), rows(1), TTL).await;

        tokio::time::advance(TTL).await;
        assert!(cache.get(&key(1)).await.is_some(), "fresh at exactly ttl");

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get(&key(1)).await.is_none());
        assert!(!cache.contains(&key(1)));

        let stats = cache.stats().await;
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.entry_count, 0);
    }

    #[tokio::test]
    async fn test_capacity_plus_one_evicts_lru() {
        let cache = InMemoryCache::with_max_entries(NonZeroUsize::new(3).unwrap());
        for n in 0..3 {
            cache.put(key(n), rows(n as i64), TTL).await;
        }
        // touch 0 so 1 becomes least recently used
        cache.get(&key(0)).await.unwrap();
        cache.put(key(3), rows(3), TTL).await;

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&key(1)));
        assert!(cache.contains(&key(0)));
        assert!(cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn test_replacing_key_is_not_eviction() {
        let cache = InMemoryCache::with_max_entries(NonZeroUsize::new(1).unwrap());
        cache.put(key(1), rows(1), TTL).await;
        cache.put(key(1), rows(2), TTL).await;

        assert_eq!(cache.stats().await.evictions, 0);
        assert_eq!(cache.get(&key(1)).await.unwrap().rows[0]["n"], Value::Int(2));
    }

    #[tokio::test]
    async fn test_invalidate_absent_is_noop() {
        let cache = InMemoryCache::new();
        cache.put(key(1), rows(1), TTL).await;

        assert!(!cache.invalidate(&key(2)).await);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().await.invalidations, 0);

        assert!(cache.invalidate(&key(1)).await);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_prefix_by_domain() {
        let cache = InMemoryCache::new();
        cache.put(key(1), rows(1), TTL).await;
        cache.put(key(2), rows(2), TTL).await;
        let other = CacheKey::new(QueryDomain::Accounting, "q", "");
        cache.put(other.clone(), rows(3), TTL).await;

        let removed = cache
            .invalidate_prefix(&CacheKey::domain_prefix(QueryDomain::Loan))
            .await;

        assert_eq!(removed, 2);
        assert!(cache.contains(&other));
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache = InMemoryCache::new();
        cache.put(key(1), rows(1), TTL).await;
        cache.put(key(2), rows(2), TTL).await;
        cache.invalidate_all().await;
        assert!(cache.is_empty());
        assert_eq!(cache.stats().await.invalidations, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_keeps_fresh() {
        let cache = InMemoryCache::new();
        cache.put(key(1), rows(1), Duration::from_secs(10)).await;
        cache.put(key(2), rows(2), Duration::from_secs(60)).await;

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.purge_expired().await, 1);
        assert!(!cache.contains(&key(1)));
        assert!(cache.contains(&key(2)));
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let cache = InMemoryCache::with_max_entries(NonZeroUsize::new(64).unwrap());
        let mut handles = vec![];

        for i in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for j in 0..50 {
                    let k = key(i * 100 + j);
                    cache.put(k.clone(), rows(j as i64), TTL).await;
                    let _ = cache.get(&k).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(cache.len() <= 64);
        assert_eq!(cache.stats().await.puts, 400);
    }
}
