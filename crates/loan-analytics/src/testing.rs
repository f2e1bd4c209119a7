//! Test doubles for the warehouse and the cache

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::cache::{CacheEntry, CacheKey, CacheProvider, CacheStats, InMemoryCache};
use crate::config::WarehouseConfig;
use crate::types::{ColumnMeta, ResultSet, Row, Rows, Value};
use crate::warehouse::{BoundParam, WarehouseClient, WarehouseTarget};
use crate::{Error, Result};

pub fn test_warehouse_config() -> WarehouseConfig {
    WarehouseConfig::new(
        Url::parse("https://adb-test.azuredatabricks.net").unwrap(),
        "test-warehouse",
        "dapi-test",
    )
}

/// Build a result set from `(name, warehouse type)` pairs and row values
pub fn result_set(columns: &[(&str, &str)], rows: Vec<Vec<Value>>) -> ResultSet {
    let columns: Vec<ColumnMeta> = columns
        .iter()
        .map(|(name, type_name)| ColumnMeta::new(*name, *type_name))
        .collect();
    let rows = rows
        .into_iter()
        .map(|values| {
            columns
                .iter()
                .map(|c| c.name.clone())
                .zip(values)
                .collect::<Row>()
        })
        .collect();
    ResultSet { columns, rows }
}

/// What `loan_status_distribution` returns from a real warehouse
pub fn loan_status_result() -> ResultSet {
    result_set(
        &[
            ("loan_status", "STRING"),
            ("count", "BIGINT"),
            ("avg_amount", "DOUBLE"),
            ("total_amount", "DOUBLE"),
            ("percentage", "DECIMAL(5,2)"),
        ],
        vec![
            vec![
                Value::Text("Fully Paid".into()),
                Value::Int(700),
                Value::Float(12_500.0),
                Value::Float(8_750_000.0),
                Value::Float(70.0),
            ],
            vec![
                Value::Text("Charged Off".into()),
                Value::Int(300),
                Value::Float(14_000.0),
                Value::Float(4_200_000.0),
                Value::Float(30.0),
            ],
        ],
    )
}

#[derive(Debug)]
pub struct ScriptedSession {
    pub id: usize,
}

/// Warehouse double with scripted failures and call counters
#[derive(Debug, Default)]
pub struct ScriptedWarehouse {
    pub connects: AtomicUsize,
    pub executes: AtomicUsize,
    pub closes: AtomicUsize,
    connect_failures: AtomicUsize,
    unhealthy: AtomicBool,
    connect_delay: Duration,
    execute_delay: Duration,
    script: Mutex<VecDeque<Result<ResultSet>>>,
    response: Mutex<ResultSet>,
    statements: Mutex<Vec<(String, Vec<BoundParam>)>>,
}

impl ScriptedWarehouse {
    #[must_use]
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = delay;
        self
    }

    /// Result returned once the script is exhausted
    #[must_use]
    pub fn responding_with(self, result: ResultSet) -> Self {
        *self.response.lock() = result;
        self
    }

    pub fn fail_connects(&self, count: usize) {
        self.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Queue `count` transient failures ahead of the normal response
    pub fn fail_executes(&self, count: usize) {
        let mut script = self.script.lock();
        for n in 0..count {
            script.push_back(Err(Error::Connection(format!("scripted failure {}", n + 1))));
        }
    }

    pub fn push_error(&self, error: Error) {
        self.script.lock().push_back(Err(error));
    }

    pub fn push_result(&self, result: ResultSet) {
        self.script.lock().push_back(Ok(result));
    }

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    pub fn execute_count(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> Vec<(String, Vec<BoundParam>)> {
        self.statements.lock().clone()
    }
}

#[async_trait]
impl WarehouseClient for ScriptedWarehouse {
    type Handle = ScriptedSession;

    async fn connect(&self, _target: &WarehouseTarget) -> Result<Self::Handle> {
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        let id = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        let remaining = self.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.connect_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Connection("connection refused".into()));
        }
        Ok(ScriptedSession { id })
    }

    async fn execute_query(
        &self,
        _handle: &Self::Handle,
        sql: &str,
        params: &[BoundParam],
    ) -> Result<ResultSet> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        self.statements
            .lock()
            .push((sql.to_string(), params.to_vec()));
        if !self.execute_delay.is_zero() {
            tokio::time::sleep(self.execute_delay).await;
        }
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(self.response.lock().clone()))
    }

    async fn ping(&self, _handle: &Self::Handle) -> Result<()> {
        if self.unhealthy.load(Ordering::SeqCst) {
            Err(Error::Connection("warehouse stopped".into()))
        } else {
            Ok(())
        }
    }

    async fn close(&self, _handle: &Self::Handle) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory cache that counts every call made to it
#[derive(Debug, Default)]
pub struct CountingCache {
    inner: InMemoryCache,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub invalidations: AtomicUsize,
}

impl CountingCache {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
            + self.puts.load(Ordering::SeqCst)
            + self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheProvider for CountingCache {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(&self, key: CacheKey, rows: Rows, ttl: Duration) {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, rows, ttl).await;
    }

    async fn invalidate(&self, key: &CacheKey) -> bool {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate(key).await
    }

    async fn invalidate_prefix(&self, prefix: &str) -> u64 {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate_prefix(prefix).await
    }

    async fn invalidate_all(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate_all().await;
    }

    async fn purge_expired(&self) -> u64 {
        self.inner.purge_expired().await
    }

    async fn stats(&self) -> CacheStats {
        self.inner.stats().await
    }
}
