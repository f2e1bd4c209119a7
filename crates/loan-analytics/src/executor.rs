//! Query executor: catalog lookup, binding, caching and retried execution

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{Instant, timeout};

use crate::cache::{CacheKey, CacheProvider, CacheStats, CacheTtlConfig, create_cache};
use crate::config::Config;
use crate::constants::{HEALTH_CHECK_QUERY, STATUS_OK, STATUS_UNHEALTHY};
use crate::query::{QueryCatalog, QueryDefinition, QueryDomain, QueryInfo, RawParams, bind};
use crate::retry::{RetryFailure, RetryPolicy, retry_transient};
use crate::types::{ResultSet, Rows};
use crate::validation::validate_read_only_sql;
use crate::warehouse::{BoundParam, ConnectionProvider, WarehouseClient};
use crate::{Error, Result};

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Name reported for ad-hoc statements in errors, logs and metrics
pub const CUSTOM_QUERY_NAME: &str = "custom_sql";

/// Rows of one catalog query and where they came from
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// Canonical query name, even when called through an alias
    pub query: String,
    pub rows: Rows,
    pub cached: bool,
}

/// What `execute` would send, without sending it
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub query: String,
    pub domain: QueryDomain,
    pub description: String,
    /// Template with parameters inlined as escaped literals
    pub sql: String,
    pub parameters: Vec<BoundParam>,
    pub cache_key: String,
    pub ttl_secs: u64,
}

/// Result of [`QueryExecutor::ping`]
#[derive(Debug, Clone, Serialize)]
pub struct PingReport {
    pub status: &'static str,
    pub healthy: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Entry point for the presentation layer
///
/// Owns the catalog and shares the connection provider and cache through
/// `Arc`, so one executor serves any number of concurrent callers.
#[derive(Debug)]
pub struct QueryExecutor<W: WarehouseClient> {
    catalog: Arc<QueryCatalog>,
    provider: Arc<ConnectionProvider<W>>,
    cache: Arc<dyn CacheProvider>,
    ttl: CacheTtlConfig,
    retry: RetryPolicy,
    query_timeout: Duration,
}

impl<W: WarehouseClient> QueryExecutor<W> {
    pub fn new(
        catalog: Arc<QueryCatalog>,
        provider: Arc<ConnectionProvider<W>>,
        cache: Arc<dyn CacheProvider>,
    ) -> Self {
        Self {
            catalog,
            provider,
            cache,
            ttl: CacheTtlConfig::default(),
            retry: RetryPolicy::default(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Wire the built-in catalog, provider and cache from configuration
    pub fn from_config(client: W, config: &Config) -> Result<Self> {
        let catalog = QueryCatalog::builtin(&config.tables)?;
        let ttl = canonical_ttl(&catalog, &config.cache.ttl)?;
        let provider = ConnectionProvider::new(client, config.warehouse.clone())
            .with_max_age(config.execution.connection_max_age);
        let cache = create_cache(&config.cache);

        tracing::info!(
            queries = catalog.len(),
            cache_enabled = config.cache.is_active(),
            cache_capacity = config.cache.max_entries.get(),
            "Query executor ready"
        );

        Ok(Self::new(Arc::new(catalog), Arc::new(provider), cache)
            .with_ttl(ttl)
            .with_retry(config.execution.retry)
            .with_query_timeout(config.execution.query_timeout))
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: CacheTtlConfig) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    pub fn catalog(&self) -> &QueryCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &Arc<dyn CacheProvider> {
        &self.cache
    }

    pub fn provider(&self) -> &ConnectionProvider<W> {
        &self.provider
    }

    /// Rows of a catalog query, from cache when fresh
    pub async fn execute(&self, name: &str, raw: &RawParams) -> Result<Rows> {
        self.run(name, raw).await.map(|outcome| outcome.rows)
    }

    /// Like [`Self::execute`], also reporting whether the cache answered
    ///
    /// Lookup and binding failures return before the cache or the warehouse
    /// is touched.
    pub async fn run(&self, name: &str, raw: &RawParams) -> Result<QueryOutcome> {
        let started = Instant::now();
        let definition = self.catalog.lookup(name)?;
        let params = bind(&definition, raw)?;
        let key = CacheKey::for_query(&definition, &params);

        if let Some(entry) = self.cache.get(&key).await {
            tracing::debug!(query = definition.name(), rows = entry.rows.len(), "Served from cache");
            #[cfg(feature = "metrics")]
            crate::observability::metrics::record_query(
                definition.name(),
                started.elapsed(),
                entry.rows.len() as u64,
                true,
            );
            return Ok(QueryOutcome {
                query: definition.name().to_string(),
                rows: entry.rows,
                cached: true,
            });
        }

        let bound = params.bound_params();
        let result = self
            .run_with_retry(definition.name(), definition.template(), &bound)
            .await
            .and_then(|result| check_schema(&definition, &result).map(|()| result));

        let result = match result {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(query = definition.name(), kind = %error.kind(), error = %error, "Query failed");
                #[cfg(feature = "metrics")]
                crate::observability::metrics::record_query_error(
                    definition.name(),
                    error.kind().as_str(),
                );
                return Err(error);
            }
        };

        let rows: Rows = result.rows.into();
        let ttl = self.ttl.ttl_for(&definition);
        self.cache.put(key, Arc::clone(&rows), ttl).await;

        tracing::info!(
            query = definition.name(),
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query executed"
        );
        #[cfg(feature = "metrics")]
        crate::observability::metrics::record_query(
            definition.name(),
            started.elapsed(),
            rows.len() as u64,
            false,
        );

        Ok(QueryOutcome {
            query: definition.name().to_string(),
            rows,
            cached: false,
        })
    }

    /// Run ad-hoc read-only SQL; never cached, no declared schema to check
    pub async fn execute_custom(&self, sql: &str) -> Result<ResultSet> {
        validate_read_only_sql(sql)?;
        let result = self.run_with_retry(CUSTOM_QUERY_NAME, sql.trim(), &[]).await?;
        tracing::info!(rows = result.row_count(), "Custom query executed");
        Ok(result)
    }

    /// Render a catalog query with its parameters inlined
    pub fn explain(&self, name: &str, raw: &RawParams) -> Result<Explanation> {
        let definition = self.catalog.lookup(name)?;
        let params = bind(&definition, raw)?;

        Ok(Explanation {
            query: definition.name().to_string(),
            domain: definition.domain(),
            description: definition.description().to_string(),
            sql: params.render_sql(definition.template()),
            parameters: params.bound_params(),
            cache_key: CacheKey::for_query(&definition, &params).to_key_string(),
            ttl_secs: self.ttl.ttl_for(&definition).as_secs(),
        })
    }

    /// Connect if needed, ping the warehouse and run a trivial statement
    ///
    /// Connection failures are reported in the result; only configuration
    /// errors are returned as `Err`.
    pub async fn ping(&self) -> Result<PingReport> {
        let started = Instant::now();
        let outcome = self.check_health().await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => Ok(PingReport {
                status: STATUS_OK,
                healthy: true,
                latency_ms,
                error: None,
            }),
            Err(e) if e.is_config() => Err(e),
            Err(e) => Ok(PingReport {
                status: STATUS_UNHEALTHY,
                healthy: false,
                latency_ms,
                error: Some(e.to_string()),
            }),
        }
    }

    async fn check_health(&self) -> Result<()> {
        let handle = self.provider.acquire().await?;
        if !self.provider.is_healthy(&handle).await {
            self.provider.discard(&handle).await;
            return Err(Error::Connection("warehouse health check failed".into()));
        }
        let result = self.statement_once(&handle, HEALTH_CHECK_QUERY, &[]).await?;
        if result.rows.is_empty() {
            return Err(Error::Query("health check returned no rows".into()));
        }
        Ok(())
    }

    pub fn available_queries(&self) -> Vec<QueryInfo> {
        self.catalog.describe()
    }

    /// Drop the cached result of one parameterization
    pub async fn invalidate(&self, name: &str, raw: &RawParams) -> Result<bool> {
        let definition = self.catalog.lookup(name)?;
        let params = bind(&definition, raw)?;
        Ok(self
            .cache
            .invalidate(&CacheKey::for_query(&definition, &params))
            .await)
    }

    /// Drop every cached parameterization of one query
    pub async fn invalidate_query(&self, name: &str) -> Result<u64> {
        let definition = self.catalog.lookup(name)?;
        let prefix = CacheKey::query_prefix(definition.domain(), definition.name());
        Ok(self.cache.invalidate_prefix(&prefix).await)
    }

    pub async fn invalidate_domain(&self, domain: QueryDomain) -> u64 {
        self.cache
            .invalidate_prefix(&CacheKey::domain_prefix(domain))
            .await
    }

    /// Drop everything ("refresh data")
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all().await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        let stats = self.cache.stats().await;
        #[cfg(feature = "metrics")]
        crate::observability::metrics::set_cache_size(stats.entry_count);
        stats
    }

    /// Close the warehouse session; safe to call repeatedly
    pub async fn shutdown(&self) -> Result<()> {
        self.provider.release().await
    }

    /// Acquire and execute, retrying transient failures
    ///
    /// Exhausted retries and warehouse-reported failures are wrapped into
    /// `Error::Execution`; configuration errors pass through unchanged.
    async fn run_with_retry(
        &self,
        name: &str,
        sql: &str,
        params: &[BoundParam],
    ) -> Result<ResultSet> {
        retry_transient(name, &self.retry, |attempt| async move {
            tracing::debug!(query = name, attempt, "Executing statement");
            let handle = self.provider.acquire().await?;
            let result = self.statement_once(&handle, sql, params).await;
            if let Err(e) = &result
                && e.is_transient()
            {
                self.provider.discard(&handle).await;
            }
            result
        })
        .await
        .map_err(|failure| wrap_failure(name, failure))
    }

    async fn statement_once(
        &self,
        handle: &W::Handle,
        sql: &str,
        params: &[BoundParam],
    ) -> Result<ResultSet> {
        timeout(
            self.query_timeout,
            self.provider.client().execute_query(handle, sql, params),
        )
        .await
        .unwrap_or_else(|_| {
            Err(Error::Connection(format!(
                "statement timed out after {}s",
                self.query_timeout.as_secs()
            )))
        })
    }
}

fn wrap_failure(name: &str, failure: RetryFailure) -> Error {
    let RetryFailure { error, attempts } = failure;
    match error {
        Error::Connection(_) | Error::Query(_) => Error::Execution {
            query: name.to_string(),
            attempts,
            source: Box::new(error),
        },
        other => other,
    }
}

/// Returned columns must match the declared `(name, type)` set exactly
///
/// Definitions that declare no columns are not checked.
fn check_schema(definition: &QueryDefinition, result: &ResultSet) -> Result<()> {
    if definition.result_columns().is_empty() {
        return Ok(());
    }

    let expected: BTreeSet<String> = definition
        .result_columns()
        .iter()
        .map(|c| c.signature())
        .collect();
    let actual: BTreeSet<String> = result
        .columns
        .iter()
        .map(|c| format!("{}:{}", c.name, c.column_type()))
        .collect();

    if expected == actual {
        Ok(())
    } else {
        Err(Error::SchemaMismatch {
            query: definition.name().to_string(),
            expected: expected.into_iter().collect(),
            actual: actual.into_iter().collect(),
        })
    }
}

/// Re-key TTL overrides by canonical query name
///
/// Aliases resolve to the query they name; names the catalog does not know
/// are a configuration error rather than a silently ignored override.
fn canonical_ttl(catalog: &QueryCatalog, ttl: &CacheTtlConfig) -> Result<CacheTtlConfig> {
    let mut per_query = std::collections::HashMap::with_capacity(ttl.per_query.len());
    for (name, duration) in &ttl.per_query {
        let definition = catalog.lookup(name).map_err(|_| {
            Error::Config(format!("cache ttl override for unknown query '{name}'"))
        })?;
        per_query.insert(definition.name().to_string(), *duration);
    }
    Ok(CacheTtlConfig {
        default: ttl.default,
        per_query,
    })
}
