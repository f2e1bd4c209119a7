//! Configuration builder

use std::num::NonZeroUsize;
use std::time::Duration;

use url::Url;

use crate::cache::{CacheBackend, CacheConfig};
use crate::constants::{DEFAULT_CATALOG, DEFAULT_SCHEMA, SERVICE_NAME};
use crate::retry::RetryPolicy;
use crate::validation::{qualified_table, validate_identifier};
use crate::warehouse::{Credential, DEFAULT_CONNECTION_MAX_AGE, WarehouseTarget};
use crate::{Error, Result};

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_LOG_LEVEL: &str = "info";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub warehouse: WarehouseConfig,
    pub tables: TablesConfig,
    pub execution: ExecutionConfig,
    pub cache: CacheConfig,
    pub telemetry: TelemetryConfig,
}

impl Config {
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    #[must_use]
    pub const fn warehouse(&self) -> &WarehouseConfig {
        &self.warehouse
    }

    #[must_use]
    pub const fn tables(&self) -> &TablesConfig {
        &self.tables
    }

    #[must_use]
    pub const fn cache(&self) -> &CacheConfig {
        &self.cache
    }
}

/// Connection settings for the SQL warehouse
///
/// Any field may be missing until the first connection attempt, which
/// reports the gap as a configuration error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarehouseConfig {
    pub host: Option<Url>,
    pub warehouse_id: Option<String>,
    pub token: Option<Credential>,
}

impl WarehouseConfig {
    pub fn new(host: Url, warehouse_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: Some(host),
            warehouse_id: Some(warehouse_id.into()),
            token: Some(Credential::token(token)),
        }
    }

    pub const fn is_complete(&self) -> bool {
        self.host.is_some() && self.warehouse_id.is_some() && self.token.is_some()
    }

    /// Resolve into a connectable target
    pub fn target(&self) -> Result<WarehouseTarget> {
        let host = self
            .host
            .clone()
            .ok_or_else(|| Error::Config("warehouse host is not configured".into()))?;
        let warehouse_id = self
            .warehouse_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Config("warehouse id is not configured".into()))?;
        let credential = self
            .token
            .clone()
            .filter(|c| !c.secret().is_empty())
            .ok_or_else(|| Error::Config("warehouse token is not configured".into()))?;

        Ok(WarehouseTarget {
            host,
            warehouse_id: warehouse_id.to_string(),
            credential,
        })
    }
}

/// Parse a workspace host, accepting a bare hostname
pub fn parse_host(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let url = Url::parse(&candidate)
        .map_err(|e| Error::Config(format!("Invalid warehouse host '{raw}': {e}")))?;
    match url.scheme() {
        "https" | "http" if url.host_str().is_some() => Ok(url),
        scheme => Err(Error::Config(format!(
            "Invalid warehouse host '{raw}': unsupported scheme '{scheme}'"
        ))),
    }
}

/// Location of the loan dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablesConfig {
    pub catalog: String,
    pub schema: String,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            catalog: DEFAULT_CATALOG.to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }
}

impl TablesConfig {
    pub fn new(catalog: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            catalog: catalog.into(),
            schema: schema.into(),
        }
    }

    /// `catalog.schema.table` with every part checked as an identifier
    pub fn qualified(&self, table: &str) -> Result<String> {
        qualified_table(&self.catalog, &self.schema, table)
    }

    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.catalog, "catalog")?;
        validate_identifier(&self.schema, "schema")
    }
}

/// Per-statement limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Upper bound for one warehouse round trip
    pub query_timeout: Duration,
    pub retry: RetryPolicy,
    /// Age after which the warehouse connection is recreated
    pub connection_max_age: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            retry: RetryPolicy::default(),
            connection_max_age: DEFAULT_CONNECTION_MAX_AGE,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    pub json_logs: bool,
}

/// Configuration builder with fluent API
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    warehouse: WarehouseConfig,
    tables: TablesConfig,
    execution: ExecutionConfig,
    cache: CacheConfig,
    telemetry: TelemetryConfig,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host(mut self, host: Url) -> Self {
        self.warehouse.host = Some(host);
        self
    }

    #[must_use]
    pub fn warehouse_id(mut self, id: impl Into<String>) -> Self {
        self.warehouse.warehouse_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.warehouse.token = Some(Credential::token(token));
        self
    }

    #[must_use]
    pub fn catalog(mut self, catalog: impl Into<String>) -> Self {
        self.tables.catalog = catalog.into();
        self
    }

    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.tables.schema = schema.into();
        self
    }

    #[must_use]
    pub const fn query_timeout(mut self, timeout: Duration) -> Self {
        self.execution.query_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn connection_max_age(mut self, max_age: Duration) -> Self {
        self.execution.connection_max_age = max_age;
        self
    }

    /// Total attempts per statement, including the first
    #[must_use]
    pub const fn retry_attempts(mut self, attempts: u32) -> Self {
        self.execution.retry = self.execution.retry.with_max_attempts(attempts);
        self
    }

    #[must_use]
    pub const fn retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.execution.retry = self.execution.retry.with_delays(base, max);
        self
    }

    #[must_use]
    pub const fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }

    #[must_use]
    pub const fn cache_backend(mut self, backend: CacheBackend) -> Self {
        self.cache.backend = backend;
        self
    }

    #[must_use]
    pub const fn cache_max_entries(mut self, max: NonZeroUsize) -> Self {
        self.cache.max_entries = max;
        self
    }

    /// TTL for queries without their own
    #[must_use]
    pub const fn cache_default_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl.default = ttl;
        self
    }

    /// TTL override for one canonical query name
    #[must_use]
    pub fn cache_query_ttl(mut self, query: impl Into<String>, ttl: Duration) -> Self {
        self.cache.ttl.per_query.insert(query.into(), ttl);
        self
    }

    /// `None` turns the background sweep off
    #[must_use]
    pub const fn cache_sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.cache.sweep_interval = interval;
        self
    }

    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.telemetry.service_name = name.into();
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.telemetry.log_level = level.into();
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.telemetry.json_logs = enabled;
        self
    }

    /// Build the configuration
    ///
    /// Warehouse settings may still be incomplete; table names and limits
    /// are checked here.
    pub fn build(self) -> Result<Config> {
        self.tables.validate()?;

        if self.execution.query_timeout.is_zero() {
            return Err(Error::Config("query timeout must be greater than zero".into()));
        }
        if self.execution.connection_max_age.is_zero() {
            return Err(Error::Config("connection max age must be greater than zero".into()));
        }
        if self.cache.ttl.default.is_zero() {
            return Err(Error::Config("cache ttl must be greater than zero".into()));
        }
        if let Some((query, _)) = self.cache.ttl.per_query.iter().find(|(_, ttl)| ttl.is_zero()) {
            return Err(Error::Config(format!(
                "cache ttl override for '{query}' must be greater than zero"
            )));
        }
        if self.cache.sweep_interval.is_some_and(|i| i.is_zero()) {
            return Err(Error::Config("cache sweep interval must be greater than zero".into()));
        }

        let service_name = if self.telemetry.service_name.is_empty() {
            SERVICE_NAME.to_string()
        } else {
            self.telemetry.service_name
        };

        let log_level = if self.telemetry.log_level.is_empty() {
            DEFAULT_LOG_LEVEL.to_string()
        } else {
            self.telemetry.log_level
        };

        Ok(Config {
            warehouse: self.warehouse,
            tables: self.tables,
            execution: self.execution,
            cache: self.cache,
            telemetry: TelemetryConfig {
                service_name,
                log_level,
                json_logs: self.telemetry.json_logs,
            },
        })
    }
}
