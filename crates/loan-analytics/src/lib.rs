//! Cached, parameter-checked query layer for the loan analytics dashboard

pub mod cache;
pub mod config;
pub mod constants;
mod error;
pub mod executor;
pub mod observability;
pub mod query;
mod retry;
pub mod schema;
#[cfg(test)]
mod testing;
pub mod types;
mod validation;
pub mod warehouse;

pub use cache::{
    CacheBackend, CacheConfig, CacheKey, CacheProvider, CacheStats, CacheTtlConfig, InMemoryCache,
    NoopCache, TracedCache, create_cache, spawn_sweeper,
};
pub use config::{Config, ConfigBuilder, TablesConfig, TelemetryConfig, WarehouseConfig};
pub use error::{Error, ErrorKind, Result, ValidationReason};
pub use executor::{Explanation, PingReport, QueryExecutor, QueryOutcome};
pub use query::{QueryCatalog, QueryDefinition, QueryDomain, QueryInfo, RawParams};
pub use retry::RetryPolicy;
pub use schema::{SchemaReport, validate_tables};
pub use types::*;
pub use validation::validate_read_only_sql;
#[cfg(feature = "databricks")]
pub use warehouse::DatabricksClient;
pub use warehouse::{ConnectionProvider, WarehouseClient};
