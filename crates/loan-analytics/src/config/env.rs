//! Environment variable loading for configuration

use std::env;
use std::num::NonZeroUsize;
use std::time::Duration;

use super::builder::{ConfigBuilder, parse_host};
use crate::cache::CacheBackend;
use crate::{Error, Result};

/// Environment variable names
pub(crate) mod vars {
    pub const DATABRICKS_HOST: &str = "DATABRICKS_HOST";
    pub const DATABRICKS_WAREHOUSE_ID: &str = "DATABRICKS_WAREHOUSE_ID";
    pub const DATABRICKS_TOKEN: &str = "DATABRICKS_TOKEN";
    pub const CATALOG: &str = "LOAN_ANALYTICS_CATALOG";
    pub const SCHEMA: &str = "LOAN_ANALYTICS_SCHEMA";
    pub const QUERY_TIMEOUT_SECS: &str = "LOAN_ANALYTICS_QUERY_TIMEOUT_SECS";
    pub const RETRY_ATTEMPTS: &str = "LOAN_ANALYTICS_RETRY_ATTEMPTS";
    pub const CONNECTION_MAX_AGE_SECS: &str = "LOAN_ANALYTICS_CONNECTION_MAX_AGE_SECS";
    pub const CACHE: &str = "LOAN_ANALYTICS_CACHE";
    pub const CACHE_TTL_SECS: &str = "LOAN_ANALYTICS_CACHE_TTL_SECS";
    pub const CACHE_MAX_ENTRIES: &str = "LOAN_ANALYTICS_CACHE_MAX_ENTRIES";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const JSON_LOGS: &str = "LOAN_ANALYTICS_JSON_LOGS";

    pub const ALL: &[&str] = &[
        DATABRICKS_HOST,
        DATABRICKS_WAREHOUSE_ID,
        DATABRICKS_TOKEN,
        CATALOG,
        SCHEMA,
        QUERY_TIMEOUT_SECS,
        RETRY_ATTEMPTS,
        CONNECTION_MAX_AGE_SECS,
        CACHE,
        CACHE_TTL_SECS,
        CACHE_MAX_ENTRIES,
        RUST_LOG,
        JSON_LOGS,
    ];
}

/// Load configuration from environment variables
///
/// Malformed numbers are ignored; a malformed host or cache backend is an
/// error because silently falling back would hide a misconfiguration.
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    // Warehouse
    if let Some(host) = non_empty(vars::DATABRICKS_HOST) {
        builder = builder.host(parse_host(&host)?);
    }

    if let Some(id) = non_empty(vars::DATABRICKS_WAREHOUSE_ID) {
        builder = builder.warehouse_id(id);
    }

    if let Some(token) = non_empty(vars::DATABRICKS_TOKEN) {
        builder = builder.token(token);
    }

    // Tables
    if let Some(catalog) = non_empty(vars::CATALOG) {
        builder = builder.catalog(catalog);
    }

    if let Some(schema) = non_empty(vars::SCHEMA) {
        builder = builder.schema(schema);
    }

    // Execution
    if let Ok(timeout_str) = env::var(vars::QUERY_TIMEOUT_SECS)
        && let Ok(secs) = timeout_str.parse::<u64>()
    {
        builder = builder.query_timeout(Duration::from_secs(secs));
    }

    if let Ok(attempts_str) = env::var(vars::RETRY_ATTEMPTS)
        && let Ok(attempts) = attempts_str.parse::<u32>()
    {
        builder = builder.retry_attempts(attempts);
    }

    if let Ok(age_str) = env::var(vars::CONNECTION_MAX_AGE_SECS)
        && let Ok(secs) = age_str.parse::<u64>()
    {
        builder = builder.connection_max_age(Duration::from_secs(secs));
    }

    // Cache
    if let Some(val) = non_empty(vars::CACHE) {
        builder = match val.parse::<CacheBackend>() {
            Ok(backend) => builder.cache_enabled(true).cache_backend(backend),
            Err(_) if is_bool_literal(&val) => builder.cache_enabled(parse_bool(&val)),
            Err(_) => {
                return Err(Error::Config(format!("Invalid {}: '{val}'", vars::CACHE)));
            }
        };
    }

    if let Ok(ttl_str) = env::var(vars::CACHE_TTL_SECS)
        && let Ok(secs) = ttl_str.parse::<u64>()
    {
        builder = builder.cache_default_ttl(Duration::from_secs(secs));
    }

    if let Ok(max_str) = env::var(vars::CACHE_MAX_ENTRIES)
        && let Ok(max) = max_str.parse::<usize>()
        && let Some(nz) = NonZeroUsize::new(max)
    {
        builder = builder.cache_max_entries(nz);
    }

    // Telemetry
    if let Some(level) = non_empty(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Ok(val) = env::var(vars::JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    Ok(builder)
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn parse_bool(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn is_bool_literal(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "false" | "0" | "no"
    )
}

/// Serializes tests that mutate process environment
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Run `f` with only `vars` set among the variables this module reads
#[cfg(test)]
pub(crate) fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);

    let old_values: Vec<_> = vars::ALL.iter().map(|k| (*k, env::var(k).ok())).collect();

    for key in vars::ALL {
        // SAFETY: We hold a mutex lock to ensure no concurrent modifications
        unsafe { env::remove_var(key) };
    }
    for (key, value) in vars {
        // SAFETY: We hold a mutex lock to ensure no concurrent modifications
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    for (key, old_value) in old_values {
        match old_value {
            // SAFETY: We hold a mutex lock to ensure no concurrent modifications
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(parse_bool("yes"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("no"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_load_warehouse() {
        with_env_vars(
            &[
                (vars::DATABRICKS_HOST, "adb-123.azuredatabricks.net"),
                (vars::DATABRICKS_WAREHOUSE_ID, "wh-1"),
                (vars::DATABRICKS_TOKEN, "dapi-token"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
                let target = config.warehouse.target().unwrap();
                assert_eq!(target.host.host_str(), Some("adb-123.azuredatabricks.net"));
                assert_eq!(target.warehouse_id, "wh-1");
                assert_eq!(target.credential.secret(), "dapi-token");
            },
        );
    }

    #[test]
    fn test_load_invalid_host() {
        with_env_vars(&[(vars::DATABRICKS_HOST, "ftp://nope")], || {
            let err = load_from_env(ConfigBuilder::new()).unwrap_err();
            assert!(err.is_config());
        });
    }

    #[test]
    fn test_blank_token_ignored() {
        with_env_vars(&[(vars::DATABRICKS_TOKEN, "   ")], || {
            let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
            assert!(config.warehouse.token.is_none());
        });
    }

    #[test]
    fn test_load_tables() {
        with_env_vars(&[(vars::CATALOG, "main"), (vars::SCHEMA, "lending")], || {
            let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
            assert_eq!(config.tables.catalog, "main");
            assert_eq!(config.tables.schema, "lending");
        });
    }

    #[test]
    fn test_load_execution() {
        with_env_vars(
            &[
                (vars::QUERY_TIMEOUT_SECS, "120"),
                (vars::RETRY_ATTEMPTS, "5"),
                (vars::CONNECTION_MAX_AGE_SECS, "900"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
                assert_eq!(config.execution.query_timeout, Duration::from_secs(120));
                assert_eq!(config.execution.retry.max_attempts, 5);
                assert_eq!(config.execution.connection_max_age, Duration::from_secs(900));
            },
        );
    }

    #[test]
    fn test_invalid_numbers_ignored() {
        with_env_vars(
            &[
                (vars::QUERY_TIMEOUT_SECS, "soon"),
                (vars::CACHE_MAX_ENTRIES, "0"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
                assert_eq!(config.execution.query_timeout, Duration::from_secs(60));
                assert_eq!(config.cache.max_entries.get(), 1000);
            },
        );
    }

    #[test]
    fn test_load_cache_switch() {
        with_env_vars(&[(vars::CACHE, "false")], || {
            let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
            assert!(!config.cache.is_active());
        });

        with_env_vars(&[(vars::CACHE, "none")], || {
            let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
            assert_eq!(config.cache.backend, CacheBackend::Noop);
        });

        with_env_vars(&[(vars::CACHE, "redis")], || {
            assert!(load_from_env(ConfigBuilder::new()).is_err());
        });
    }

    #[test]
    fn test_load_cache_limits() {
        with_env_vars(
            &[(vars::CACHE_TTL_SECS, "60"), (vars::CACHE_MAX_ENTRIES, "50")],
            || {
                let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
                assert_eq!(config.cache.ttl.default, Duration::from_secs(60));
                assert_eq!(config.cache.max_entries.get(), 50);
            },
        );
    }

    #[test]
    fn test_load_telemetry_config() {
        with_env_vars(&[(vars::RUST_LOG, "debug"), (vars::JSON_LOGS, "true")], || {
            let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
            assert_eq!(config.telemetry.log_level, "debug");
            assert!(config.telemetry.json_logs);
        });
    }

    #[test]
    fn test_load_no_env_vars() {
        with_env_vars(&[], || {
            let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
            assert!(!config.warehouse.is_complete());
            assert!(config.warehouse.target().unwrap_err().is_config());
        });
    }
}
