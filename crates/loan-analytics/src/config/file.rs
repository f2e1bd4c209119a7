//! TOML configuration file loading

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::builder::{ConfigBuilder, parse_host};
use crate::cache::CacheBackend;
use crate::retry::RetryPolicy;
use crate::{Error, Result};

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./loan-analytics.toml",
    "~/.config/loan-analytics/config.toml",
    "/etc/loan-analytics/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    apply_file_config(builder, file_config)
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> Result<ConfigBuilder> {
    if let Some(wh) = config.warehouse {
        if let Some(host) = wh.host {
            builder = builder.host(parse_host(&host)?);
        }
        if let Some(id) = wh.warehouse_id {
            builder = builder.warehouse_id(id);
        }
        if let Some(token) = wh.token {
            builder = builder.token(token);
        }
    }

    if let Some(tables) = config.tables {
        if let Some(catalog) = tables.catalog {
            builder = builder.catalog(catalog);
        }
        if let Some(schema) = tables.schema {
            builder = builder.schema(schema);
        }
    }

    if let Some(exec) = config.execution {
        if let Some(secs) = exec.query_timeout_secs {
            builder = builder.query_timeout(Duration::from_secs(secs));
        }
        if let Some(attempts) = exec.retry_attempts {
            builder = builder.retry_attempts(attempts);
        }
        if let Some(secs) = exec.connection_max_age_secs {
            builder = builder.connection_max_age(Duration::from_secs(secs));
        }
        if exec.retry_base_delay_ms.is_some() || exec.retry_max_delay_ms.is_some() {
            let defaults = RetryPolicy::default();
            let base = exec
                .retry_base_delay_ms
                .map_or(defaults.base_delay, Duration::from_millis);
            let max = exec
                .retry_max_delay_ms
                .map_or(defaults.max_delay, Duration::from_millis);
            if base > max {
                return Err(Error::Config(format!(
                    "retry_base_delay_ms ({}) exceeds retry_max_delay_ms ({})",
                    base.as_millis(),
                    max.as_millis()
                )));
            }
            builder = builder.retry_delays(base, max);
        }
    }

    if let Some(cache) = config.cache {
        if let Some(enabled) = cache.enabled {
            builder = builder.cache_enabled(enabled);
        }
        if let Some(backend) = cache.backend {
            builder = builder.cache_backend(backend.parse::<CacheBackend>()?);
        }
        if let Some(max) = cache.max_entries {
            let max = NonZeroUsize::new(max)
                .ok_or_else(|| Error::Config("cache max_entries must be at least 1".into()))?;
            builder = builder.cache_max_entries(max);
        }
        if let Some(secs) = cache.ttl_secs {
            builder = builder.cache_default_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = cache.sweep_interval_secs {
            let interval = (secs > 0).then(|| Duration::from_secs(secs));
            builder = builder.cache_sweep_interval(interval);
        }
        for (query, secs) in cache.query_ttl_secs.unwrap_or_default() {
            builder = builder.cache_query_ttl(query, Duration::from_secs(secs));
        }
    }

    if let Some(obs) = config.observability {
        if let Some(name) = obs.service_name {
            builder = builder.service_name(name);
        }
        if let Some(level) = obs.log_level {
            builder = builder.log_level(level);
        }
        if let Some(json) = obs.json_logs {
            builder = builder.json_logs(json);
        }
    }

    Ok(builder)
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    warehouse: Option<WarehouseSection>,
    tables: Option<TablesSection>,
    execution: Option<ExecutionSection>,
    cache: Option<CacheSection>,
    observability: Option<ObservabilitySection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WarehouseSection {
    host: Option<String>,
    warehouse_id: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TablesSection {
    catalog: Option<String>,
    schema: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExecutionSection {
    query_timeout_secs: Option<u64>,
    retry_attempts: Option<u32>,
    retry_base_delay_ms: Option<u64>,
    retry_max_delay_ms: Option<u64>,
    connection_max_age_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CacheSection {
    enabled: Option<bool>,
    backend: Option<String>,
    max_entries: Option<usize>,
    ttl_secs: Option<u64>,
    /// 0 disables the sweep
    sweep_interval_secs: Option<u64>,
    query_ttl_secs: Option<HashMap<String, u64>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObservabilitySection {
    service_name: Option<String>,
    log_level: Option<String>,
    json_logs: Option<bool>,
}
