//! Cache configuration types

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use crate::Error;
use crate::query::QueryDefinition;

/// Default capacity of the in-memory cache
pub const DEFAULT_MAX_ENTRIES: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(n) => n,
    None => unreachable!(),
};

/// Default TTL for query results without an override
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default interval of the background expiry sweep
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Cache backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackend {
    Noop,
    #[default]
    Memory,
}

impl CacheBackend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Memory => "memory",
        }
    }
}

impl FromStr for CacheBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" | "lru" => Ok(Self::Memory),
            "noop" | "none" | "disabled" | "off" => Ok(Self::Noop),
            other => Err(Error::Config(format!("unknown cache backend '{other}'"))),
        }
    }
}

/// How long results stay fresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTtlConfig {
    /// TTL for queries without an override
    pub default: Duration,
    /// Overrides keyed by canonical query name
    pub per_query: HashMap<String, Duration>,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            default: DEFAULT_TTL,
            per_query: HashMap::new(),
        }
    }
}

impl CacheTtlConfig {
    /// Configured override, then the definition's own TTL, then the default
    pub fn ttl_for(&self, definition: &QueryDefinition) -> Duration {
        self.per_query
            .get(definition.name())
            .copied()
            .or_else(|| definition.ttl())
            .unwrap_or(self.default)
    }
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub backend: CacheBackend,
    pub max_entries: NonZeroUsize,
    pub ttl: CacheTtlConfig,
    /// `None` disables the background sweep; lazy expiry still applies
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Memory,
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl: CacheTtlConfig::default(),
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
        }
    }
}

impl CacheConfig {
    /// Configuration with caching switched off
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            sweep_interval: None,
            ..Self::default()
        }
    }

    /// Whether results are actually stored
    pub fn is_active(&self) -> bool {
        self.enabled && self.backend != CacheBackend::Noop
    }
}
