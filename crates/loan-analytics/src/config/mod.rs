//! Configuration management
//!
//! Supports configuration loading with precedence: env > file > CLI > defaults

mod builder;
mod env;
mod file;

use std::path::Path;

pub use builder::{
    Config, ConfigBuilder, ExecutionConfig, TablesConfig, TelemetryConfig, WarehouseConfig,
    parse_host,
};
pub use file::find_config_file;

use crate::Result;

/// Load configuration with precedence: env > file > defaults
pub fn load_config() -> Result<ConfigBuilder> {
    layer_config(ConfigBuilder::new(), None)
}

/// Load configuration from a specific file path
pub fn load_config_from_path(path: &Path) -> Result<ConfigBuilder> {
    layer_config(ConfigBuilder::new(), Some(path))
}

/// Apply the config file, then the environment, on top of `base`
///
/// `base` carries the lowest-priority settings (CLI flags). Without an
/// explicit `path` the standard locations are searched.
pub fn layer_config(base: ConfigBuilder, path: Option<&Path>) -> Result<ConfigBuilder> {
    let mut builder = base;

    let path = path.map(Path::to_path_buf).or_else(file::find_config_file);
    if let Some(path) = path {
        tracing::info!("Loading configuration from {}", path.display());
        builder = file::load_from_file(&path, builder)?;
    }

    env::load_from_env(builder)
}
