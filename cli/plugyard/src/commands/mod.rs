//! CLI command implementations.

pub mod platform;
pub mod project;
pub mod version;

use std::path::Path;

use anyhow::{Context, Result};
use plugyard_registry::{Registry, RegistryConfig};

/// Configuration file looked up in the data directory by default.
pub const CONFIG_FILE: &str = "plugyard.toml";

/// Load the configuration and open the registry under `data_dir`.
pub fn open_registry(data_dir: &Path, config_path: &Path) -> Result<Registry> {
    let config = RegistryConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    Registry::open(data_dir, config)
        .with_context(|| format!("opening registry in {}", data_dir.display()))
}
