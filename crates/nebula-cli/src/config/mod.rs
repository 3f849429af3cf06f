//! Configuration resolution.
//!
//! Precedence, lowest first: built-in defaults, the TOML config file,
//! `NEBULA_*` environment variables, command-line flags.

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use nebula_provision::ManagerConfig;
use std::path::{Path, PathBuf};

/// Default config file location.
pub fn default_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("io", "nebula", "nebula-manager")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(dirs.config_dir().join("config.toml"))
}

/// Load the manager configuration.
pub fn load(path: Option<&Path>, data_dir: Option<&Path>) -> Result<ManagerConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_path()?,
    };

    let mut config = ManagerConfig::load(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    config.apply_env();

    if let Some(dir) = data_dir {
        config.data_dir = dir.to_path_buf();
    }

    Ok(config)
}

/// Subdirectory of the data dir used by `--offline` runs.
pub const OFFLINE_DIR: &str = "offline";

/// Offline runs sign with fabricated material, so they get their own data
/// directory and store and never touch the real ones.
pub fn offline(mut config: ManagerConfig) -> ManagerConfig {
    config.data_dir = config.data_dir.join(OFFLINE_DIR);
    config.store_path = None;
    config
}
