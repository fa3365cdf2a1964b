//! Configuration file handling
//!
//! Handles:
//! - Locating the config file (`$SMARTMON_CONFIG` or the OS config dir)
//! - Loading with defaults when the file does not exist
//! - Writing the defaults for `smartmon init-config`

use anyhow::{Context, Result};
use smartmon_core::MonitorConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_ENV_VAR: &str = "SMARTMON_CONFIG";

/// Config file location: `$SMARTMON_CONFIG` if set, else `<config dir>/smartmon/config.toml`
pub fn config_file_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
    path.push("smartmon");
    path.push("config.toml");
    Ok(path)
}

/// Load config from `path`; a missing file yields the defaults
pub async fn load_from(path: &Path) -> Result<MonitorConfig> {
    if !path.exists() {
        debug!("No config file at {}, using defaults", path.display());
        return Ok(MonitorConfig::default());
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = MonitorConfig::from_toml_str(&content)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write `config` to `path`, creating parent directories
pub async fn save_to(config: &MonitorConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = config.to_toml_string()?;
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
