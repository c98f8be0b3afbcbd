//! Per-store configuration (`store.toml`)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, StoreError};

/// File name of the optional configuration file inside a store directory.
pub const STORE_CONFIG_FILE: &str = "store.toml";

/// On-disk format version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_format_version")]
    pub format_version: u32,

    /// Free-form label shown by the shell banner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            description: None,
        }
    }
}

impl StoreConfig {
    /// Load `store.toml` from a store directory, falling back to defaults
    /// when the file does not exist.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(STORE_CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| StoreError::Config {
            path: path.clone(),
            message: e.to_string(),
        })?;
        if config.format_version != FORMAT_VERSION {
            return Err(StoreError::Config {
                path,
                message: format!(
                    "unsupported format_version {} (expected {})",
                    config.format_version, FORMAT_VERSION
                ),
            });
        }
        Ok(config)
    }

    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        let path = dir.join(STORE_CONFIG_FILE);
        let content = toml::to_string_pretty(self).map_err(|e| StoreError::Config {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| StoreError::io(&path, e))
    }
}
