//! Tool configuration and the `config` command
//!
//! All paths live under the sift home (`$SIFT_HOME`, else `~/.sift`).
//! `config.toml` is optional and every field has a default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use sift_jobs::DEFAULT_CANCEL_CHECK_INTERVAL;
use sift_logging::{config_path, logs_dir, sift_home};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiftConfig {
    /// Scan threads in the shared worker pool
    #[serde(default = "default_pool_threads")]
    pub pool_threads: usize,

    /// Ids scanned between two cancellation checks
    #[serde(default = "default_cancel_check_interval")]
    pub cancel_check_interval: u64,
}

fn default_pool_threads() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

fn default_cancel_check_interval() -> u64 {
    DEFAULT_CANCEL_CHECK_INTERVAL
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            pool_threads: default_pool_threads(),
            cancel_check_interval: default_cancel_check_interval(),
        }
    }
}

impl SiftConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: SiftConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// `config.toml` under the sift home, or defaults when it does not exist.
    pub fn resolve() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply command-line overrides.
    pub fn with_pool_threads(mut self, pool_threads: Option<usize>) -> Self {
        if let Some(n) = pool_threads {
            self.pool_threads = n;
        }
        self.pool_threads = self.pool_threads.max(1);
        self.cancel_check_interval = self.cancel_check_interval.max(1);
        self
    }
}

/// Arguments for the config command
#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    /// Show resolved paths and settings as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the config command - shows paths and effective settings
pub fn run(args: ConfigArgs, pool_threads: Option<usize>) -> Result<()> {
    let home = sift_home();
    let logs = logs_dir();
    let config_file = config_path();
    let config = SiftConfig::resolve()?.with_pool_threads(pool_threads);

    if args.json {
        let out = serde_json::json!({
            "home": home.to_string_lossy(),
            "logs": {
                "path": logs.to_string_lossy(),
                "exists": logs.exists(),
            },
            "config_file": {
                "path": config_file.to_string_lossy(),
                "exists": config_file.exists(),
            },
            "pool_threads": config.pool_threads,
            "cancel_check_interval": config.cancel_check_interval,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("SIFT CONFIGURATION");
        println!("==================");
        println!();
        println!("Home:     {}", home.display());
        println!("Logs:     {}", logs.display());
        println!(
            "Config:   {} ({})",
            config_file.display(),
            if config_file.exists() { "exists" } else { "not found, using defaults" }
        );
        println!();
        println!("Pool threads:           {}", config.pool_threads);
        println!("Cancel check interval:  {}", config.cancel_check_interval);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiftConfig::default();
        assert!(config.pool_threads > 0);
        assert_eq!(config.cancel_check_interval, 256);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: SiftConfig = toml::from_str("pool_threads = 3\n").unwrap();
        assert_eq!(config.pool_threads, 3);
        assert_eq!(config.cancel_check_interval, 256);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = SiftConfig {
            pool_threads: 6,
            cancel_check_interval: 32,
        };
        config.save(&path).unwrap();
        assert_eq!(SiftConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_overrides_are_clamped() {
        let config = SiftConfig {
            pool_threads: 8,
            cancel_check_interval: 0,
        }
        .with_pool_threads(Some(0));
        assert_eq!(config.pool_threads, 1);
        assert_eq!(config.cancel_check_interval, 1);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "pool_threads = \"many\"\n").unwrap();
        assert!(SiftConfig::load(&path).is_err());
    }
}
