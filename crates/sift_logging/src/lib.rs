//! Shared logging setup for sift binaries.

mod paths;
mod capped;

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use paths::{config_path, logs_dir, sift_home, HOME_ENV};

use capped::{CappedLog, LogFileWriter};

const DEFAULT_LOG_FILTER: &str = "sift=info,sift_jobs=info,sift_store=info";
const LOG_FILE_CAP: u64 = 10 * 1024 * 1024;

/// Logging configuration shared by sift binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// The shell owns the terminal: keep stderr to warnings unless verbose.
    pub interactive: bool,
}

/// Install the global subscriber: a size-capped file under [`logs_dir`] plus
/// stderr. `RUST_LOG` overrides the default filter for both.
///
/// Returns the path of the live log file.
pub fn init_logging(config: LogConfig<'_>) -> Result<PathBuf> {
    let dir = ensure_logs_dir()?;
    let log = CappedLog::open(&dir, config.app_name, LOG_FILE_CAP)
        .with_context(|| format!("Failed to open log file for {}", config.app_name))?;
    let log_path = log.path().to_path_buf();
    let writer = LogFileWriter::new(log);

    let file_filter = default_filter();
    let console_filter = if config.interactive && !config.verbose {
        EnvFilter::new("warn")
    } else if config.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        default_filter()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(true)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(log_path)
}

/// Create the logs directory if needed.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
