//! CLI command implementations

pub mod config;
pub mod error;
pub mod init;
pub mod run;
pub mod shell;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use sift_jobs::{JobContext, JobRegistry, WorkerPool};
use sift_store::{FileStore, RecordStore, StoreError};

use config::SiftConfig;
use error::HelpfulError;

/// Process-wide job machinery shared by `shell` and `run`.
pub struct Toolbox {
    pub config: SiftConfig,
    pub pool: Arc<WorkerPool>,
    pub registry: JobRegistry,
}

impl Toolbox {
    pub fn start(pool_threads: Option<usize>) -> Result<Self> {
        Self::from_config(SiftConfig::resolve()?.with_pool_threads(pool_threads))
    }

    pub fn from_config(config: SiftConfig) -> Result<Self> {
        let pool = WorkerPool::new(config.pool_threads).context("Failed to start worker pool")?;
        debug!(
            pool_threads = config.pool_threads,
            cancel_check_interval = config.cancel_check_interval,
            "Toolbox ready"
        );
        Ok(Self {
            config,
            pool: Arc::new(pool),
            registry: JobRegistry::new(),
        })
    }

    pub fn context(&self, store: Arc<dyn RecordStore>) -> JobContext {
        JobContext {
            store,
            pool: Arc::clone(&self.pool),
            cancel_check_interval: self.config.cancel_check_interval,
        }
    }
}

/// Open a store, mapping failures to operator-facing errors.
pub fn open_store(path: &Path) -> Result<Arc<FileStore>, HelpfulError> {
    match FileStore::open(path) {
        Ok(store) => Ok(Arc::new(store)),
        Err(StoreError::MissingStore { .. }) => Err(HelpfulError::store_not_found(path)),
        Err(e) => Err(HelpfulError::store_unreadable(path, e)),
    }
}
