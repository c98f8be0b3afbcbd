use std::path::PathBuf;
use thiserror::Error;

use crate::record::RecordKind;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by record store access
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: u64 },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt {kind} record {id}: {reason}")]
    Corrupt {
        kind: RecordKind,
        id: u64,
        reason: String,
    },

    #[error("Invalid store configuration {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Store directory not found: {path}")]
    MissingStore { path: PathBuf },
}

impl StoreError {
    pub fn not_found(kind: RecordKind, id: u64) -> Self {
        Self::NotFound { kind, id }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the "no such live record" outcome of a public lookup.
    ///
    /// Scans treat this as "not live"; every other variant is a real fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
