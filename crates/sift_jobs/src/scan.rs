//! Liveness checks used by record-counting scans.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use sift_store::{RecordKind, RecordStore, StoreError};

/// How a scan decides whether one identifier holds a live record.
pub trait ScanStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(false)` for a free slot; `Err` only for real faults.
    fn is_live(&self, store: &dyn RecordStore, kind: RecordKind, id: u64)
        -> Result<bool, StoreError>;
}

/// Goes through the public lookup and reads "not found" as "not live".
#[derive(Debug, Clone, Copy, Default)]
pub struct ExistenceProbe;

impl ScanStrategy for ExistenceProbe {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn is_live(
        &self,
        store: &dyn RecordStore,
        kind: RecordKind,
        id: u64,
    ) -> Result<bool, StoreError> {
        match store.fetch_by_id(kind, id) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Reads the raw slot and checks its in-use flag.
///
/// Skips the lookup's not-found path, so it is cheaper per id, but it depends
/// on the storage layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectRead;

impl ScanStrategy for DirectRead {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn is_live(
        &self,
        store: &dyn RecordStore,
        kind: RecordKind,
        id: u64,
    ) -> Result<bool, StoreError> {
        store.raw_record_at(kind, id).map(|raw| raw.in_use)
    }
}

/// Strategy selector as it appears in job arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    #[default]
    Probe,
    Raw,
}

impl StrategyKind {
    pub fn strategy(self) -> Arc<dyn ScanStrategy> {
        match self {
            StrategyKind::Probe => Arc::new(ExistenceProbe),
            StrategyKind::Raw => Arc::new(DirectRead),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Probe => f.write_str("probe"),
            StrategyKind::Raw => f.write_str("raw"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "probe" => Ok(StrategyKind::Probe),
            "raw" => Ok(StrategyKind::Raw),
            other => Err(format!("unknown strategy '{}' (expected probe or raw)", other)),
        }
    }
}
