//! Store creation for demos and tests.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{StoreConfig, FORMAT_VERSION};
use crate::error::{Result, StoreError};
use crate::record::{RawRecord, RecordKind};

const DEFAULT_SEED: u64 = 42;

/// Summary of a freshly written store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub nodes: u64,
    pub live_nodes: u64,
    pub relationships: u64,
    pub live_relationships: u64,
}

/// Writes a new store directory with a seeded liveness pattern.
///
/// The same seed and counts always produce byte-identical record files.
#[derive(Debug, Clone)]
pub struct StoreBuilder {
    root: PathBuf,
    nodes: u64,
    relationships: u64,
    live_ratio: f64,
    seed: u64,
    description: Option<String>,
}

impl StoreBuilder {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            nodes: 0,
            relationships: 0,
            live_ratio: 1.0,
            seed: DEFAULT_SEED,
            description: None,
        }
    }

    pub fn nodes(mut self, count: u64) -> Self {
        self.nodes = count;
        self
    }

    pub fn relationships(mut self, count: u64) -> Self {
        self.relationships = count;
        self
    }

    /// Fraction of slots marked in use, clamped to `[0.0, 1.0]`.
    pub fn live_ratio(mut self, ratio: f64) -> Self {
        self.live_ratio = if ratio.is_nan() {
            0.0
        } else {
            ratio.clamp(0.0, 1.0)
        };
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn build(self) -> Result<BuildSummary> {
        std::fs::create_dir_all(&self.root).map_err(|e| StoreError::io(&self.root, e))?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let live_nodes = self.write_kind(RecordKind::Node, self.nodes, &mut rng)?;
        let live_relationships =
            self.write_kind(RecordKind::Relationship, self.relationships, &mut rng)?;

        StoreConfig {
            format_version: FORMAT_VERSION,
            description: self.description.clone(),
        }
        .save_to_dir(&self.root)?;

        let summary = BuildSummary {
            nodes: self.nodes,
            live_nodes,
            relationships: self.relationships,
            live_relationships,
        };
        info!(
            store = %self.root.display(),
            nodes = summary.nodes,
            live_nodes = summary.live_nodes,
            relationships = summary.relationships,
            live_relationships = summary.live_relationships,
            "Wrote store"
        );
        Ok(summary)
    }

    fn write_kind(&self, kind: RecordKind, count: u64, rng: &mut ChaCha8Rng) -> Result<u64> {
        let path = self.root.join(kind.file_name());
        let file = File::create(&path).map_err(|e| StoreError::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        let mut live = 0u64;

        for id in 0..count {
            let in_use = rng.gen_bool(self.live_ratio);
            if in_use {
                live += 1;
            }
            let raw = RawRecord {
                kind,
                id,
                in_use,
                payload: rng.gen(),
            };
            writer
                .write_all(&raw.encode())
                .map_err(|e| StoreError::io(&path, e))?;
        }

        writer.flush().map_err(|e| StoreError::io(&path, e))?;
        Ok(live)
    }
}
