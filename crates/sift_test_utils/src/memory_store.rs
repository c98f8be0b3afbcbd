//! In-memory [`RecordStore`] with injectable faults and read latency.

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sift_store::{RawRecord, Record, RecordKind, RecordStore, Result, StoreError};
use tracing::trace;

#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: Vec<bool>,
    relationships: Vec<bool>,
    faults: HashSet<(RecordKind, u64)>,
    latency: Option<Duration>,
    reads: AtomicU64,
}

impl MemoryStore {
    pub fn builder() -> MemoryStoreBuilder {
        MemoryStoreBuilder::default()
    }

    /// `count` live nodes and nothing else.
    pub fn with_live_nodes(count: u64) -> Self {
        Self::builder().live_nodes(count).build()
    }

    /// Number of record reads served so far, faults included.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    fn slots(&self, kind: RecordKind) -> &[bool] {
        match kind {
            RecordKind::Node => &self.nodes,
            RecordKind::Relationship => &self.relationships,
        }
    }

    fn touch(&self, kind: RecordKind, id: u64) -> Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        if self.faults.contains(&(kind, id)) {
            trace!(%kind, id, "Injected fault");
            return Err(StoreError::io(
                "memory",
                io::Error::new(io::ErrorKind::Other, format!("injected fault at {} {}", kind, id)),
            ));
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn high_id(&self, kind: RecordKind) -> Result<u64> {
        Ok(self.slots(kind).len() as u64)
    }

    fn fetch_by_id(&self, kind: RecordKind, id: u64) -> Result<Record> {
        self.touch(kind, id)?;
        match self.slots(kind).get(id as usize) {
            Some(true) => Ok(Record {
                kind,
                id,
                payload: id,
            }),
            _ => Err(StoreError::not_found(kind, id)),
        }
    }

    fn raw_record_at(&self, kind: RecordKind, id: u64) -> Result<RawRecord> {
        self.touch(kind, id)?;
        match self.slots(kind).get(id as usize) {
            Some(in_use) => Ok(RawRecord {
                kind,
                id,
                in_use: *in_use,
                payload: id,
            }),
            None => Err(StoreError::io(
                "memory",
                io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of store"),
            )),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStoreBuilder {
    store: MemoryStore,
}

impl MemoryStoreBuilder {
    pub fn nodes(mut self, live: &[bool]) -> Self {
        self.store.nodes = live.to_vec();
        self
    }

    pub fn relationships(mut self, live: &[bool]) -> Self {
        self.store.relationships = live.to_vec();
        self
    }

    pub fn live_nodes(mut self, count: u64) -> Self {
        self.store.nodes = vec![true; count as usize];
        self
    }

    /// Every `every`-th node (ids 0, every, 2*every, ...) is live.
    pub fn sparse_nodes(mut self, count: u64, every: u64) -> Self {
        let every = every.max(1);
        self.store.nodes = (0..count).map(|id| id % every == 0).collect();
        self
    }

    /// Reads of `(kind, id)` fail with a non-not-found error.
    pub fn fail_at(mut self, kind: RecordKind, id: u64) -> Self {
        self.store.faults.insert((kind, id));
        self
    }

    /// Sleep this long on every read.
    pub fn read_latency(mut self, latency: Duration) -> Self {
        self.store.latency = Some(latency);
        self
    }

    pub fn build(self) -> MemoryStore {
        self.store
    }
}
