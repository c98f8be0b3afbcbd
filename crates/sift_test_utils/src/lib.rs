//! Sift test utilities
//!
//! - [`MemoryStore`]: a record store double with deterministic liveness,
//!   injected faults and per-read latency.
//! - [`temp_store`]: a real on-disk store in a temp directory.
//! - [`SharedBuffer`]: a cloneable output sink for asserting on job reports.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sift_test_utils::MemoryStore;
//! use std::time::Duration;
//!
//! let store = MemoryStore::builder()
//!     .live_nodes(10_000)
//!     .fail_at(RecordKind::Node, 42)
//!     .read_latency(Duration::from_micros(50))
//!     .build();
//! ```

pub mod memory_store;

pub use memory_store::{MemoryStore, MemoryStoreBuilder};

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use sift_store::{FileStore, StoreBuilder};
use tempfile::TempDir;

/// Build an on-disk store of `nodes` node records in a fresh temp dir.
///
/// The `TempDir` must outlive the store.
pub fn temp_store(nodes: u64, live_ratio: f64) -> (TempDir, FileStore) {
    let dir = tempfile::tempdir().expect("create temp dir");
    StoreBuilder::new(dir.path())
        .nodes(nodes)
        .live_ratio(live_ratio)
        .build()
        .expect("build temp store");
    let store = FileStore::open(dir.path()).expect("open temp store");
    (dir, store)
}

/// Cloneable in-memory writer. Every clone appends to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let bytes = self.inner.lock().expect("buffer lock").clone();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "buffer lock poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
