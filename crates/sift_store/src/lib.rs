//! Sift record store.
//!
//! An offline store is a directory holding one fixed-size record file per
//! [`RecordKind`] plus an optional `store.toml`. Jobs only ever read it, so a
//! single [`FileStore`] is shared by reference across every scan worker.
//!
//! Two access paths exist on purpose:
//! - [`RecordStore::fetch_by_id`] is the public lookup. It hides records whose
//!   in-use flag is clear behind [`StoreError::NotFound`].
//! - [`RecordStore::raw_record_at`] is the storage-layer read. It returns the
//!   record as written, in-use flag included.

pub mod builder;
pub mod config;
pub mod error;
pub mod file_store;
pub mod record;

pub use builder::{BuildSummary, StoreBuilder};
pub use config::{StoreConfig, FORMAT_VERSION, STORE_CONFIG_FILE};
pub use error::{Result, StoreError};
pub use file_store::FileStore;
pub use record::{RawRecord, Record, RecordKind, RECORD_SIZE};

/// Read access to an offline record store.
///
/// Implementations must be safe to share across scan workers: every method
/// takes `&self` and must not rely on a shared file cursor.
pub trait RecordStore: Send + Sync {
    /// One past the highest record slot ever allocated for `kind`.
    ///
    /// This is the exclusive upper bound of the identifier space a full scan
    /// has to cover. Slots below it may or may not hold a live record.
    fn high_id(&self, kind: RecordKind) -> Result<u64>;

    /// Look up a live record through the public API.
    ///
    /// Returns [`StoreError::NotFound`] for ids outside `[0, high_id)` and for
    /// slots whose in-use flag is clear.
    fn fetch_by_id(&self, kind: RecordKind, id: u64) -> Result<Record>;

    /// Read the raw record stored in slot `id`, live or not.
    fn raw_record_at(&self, kind: RecordKind, id: u64) -> Result<RawRecord>;
}

impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    fn high_id(&self, kind: RecordKind) -> Result<u64> {
        (**self).high_id(kind)
    }

    fn fetch_by_id(&self, kind: RecordKind, id: u64) -> Result<Record> {
        (**self).fetch_by_id(kind, id)
    }

    fn raw_record_at(&self, kind: RecordKind, id: u64) -> Result<RawRecord> {
        (**self).raw_record_at(kind, id)
    }
}
