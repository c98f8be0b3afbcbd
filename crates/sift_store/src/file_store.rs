//! File-backed record store
//!
//! Reads are positional (`pread` on unix, `seek_read` on windows), so any
//! number of scan workers can share one `FileStore` without serializing on a
//! file cursor.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::record::{RawRecord, Record, RecordKind, RECORD_SIZE};
use crate::RecordStore;

/// One kind's record file. `file` is `None` when the kind has no records.
#[derive(Debug)]
struct RecordFile {
    path: PathBuf,
    file: Option<File>,
    high_id: u64,
}

impl RecordFile {
    fn open(dir: &Path, kind: RecordKind) -> Result<Self> {
        let path = dir.join(kind.file_name());
        if !path.exists() {
            debug!(kind = %kind, path = %path.display(), "No record file, treating kind as empty");
            return Ok(Self {
                path,
                file: None,
                high_id: 0,
            });
        }

        let file = File::open(&path).map_err(|e| StoreError::io(&path, e))?;
        let len = file.metadata().map_err(|e| StoreError::io(&path, e))?.len();
        let record_size = RECORD_SIZE as u64;
        if len % record_size != 0 {
            warn!(
                kind = %kind,
                path = %path.display(),
                trailing_bytes = len % record_size,
                "Record file ends in a partial record; ignoring the tail"
            );
        }

        Ok(Self {
            path,
            file: Some(file),
            high_id: len / record_size,
        })
    }

    fn read(&self, kind: RecordKind, id: u64) -> Result<RawRecord> {
        let file = match (&self.file, id < self.high_id) {
            (Some(file), true) => file,
            _ => {
                return Err(StoreError::io(
                    &self.path,
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("{} {} is beyond high id {}", kind, id, self.high_id),
                    ),
                ))
            }
        };

        let mut buf = [0u8; RECORD_SIZE];
        read_exact_at(file, &mut buf, id * RECORD_SIZE as u64)
            .map_err(|e| StoreError::io(&self.path, e))?;
        RawRecord::decode(kind, id, &buf)
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.seek_read(&mut buf[filled..], offset + filled as u64)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "record file truncated",
            ));
        }
        filled += n;
    }
    Ok(())
}

/// An opened store directory
#[derive(Debug)]
pub struct FileStore {
    config: StoreConfig,
    nodes: RecordFile,
    relationships: RecordFile,
}

impl FileStore {
    /// Open the store rooted at `dir`.
    ///
    /// The directory must exist. Missing record files are treated as empty
    /// kinds; a present but malformed `store.toml` is an error.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(StoreError::MissingStore { path: root });
        }

        let config = StoreConfig::load_from_dir(&root)?;
        let nodes = RecordFile::open(&root, RecordKind::Node)?;
        let relationships = RecordFile::open(&root, RecordKind::Relationship)?;

        debug!(
            store = %root.display(),
            nodes = nodes.high_id,
            relationships = relationships.high_id,
            "Opened store"
        );

        Ok(Self {
            config,
            nodes,
            relationships,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn file(&self, kind: RecordKind) -> &RecordFile {
        match kind {
            RecordKind::Node => &self.nodes,
            RecordKind::Relationship => &self.relationships,
        }
    }
}

impl RecordStore for FileStore {
    fn high_id(&self, kind: RecordKind) -> Result<u64> {
        Ok(self.file(kind).high_id)
    }

    fn fetch_by_id(&self, kind: RecordKind, id: u64) -> Result<Record> {
        let file = self.file(kind);
        if id >= file.high_id {
            return Err(StoreError::not_found(kind, id));
        }
        file.read(kind, id)?
            .into_live()
            .ok_or_else(|| StoreError::not_found(kind, id))
    }

    fn raw_record_at(&self, kind: RecordKind, id: u64) -> Result<RawRecord> {
        self.file(kind).read(kind, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StoreBuilder;

    fn write_records(dir: &Path, kind: RecordKind, live: &[bool]) {
        let mut bytes = Vec::with_capacity(live.len() * RECORD_SIZE);
        for (id, in_use) in live.iter().enumerate() {
            let raw = RawRecord {
                kind,
                id: id as u64,
                in_use: *in_use,
                payload: id as u64 * 10,
            };
            bytes.extend_from_slice(&raw.encode());
        }
        std::fs::write(dir.join(kind.file_name()), bytes).unwrap();
    }

    #[test]
    fn test_open_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileStore::open(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, StoreError::MissingStore { .. }));
    }

    #[test]
    fn test_empty_directory_has_no_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.high_id(RecordKind::Node).unwrap(), 0);
        assert_eq!(store.high_id(RecordKind::Relationship).unwrap(), 0);
        assert!(store.fetch_by_id(RecordKind::Node, 0).unwrap_err().is_not_found());
    }

    #[test]
    fn test_fetch_and_raw_read() {
        let dir = tempfile::tempdir().unwrap();
        write_records(dir.path(), RecordKind::Node, &[true, false, true]);
        let store = FileStore::open(dir.path()).unwrap();

        assert_eq!(store.high_id(RecordKind::Node).unwrap(), 3);

        let rec = store.fetch_by_id(RecordKind::Node, 2).unwrap();
        assert_eq!(rec.payload, 20);
        assert!(store.fetch_by_id(RecordKind::Node, 1).unwrap_err().is_not_found());
        assert!(store.fetch_by_id(RecordKind::Node, 3).unwrap_err().is_not_found());

        let raw = store.raw_record_at(RecordKind::Node, 1).unwrap();
        assert!(!raw.in_use);
        assert_eq!(raw.payload, 10);
    }

    #[test]
    fn test_raw_read_past_end_is_io_fault() {
        let dir = tempfile::tempdir().unwrap();
        write_records(dir.path(), RecordKind::Node, &[true]);
        let store = FileStore::open(dir.path()).unwrap();
        let err = store.raw_record_at(RecordKind::Node, 5).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_partial_tail_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_records(dir.path(), RecordKind::Node, &[true, true]);
        let path = dir.path().join(RecordKind::Node.file_name());
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(&[1, 0, 0]);
        std::fs::write(&path, bytes).unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.high_id(RecordKind::Node).unwrap(), 2);
    }

    #[test]
    fn test_shared_across_threads() {
        let dir = tempfile::tempdir().unwrap();
        StoreBuilder::new(dir.path())
            .nodes(1_000)
            .live_ratio(1.0)
            .build()
            .unwrap();
        let store = std::sync::Arc::new(FileStore::open(dir.path()).unwrap());

        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    (t * 250..(t + 1) * 250)
                        .filter(|id| store.fetch_by_id(RecordKind::Node, *id).is_ok())
                        .count()
                })
            })
            .collect();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 1_000);
    }
}
