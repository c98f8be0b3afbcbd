//! Size-capped log file.
//!
//! `<name>.log` is appended to until it reaches the cap. It is then moved to
//! `<name>.log.old`, replacing the previous one, and a fresh file is started.
//! At most two files per app exist at any time.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub(crate) struct CappedLog {
    path: PathBuf,
    max_bytes: u64,
    file: File,
    len: u64,
}

impl CappedLog {
    pub(crate) fn open(dir: &Path, app_name: &str, max_bytes: u64) -> io::Result<Self> {
        let path = dir.join(format!("{}.log", app_name));
        let (file, len) = open_append(&path)?;
        let mut log = Self {
            path,
            max_bytes,
            file,
            len,
        };
        if log.len >= log.max_bytes {
            log.start_over()?;
        }
        Ok(log)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn start_over(&mut self) -> io::Result<()> {
        self.file.flush()?;
        fs::rename(&self.path, self.path.with_extension("log.old"))?;
        let (file, len) = open_append(&self.path)?;
        self.file = file;
        self.len = len;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

impl Write for CappedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // One event is never split across files.
        if self.len > 0 && self.len + buf.len() as u64 > self.max_bytes {
            self.start_over()?;
        }
        let n = self.file.write(buf)?;
        self.len += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Cloneable `MakeWriter` over one [`CappedLog`].
#[derive(Clone)]
pub(crate) struct LogFileWriter(Arc<Mutex<CappedLog>>);

impl LogFileWriter {
    pub(crate) fn new(log: CappedLog) -> Self {
        Self(Arc::new(Mutex::new(log)))
    }
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogFileWriter {
    type Writer = LogFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
