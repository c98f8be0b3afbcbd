//! Splitting an identifier space into scan chunks.

use std::fmt;

use crate::error::PartitionError;

/// Half-open identifier range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanRange {
    pub start: u64,
    pub end: u64,
}

impl ScanRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> std::ops::Range<u64> {
        self.start..self.end
    }
}

impl fmt::Display for ScanRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Split `[0, extent)` into exactly `chunk_count` equal ranges.
///
/// Every range is `floor(extent / chunk_count)` ids wide. When `extent` is not
/// a multiple of `chunk_count` the last `extent % chunk_count` ids fall after
/// the final range and are not covered; callers that need full coverage must
/// pick a chunk count that divides the extent. With more chunks than ids every
/// range is empty.
pub fn partition(extent: u64, chunk_count: usize) -> Result<Vec<ScanRange>, PartitionError> {
    if chunk_count == 0 {
        return Err(PartitionError::ZeroChunks);
    }
    let per_chunk = extent / chunk_count as u64;
    Ok((0..chunk_count as u64)
        .map(|i| ScanRange::new(i * per_chunk, (i + 1) * per_chunk))
        .collect())
}

/// Ids in `[0, extent)` that [`partition`] leaves outside every range.
pub fn uncovered_tail(extent: u64, chunk_count: usize) -> u64 {
    match chunk_count {
        0 => extent,
        n => extent % n as u64,
    }
}
