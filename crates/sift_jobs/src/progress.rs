use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Point-in-time view of a job's workers and running tally.
///
/// Renders as the three operator-facing lines:
///
/// ```text
/// Total threads: 4
/// Running threads: 1
/// Tally so far: 75
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub total_workers: usize,
    pub active_workers: usize,
    pub tally: u64,
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total threads: {}", self.total_workers)?;
        writeln!(f, "Running threads: {}", self.active_workers)?;
        write!(f, "Tally so far: {}", self.tally)
    }
}

/// Atomic counters behind [`ProgressSnapshot`].
///
/// `total` is published before `active` and read after it, so a snapshot
/// never shows more active workers than total workers.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    total: AtomicUsize,
    active: AtomicUsize,
    tally: AtomicU64,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, workers: usize) {
        self.total.store(workers, Ordering::SeqCst);
        self.active.store(workers, Ordering::SeqCst);
    }

    /// Publish `workers` that have nothing to do: none is ever active.
    pub fn begin_idle(&self, workers: usize) {
        self.active.store(0, Ordering::SeqCst);
        self.total.store(workers, Ordering::SeqCst);
    }

    /// Retire one worker and fold its local count into the tally.
    pub fn worker_done(&self, local_count: u64) {
        self.tally.fetch_add(local_count, Ordering::SeqCst);
        // Saturate: a stray extra call must not wrap.
        let _ = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let active = self.active.load(Ordering::SeqCst);
        let tally = self.tally.load(Ordering::SeqCst);
        let total = self.total.load(Ordering::SeqCst);
        ProgressSnapshot {
            total_workers: total,
            active_workers: active.min(total),
            tally,
        }
    }
}
