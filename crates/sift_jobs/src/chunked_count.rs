//! Parallel live-record count over one record kind.
//!
//! The identifier space `[0, high_id)` is split into chunks with
//! [`partition`]. Up to `threads` lanes run on the shared [`WorkerPool`]; each
//! lane claims the next unscanned chunk from an atomic cursor, scans it with
//! the configured [`ScanStrategy`], then folds the chunk's local count into
//! the shared tally. Progress counts chunks, so `Running threads` is the
//! number of chunks not yet finished.
//!
//! Every lane polls the cancellation token every `check_interval` ids. Once
//! cancelled, the chunk in hand stops early and keeps its partial count,
//! and chunks nobody has claimed yet are retired without being scanned.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use sift_store::{RecordKind, RecordStore};

use crate::cancel::CancellationToken;
use crate::error::{ExecutionError, WorkerFault};
use crate::job::{Job, OutputSink, SinkWriter};
use crate::partition::{partition, uncovered_tail, ScanRange};
use crate::pool::{lock, panic_message, Latch, LatchGuard, WorkerPool};
use crate::progress::{ProgressCounters, ProgressSnapshot};
use crate::scan::ScanStrategy;
use crate::state::{JobState, StateCell};

/// Default number of ids scanned between two cancellation checks.
pub const DEFAULT_CANCEL_CHECK_INTERVAL: u64 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkedCountConfig {
    pub kind: RecordKind,
    /// Concurrent scan lanes requested. Clamped to the pool size.
    pub threads: usize,
    pub chunks: usize,
    pub check_interval: u64,
}

impl ChunkedCountConfig {
    pub fn new(kind: RecordKind, threads: usize) -> Self {
        Self {
            kind,
            threads,
            chunks: threads,
            check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
        }
    }

    pub fn chunks(mut self, chunks: usize) -> Self {
        self.chunks = chunks;
        self
    }

    pub fn check_interval(mut self, every: u64) -> Self {
        self.check_interval = every;
        self
    }
}

pub struct ChunkedCountJob {
    name: String,
    config: ChunkedCountConfig,
    store: Arc<dyn RecordStore>,
    strategy: Arc<dyn ScanStrategy>,
    pool: Arc<WorkerPool>,
    cancel: CancellationToken,
    state: StateCell,
    progress: Arc<ProgressCounters>,
    chunk_counts: Mutex<Vec<u64>>,
    out: SinkWriter,
}

impl ChunkedCountJob {
    pub fn new(
        name: impl Into<String>,
        config: ChunkedCountConfig,
        store: Arc<dyn RecordStore>,
        strategy: Arc<dyn ScanStrategy>,
        pool: Arc<WorkerPool>,
        out: OutputSink,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            store,
            strategy,
            pool,
            cancel: CancellationToken::new(),
            state: StateCell::new(),
            progress: Arc::new(ProgressCounters::new()),
            chunk_counts: Mutex::new(Vec::new()),
            out: SinkWriter::new(out),
        }
    }

    pub fn config(&self) -> &ChunkedCountConfig {
        &self.config
    }

    /// Local count of every chunk, in chunk order, once `run()` has returned.
    /// Faulted chunks report 0.
    pub fn chunk_counts(&self) -> Vec<u64> {
        lock(&self.chunk_counts).clone()
    }

    fn execute(&self) -> Result<JobState, ExecutionError> {
        let kind = self.config.kind;
        let extent = self.store.high_id(kind)?;
        let ranges = partition(extent, self.config.chunks)?;

        let tail = uncovered_tail(extent, ranges.len());
        if tail > 0 {
            debug!(
                job = %self.name,
                extent,
                chunks = ranges.len(),
                unscanned = tail,
                "Chunk size does not divide the extent; tail ids are not scanned"
            );
        }

        let lanes = self.lane_count(ranges.len());
        info!(
            job = %self.name,
            %kind,
            extent,
            chunks = ranges.len(),
            lanes,
            strategy = self.strategy.name(),
            "Scan started"
        );

        let scan = Arc::new(Scan {
            kind,
            store: Arc::clone(&self.store),
            strategy: Arc::clone(&self.strategy),
            cancel: self.cancel.clone(),
            progress: Arc::clone(&self.progress),
            check_interval: self.config.check_interval.max(1),
            local_counts: ranges.iter().map(|_| AtomicU64::new(0)).collect(),
            ranges,
            cursor: AtomicUsize::new(0),
            cancel_observed: AtomicBool::new(false),
            first_fault: Mutex::new(None),
        });
        if extent == 0 {
            // Nothing to scan: no chunk is ever running.
            self.progress.begin_idle(scan.ranges.len());
            if self.cancel.is_cancelled() {
                scan.cancel_observed.store(true, Ordering::SeqCst);
            }
        } else {
            self.progress.begin(scan.ranges.len());
            self.fan_out(&scan, lanes)?;
        }

        *lock(&self.chunk_counts) = scan
            .local_counts
            .iter()
            .map(|c| c.load(Ordering::SeqCst))
            .collect();

        if let Some(fault) = lock(&scan.first_fault).take() {
            return Err(fault.into());
        }
        if scan.cancel_observed.load(Ordering::SeqCst) {
            Ok(JobState::Aborted)
        } else {
            Ok(JobState::Completed)
        }
    }

    fn lane_count(&self, chunks: usize) -> usize {
        let pool_size = self.pool.size();
        let requested = self.config.threads.max(1);
        if requested > pool_size {
            warn!(
                job = %self.name,
                requested,
                pool_size,
                "Requested more threads than the worker pool holds; clamping"
            );
        }
        requested.min(pool_size).min(chunks).max(1)
    }

    /// Submit `lanes` lanes to the pool and wait for all of them.
    fn fan_out(&self, scan: &Arc<Scan>, lanes: usize) -> Result<(), ExecutionError> {
        let latch = Arc::new(Latch::new(lanes));
        let mut submit_error = None;

        for lane in 0..lanes {
            let guard = LatchGuard(Arc::clone(&latch));
            let scan_for_lane = Arc::clone(scan);
            let submitted = self.pool.execute(move || {
                let _guard = guard;
                scan_for_lane.run_lane(lane);
            });
            if let Err(e) = submitted {
                // The rejected closure already dropped its guard. Cancel the
                // lanes that did start so the wait below is short.
                self.cancel.cancel();
                submit_error = Some(e);
                for _ in lane + 1..lanes {
                    latch.count_down();
                }
                break;
            }
        }

        latch.wait();
        match submit_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Job for ChunkedCountJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> Result<JobState, ExecutionError> {
        self.state.enter().map_err(ExecutionError::AlreadyStarted)?;

        let result = self.execute();
        let terminal = match &result {
            Ok(state) => *state,
            Err(_) => JobState::Failed,
        };
        if let Err(actual) = self.state.finish(terminal) {
            warn!(job = %self.name, ?actual, "Job state changed underneath the scan");
        }
        result
    }

    fn mark_submitted(&self) -> Result<(), JobState> {
        self.state.start()
    }

    fn mark_failed(&self) {
        if self.state.finish(JobState::Failed).is_ok() {
            warn!(job = %self.name, "Job marked failed without a normal return");
        }
    }

    fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    fn request_abort(&self) {
        if self.cancel.cancel() {
            debug!(job = %self.name, "Abort requested");
        }
    }

    fn state(&self) -> JobState {
        self.state.get()
    }

    fn report(&self) -> io::Result<()> {
        self.out.write_progress(&self.progress())
    }
}

impl std::fmt::Debug for ChunkedCountJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedCountJob")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("strategy", &self.strategy.name())
            .field("state", &self.state.get())
            .finish()
    }
}

/// State shared by every lane of one run.
struct Scan {
    kind: RecordKind,
    store: Arc<dyn RecordStore>,
    strategy: Arc<dyn ScanStrategy>,
    cancel: CancellationToken,
    progress: Arc<ProgressCounters>,
    check_interval: u64,
    ranges: Vec<ScanRange>,
    local_counts: Vec<AtomicU64>,
    cursor: AtomicUsize,
    cancel_observed: AtomicBool,
    first_fault: Mutex<Option<WorkerFault>>,
}

enum ChunkEnd {
    Finished,
    Cancelled,
    Faulted(WorkerFault),
}

impl Scan {
    fn run_lane(&self, lane: usize) {
        loop {
            let chunk = self.cursor.fetch_add(1, Ordering::SeqCst);
            let Some(range) = self.ranges.get(chunk).copied() else {
                break;
            };

            if self.cancel.is_cancelled() {
                self.cancel_observed.store(true, Ordering::SeqCst);
                self.progress.worker_done(0);
                continue;
            }

            let (live, end) = match panic::catch_unwind(AssertUnwindSafe(|| {
                self.scan_chunk(chunk, range)
            })) {
                Ok(outcome) => outcome,
                Err(payload) => (
                    0,
                    ChunkEnd::Faulted(WorkerFault {
                        chunk,
                        range,
                        id: None,
                        message: format!("scan panicked: {}", panic_message(&*payload)),
                    }),
                ),
            };

            match end {
                ChunkEnd::Finished => {
                    debug!(lane, chunk, %range, live, "Chunk finished");
                    self.complete_chunk(chunk, live);
                }
                ChunkEnd::Cancelled => {
                    debug!(lane, chunk, %range, live, "Chunk cancelled");
                    self.cancel_observed.store(true, Ordering::SeqCst);
                    self.complete_chunk(chunk, live);
                }
                ChunkEnd::Faulted(fault) => {
                    warn!(lane, chunk, %range, error = %fault.message, "Chunk failed");
                    lock(&self.first_fault).get_or_insert(fault);
                    self.progress.worker_done(0);
                }
            }
        }
    }

    fn complete_chunk(&self, chunk: usize, live: u64) {
        self.local_counts[chunk].store(live, Ordering::SeqCst);
        self.progress.worker_done(live);
    }

    fn scan_chunk(&self, chunk: usize, range: ScanRange) -> (u64, ChunkEnd) {
        let store: &dyn RecordStore = &*self.store;
        let mut live = 0u64;

        for id in range.ids() {
            if (id - range.start) % self.check_interval == 0 && self.cancel.is_cancelled() {
                return (live, ChunkEnd::Cancelled);
            }
            match self.strategy.is_live(store, self.kind, id) {
                Ok(true) => live += 1,
                Ok(false) => {}
                Err(e) => {
                    let fault = WorkerFault {
                        chunk,
                        range,
                        id: Some(id),
                        message: e.to_string(),
                    };
                    return (live, ChunkEnd::Faulted(fault));
                }
            }
        }

        (live, ChunkEnd::Finished)
    }
}
