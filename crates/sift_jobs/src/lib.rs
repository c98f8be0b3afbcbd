//! Sift job core
//!
//! Long-running, cancellable jobs over an offline record store:
//!
//! - [`partition`]: splits an identifier space into scan chunks
//! - [`Job`]: the unit of work (run, progress, abort)
//! - [`ChunkedCountJob`]: parallel live-record count with pluggable
//!   [`ScanStrategy`]
//! - [`WorkerPool`]: reusable scan threads shared by every job
//! - [`JobRunner`]: single-slot background execution with non-blocking
//!   progress and blocking abort
//! - [`JobRegistry`]: name to factory lookup
//!
//! # Concurrency
//!
//! Sync only: std threads, std channels and atomics. The frontend thread never
//! runs job code. The runner's slot thread runs `Job::run()`, which fans out
//! onto the worker pool and waits for its lanes.

pub mod cancel;
pub mod chunked_count;
pub mod error;
pub mod job;
pub mod partition;
pub mod pool;
pub mod progress;
pub mod registry;
pub mod runner;
pub mod scan;
pub mod state;

pub use cancel::CancellationToken;
pub use chunked_count::{ChunkedCountConfig, ChunkedCountJob, DEFAULT_CANCEL_CHECK_INTERVAL};
pub use error::{BuildError, ExecutionError, PartitionError, RunnerError, WorkerFault};
pub use job::{Job, OutputSink};
pub use partition::{partition, uncovered_tail, ScanRange};
pub use pool::WorkerPool;
pub use progress::ProgressSnapshot;
pub use registry::{CountRecordsFactory, JobContext, JobFactory, JobRegistry};
pub use runner::{CompletionListener, JobHandle, JobId, JobReport, JobRunner};
pub use scan::{DirectRead, ExistenceProbe, ScanStrategy, StrategyKind};
pub use state::JobState;
