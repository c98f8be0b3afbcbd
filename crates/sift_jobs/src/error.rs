use std::fmt;
use thiserror::Error;

use sift_store::StoreError;

use crate::partition::ScanRange;
use crate::state::JobState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("chunk count must be at least 1")]
    ZeroChunks,
}

/// A single scan worker's unrecoverable failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFault {
    pub chunk: usize,
    pub range: ScanRange,
    /// Identifier being examined, when the fault happened at one.
    pub id: Option<u64>,
    pub message: String,
}

impl fmt::Display for WorkerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker for chunk {} {} failed", self.chunk, self.range)?;
        if let Some(id) = self.id {
            write!(f, " at id {}", id)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for WorkerFault {}

/// Why a job's `run()` did not return normally.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Worker(#[from] WorkerFault),

    #[error("job has already been started (state: {0})")]
    AlreadyStarted(JobState),

    #[error("worker pool is shut down")]
    PoolClosed,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("job '{running}' is still running; abort it or wait for it to finish")]
    Busy { running: String },

    #[error("job '{name}' cannot be submitted: it is already {state}")]
    NotRunnable { name: String, state: JobState },

    #[error("no job has been run yet")]
    NoJob,

    #[error("job slot thread has stopped")]
    SlotClosed,
}

/// Rejected job arguments. Reported before any work starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("missing argument <{name}>")]
    MissingArgument { name: &'static str },

    #[error("invalid value '{value}' for <{name}>: {reason}")]
    InvalidArgument {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("too many arguments: expected at most {max}, got {got}")]
    TooManyArguments { max: usize, got: usize },

    #[error(transparent)]
    Partition(#[from] PartitionError),
}
