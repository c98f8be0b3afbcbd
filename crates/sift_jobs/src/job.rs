use std::io::{self, Write};
use std::sync::Mutex;

use crate::error::ExecutionError;
use crate::progress::ProgressSnapshot;
use crate::state::JobState;

/// Write-only text sink a job renders its progress into.
pub type OutputSink = Box<dyn Write + Send>;

/// A cancellable, progress-reporting unit of work.
///
/// All methods take `&self`: the runner's slot thread is inside `run()` while
/// the frontend calls `progress()` and `request_abort()` from its own thread.
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    /// Do the work on the calling thread.
    ///
    /// Returns the terminal state ([`JobState::Completed`] or
    /// [`JobState::Aborted`]) on a normal return; a fault leaves the job
    /// [`JobState::Failed`] and comes back as the error. A job runs at most
    /// once: a second call fails with [`ExecutionError::AlreadyStarted`].
    /// Accepts a job already moved to Running by [`Job::mark_submitted`].
    fn run(&self) -> Result<JobState, ExecutionError>;

    /// `Created → Running`, done by the runner as it accepts the job.
    /// On failure returns the state actually held.
    fn mark_submitted(&self) -> Result<(), JobState>;

    /// Settle a job whose `run()` unwound or never got to execute.
    /// No effect once the job is terminal.
    fn mark_failed(&self);

    /// Never blocks. Zeroed before `run()`, final after termination.
    fn progress(&self) -> ProgressSnapshot;

    /// Set the job's cancellation token. Idempotent and non-blocking.
    fn request_abort(&self);

    fn state(&self) -> JobState;

    /// Render the current progress to the job's output sink.
    fn report(&self) -> io::Result<()>;
}

/// Shared, lock-guarded [`OutputSink`].
pub struct SinkWriter {
    inner: Mutex<OutputSink>,
}

impl SinkWriter {
    pub fn new(sink: OutputSink) -> Self {
        Self {
            inner: Mutex::new(sink),
        }
    }

    pub fn write_progress(&self, snapshot: &ProgressSnapshot) -> io::Result<()> {
        let mut sink = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "output sink lock poisoned"))?;
        writeln!(sink, "{}", snapshot)?;
        sink.flush()
    }
}

impl std::fmt::Debug for SinkWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkWriter").finish_non_exhaustive()
    }
}
