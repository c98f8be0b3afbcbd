//! Single-slot job runner.
//!
//! A dedicated `sift-job-slot` thread receives submissions over a std channel
//! and calls `Job::run()` on each. The caller's thread never runs job code:
//! `run()` returns a [`JobHandle`] immediately, `progress()` reads the job's
//! counters, and `abort()` signals the job and then waits for the slot to
//! report completion.
//!
//! # Lock invariant
//!
//! `current` is held only to swap or clone the in-flight entry, never while
//! a job runs or while waiting for one.

use chrono::{DateTime, Utc};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::RunnerError;
use crate::job::Job;
use crate::pool::{lock, panic_message};
use crate::progress::ProgressSnapshot;
use crate::state::JobState;

/// Per-runner sequence number of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one job run.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub id: JobId,
    pub name: String,
    pub state: JobState,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// First captured fault, for [`JobState::Failed`].
    pub fault: Option<String>,
    pub progress: ProgressSnapshot,
}

impl JobReport {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// Called on the slot thread after every job, once its report is stored.
pub type CompletionListener = Box<dyn Fn(&JobReport) + Send + Sync>;

#[derive(Default)]
struct Completion {
    report: Mutex<Option<JobReport>>,
    cv: Condvar,
}

impl Completion {
    fn finish(&self, report: JobReport) {
        *lock(&self.report) = Some(report);
        self.cv.notify_all();
    }

    fn get(&self) -> Option<JobReport> {
        lock(&self.report).clone()
    }

    fn wait(&self) -> JobReport {
        let mut report = lock(&self.report);
        loop {
            if let Some(done) = report.as_ref() {
                return done.clone();
            }
            report = self
                .cv
                .wait(report)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn wait_timeout(&self, timeout: Duration) -> Option<JobReport> {
        let report = lock(&self.report);
        let (report, _) = self
            .cv
            .wait_timeout_while(report, timeout, |r| r.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        report.clone()
    }
}

struct Submission {
    id: JobId,
    job: Arc<dyn Job>,
    done: Arc<Completion>,
}

/// Handle to one submitted job.
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    job: Arc<dyn Job>,
    done: Arc<Completion>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.job.name()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.job.progress()
    }

    pub fn job(&self) -> &Arc<dyn Job> {
        &self.job
    }

    pub fn is_finished(&self) -> bool {
        self.done.get().is_some()
    }

    /// The final report, if the job has finished.
    pub fn report(&self) -> Option<JobReport> {
        self.done.get()
    }

    /// Block until the job finishes.
    pub fn wait(&self) -> JobReport {
        self.done.wait()
    }

    /// Like [`JobHandle::wait`], giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<JobReport> {
        self.done.wait_timeout(timeout)
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("name", &self.job.name())
            .field("finished", &self.is_finished())
            .finish()
    }
}

pub struct JobRunner {
    tx: Option<Sender<Submission>>,
    slot: Option<JoinHandle<()>>,
    current: Mutex<Option<JobHandle>>,
    next_id: AtomicU64,
}

impl JobRunner {
    pub fn new() -> std::io::Result<Self> {
        Self::spawn(None)
    }

    pub fn with_listener(listener: CompletionListener) -> std::io::Result<Self> {
        Self::spawn(Some(listener))
    }

    fn spawn(listener: Option<CompletionListener>) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let slot = thread::Builder::new()
            .name("sift-job-slot".to_string())
            .spawn(move || slot_loop(rx, listener))?;
        Ok(Self {
            tx: Some(tx),
            slot: Some(slot),
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    /// Submit `job` to the slot. Rejected while another job is unfinished.
    pub fn run(&self, job: Arc<dyn Job>) -> Result<JobHandle, RunnerError> {
        let mut current = lock(&self.current);
        if let Some(running) = current.as_ref().filter(|h| !h.is_finished()) {
            return Err(RunnerError::Busy {
                running: running.name().to_string(),
            });
        }

        let tx = self.tx.as_ref().ok_or(RunnerError::SlotClosed)?;
        job.mark_submitted()
            .map_err(|state| RunnerError::NotRunnable {
                name: job.name().to_string(),
                state,
            })?;

        let handle = JobHandle {
            id: JobId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            job,
            done: Arc::new(Completion::default()),
        };
        let submitted = tx.send(Submission {
            id: handle.id,
            job: Arc::clone(&handle.job),
            done: Arc::clone(&handle.done),
        });
        if submitted.is_err() {
            handle.job.mark_failed();
            return Err(RunnerError::SlotClosed);
        }

        debug!(job = %handle.name(), id = %handle.id, "Submitted job");
        *current = Some(handle.clone());
        Ok(handle)
    }

    /// Progress of the current or most recent job; `None` if none has run.
    pub fn progress(&self) -> Option<ProgressSnapshot> {
        lock(&self.current).as_ref().map(JobHandle::progress)
    }

    pub fn current(&self) -> Option<JobHandle> {
        lock(&self.current).clone()
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.current)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Report of the most recent job, once it has finished.
    pub fn last_report(&self) -> Option<JobReport> {
        lock(&self.current).as_ref().and_then(JobHandle::report)
    }

    /// Ask the current job to stop and block until it has.
    ///
    /// Returns the final report. A job that already finished is not touched;
    /// its report comes back as is.
    pub fn abort(&self) -> Result<JobReport, RunnerError> {
        let handle = self.current().ok_or(RunnerError::NoJob)?;
        if !handle.is_finished() {
            info!(job = %handle.name(), id = %handle.id, "Aborting job");
            handle.job.request_abort();
        }
        Ok(handle.wait())
    }
}

impl Drop for JobRunner {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.current).as_ref() {
            if !handle.is_finished() {
                handle.job.request_abort();
            }
        }
        drop(self.tx.take());
        if let Some(slot) = self.slot.take() {
            if slot.join().is_err() {
                error!("Job slot thread panicked");
            }
        }
    }
}

impl fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRunner")
            .field("current", &self.current())
            .finish()
    }
}

fn slot_loop(rx: Receiver<Submission>, listener: Option<CompletionListener>) {
    debug!("Job slot started");
    while let Ok(submission) = rx.recv() {
        let report = execute(&submission);
        submission.done.finish(report.clone());
        if let Some(listener) = &listener {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(&report))).is_err() {
                warn!(job = %report.name, "Completion listener panicked");
            }
        }
    }
    debug!("Job slot stopped (channel closed)");
}

fn execute(submission: &Submission) -> JobReport {
    let job = &submission.job;
    let name = job.name().to_string();
    let started_at = Utc::now();
    let start = Instant::now();
    info!(job = %name, id = %submission.id, "Job started");

    let (state, fault) = match panic::catch_unwind(AssertUnwindSafe(|| job.run())) {
        Ok(Ok(state)) => (state, None),
        Ok(Err(e)) => (JobState::Failed, Some(e.to_string())),
        Err(payload) => {
            job.mark_failed();
            (
                JobState::Failed,
                Some(format!("job panicked: {}", panic_message(&*payload))),
            )
        }
    };
    let elapsed = start.elapsed();
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;

    match (&state, &fault) {
        (JobState::Failed, Some(fault)) => {
            error!(job = %name, id = %submission.id, elapsed_ms, error = %fault, "Job failed")
        }
        (JobState::Aborted, _) => {
            info!(job = %name, id = %submission.id, elapsed_ms, "Job aborted")
        }
        _ => info!(job = %name, id = %submission.id, elapsed_ms, "Job finished"),
    }

    JobReport {
        id: submission.id,
        name,
        state,
        started_at,
        elapsed,
        fault,
        progress: job.progress(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use crate::state::StateCell;
    use crate::CancellationToken;
    use std::io;

    /// Spins until aborted or released.
    struct GateJob {
        cancel: CancellationToken,
        release: CancellationToken,
        state: StateCell,
        panic: bool,
    }

    impl GateJob {
        fn new() -> Self {
            Self {
                cancel: CancellationToken::new(),
                release: CancellationToken::new(),
                state: StateCell::new(),
                panic: false,
            }
        }
    }

    impl Job for GateJob {
        fn name(&self) -> &str {
            "gate"
        }

        fn run(&self) -> Result<JobState, ExecutionError> {
            self.state.enter().map_err(ExecutionError::AlreadyStarted)?;
            if self.panic {
                panic!("gate exploded");
            }
            loop {
                if self.cancel.is_cancelled() {
                    self.state.finish(JobState::Aborted).unwrap();
                    return Ok(JobState::Aborted);
                }
                if self.release.is_cancelled() {
                    self.state.finish(JobState::Completed).unwrap();
                    return Ok(JobState::Completed);
                }
                thread::sleep(Duration::from_millis(1));
            }
        }

        fn mark_submitted(&self) -> Result<(), JobState> {
            self.state.start()
        }

        fn mark_failed(&self) {
            let _ = self.state.finish(JobState::Failed);
        }

        fn progress(&self) -> ProgressSnapshot {
            ProgressSnapshot {
                total_workers: 1,
                active_workers: usize::from(!self.state.get().is_terminal()),
                tally: 7,
            }
        }

        fn request_abort(&self) {
            self.cancel.cancel();
        }

        fn state(&self) -> JobState {
            self.state.get()
        }

        fn report(&self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_no_job_yet() {
        let runner = JobRunner::new().unwrap();
        assert!(runner.progress().is_none());
        assert!(matches!(runner.abort(), Err(RunnerError::NoJob)));
        assert!(!runner.is_busy());
    }

    #[test]
    fn test_busy_while_running() {
        let runner = JobRunner::new().unwrap();
        let first = Arc::new(GateJob::new());
        let handle = runner.run(first.clone()).unwrap();

        let err = runner.run(Arc::new(GateJob::new())).unwrap_err();
        assert!(matches!(err, RunnerError::Busy { ref running } if running == "gate"));

        first.release.cancel();
        let report = handle.wait();
        assert_eq!(report.state, JobState::Completed);

        // Slot is free again.
        let second = Arc::new(GateJob::new());
        second.release.cancel();
        runner.run(second).unwrap().wait();
    }

    #[test]
    fn test_abort_waits_for_termination() {
        let runner = JobRunner::new().unwrap();
        let job = Arc::new(GateJob::new());
        runner.run(job.clone()).unwrap();

        let report = runner.abort().unwrap();
        assert_eq!(report.state, JobState::Aborted);
        assert_eq!(job.state(), JobState::Aborted);
        assert_eq!(report.progress.active_workers, 0);

        // Second abort is a no-op returning the same outcome.
        let again = runner.abort().unwrap();
        assert_eq!(again.state, JobState::Aborted);
        assert_eq!(again.id, report.id);
    }

    #[test]
    fn test_abort_after_completion_keeps_state() {
        let runner = JobRunner::new().unwrap();
        let job = Arc::new(GateJob::new());
        job.release.cancel();
        runner.run(job).unwrap().wait();
        assert_eq!(runner.abort().unwrap().state, JobState::Completed);
    }

    #[test]
    fn test_wait_timeout() {
        let runner = JobRunner::new().unwrap();
        let job = Arc::new(GateJob::new());
        let handle = runner.run(job.clone()).unwrap();
        assert!(handle.wait_timeout(Duration::from_millis(20)).is_none());
        assert!(runner.is_busy());

        job.release.cancel();
        let report = handle.wait_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(report.state, JobState::Completed);
        assert!(!runner.is_busy());
    }

    #[test]
    fn test_panicking_job_is_failed() {
        let runner = JobRunner::new().unwrap();
        let mut job = GateJob::new();
        job.panic = true;
        let job = Arc::new(job);
        let report = runner.run(job.clone()).unwrap().wait();
        assert_eq!(report.state, JobState::Failed);
        assert!(report.fault.unwrap().contains("gate exploded"));
        assert_eq!(job.state(), JobState::Failed);
    }

    #[test]
    fn test_job_is_running_once_submitted() {
        let runner = JobRunner::new().unwrap();
        let job = Arc::new(GateJob::new());
        let handle = runner.run(job.clone()).unwrap();
        assert_eq!(job.state(), JobState::Running);

        job.release.cancel();
        assert_eq!(handle.wait().state, JobState::Completed);
        assert_eq!(job.state(), JobState::Completed);
    }

    #[test]
    fn test_finished_job_cannot_be_resubmitted() {
        let runner = JobRunner::new().unwrap();
        let job = Arc::new(GateJob::new());
        job.release.cancel();
        runner.run(job.clone()).unwrap().wait();

        let err = runner.run(job).unwrap_err();
        assert!(matches!(
            err,
            RunnerError::NotRunnable { ref name, state: JobState::Completed } if name == "gate"
        ));
    }

    #[test]
    fn test_listener_sees_every_report() {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let runner = JobRunner::with_listener(Box::new(move |report: &JobReport| {
            let _ = lock(&tx).send((report.id, report.state));
        }))
        .unwrap();

        let job = Arc::new(GateJob::new());
        job.release.cancel();
        let handle = runner.run(job).unwrap();

        let (id, state) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(id, handle.id());
        assert_eq!(state, JobState::Completed);
        assert_eq!(runner.last_report().unwrap().id, id);
    }

    #[test]
    fn test_drop_aborts_running_job() {
        let job = Arc::new(GateJob::new());
        {
            let runner = JobRunner::new().unwrap();
            runner.run(job.clone()).unwrap();
        }
        assert_eq!(job.state(), JobState::Aborted);
    }
}
