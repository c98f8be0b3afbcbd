//! Job lifecycle.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// `Created → Running → {Completed, Aborted, Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum JobState {
    Created = 0,
    Running = 1,
    Completed = 2,
    Aborted = 3,
    Failed = 4,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Aborted | JobState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Aborted => "aborted",
            JobState::Failed => "failed",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => JobState::Created,
            1 => JobState::Running,
            2 => JobState::Completed,
            3 => JobState::Aborted,
            _ => JobState::Failed,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free lifecycle cell. Each transition is a single compare-and-swap, so
/// a job reaches a terminal state at most once.
///
/// Starting and entering `run()` are separate: the runner starts a job when
/// it accepts it, and the slot thread enters it later.
#[derive(Debug)]
pub struct StateCell {
    state: AtomicU8,
    entered: AtomicBool,
}

impl Default for StateCell {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(JobState::Created as u8),
            entered: AtomicBool::new(false),
        }
    }
}

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> JobState {
        JobState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// `Created → Running`. On failure returns the state actually held.
    pub fn start(&self) -> Result<(), JobState> {
        self.transition(JobState::Created, JobState::Running)
    }

    /// Admit the one call to `run()`, starting the job if nobody has.
    /// A second entry fails with the state actually held.
    pub fn enter(&self) -> Result<(), JobState> {
        if self.entered.swap(true, Ordering::SeqCst) {
            return Err(self.get());
        }
        match self.start() {
            Ok(()) | Err(JobState::Running) => Ok(()),
            Err(actual) => Err(actual),
        }
    }

    /// `Running → terminal`. On failure returns the state actually held.
    pub fn finish(&self, terminal: JobState) -> Result<(), JobState> {
        if !terminal.is_terminal() {
            return Err(self.get());
        }
        self.transition(JobState::Running, terminal)
    }

    fn transition(&self, from: JobState, to: JobState) -> Result<(), JobState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(JobState::from_u8)
    }
}
