//! Reusable scan worker pool.
//!
//! Built once at start-up and shared by every job. Threads pull boxed tasks
//! from one channel; a panicking task is caught so the thread keeps serving.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use crate::error::ExecutionError;

type Task = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    tx: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` worker threads (at least one).
    pub fn new(size: usize) -> io::Result<Self> {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel::<Task>();
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..size)
            .map(|i| {
                let rx = Arc::clone(&rx);
                thread::Builder::new()
                    .name(format!("sift-worker-{}", i))
                    .spawn(move || worker_loop(&rx))
            })
            .collect::<io::Result<Vec<_>>>()?;

        debug!(size, "Worker pool started");
        Ok(Self {
            tx: Some(tx),
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn execute<F>(&self, task: F) -> Result<(), ExecutionError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx
            .as_ref()
            .ok_or(ExecutionError::PoolClosed)?
            .send(Box::new(task))
            .map_err(|_| ExecutionError::PoolClosed)
    }
}

fn worker_loop(rx: &Mutex<Receiver<Task>>) {
    loop {
        // Hold the lock only while receiving.
        let task = match lock(rx).recv() {
            Ok(task) => task,
            Err(_) => break,
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            warn!(panic = %panic_message(&*payload), "Pool task panicked");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.tx.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("Worker pool stopped");
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size())
            .finish()
    }
}

/// Counts outstanding tasks; [`Latch::wait`] blocks until all have checked in.
#[derive(Debug)]
pub(crate) struct Latch {
    remaining: Mutex<usize>,
    cv: Condvar,
}

impl Latch {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            cv: Condvar::new(),
        }
    }

    pub(crate) fn count_down(&self) {
        let mut remaining = lock(&self.remaining);
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.cv.notify_all();
        }
    }

    pub(crate) fn wait(&self) {
        let mut remaining = lock(&self.remaining);
        while *remaining > 0 {
            remaining = self
                .cv
                .wait(remaining)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Counts the latch down when dropped, panics included.
pub(crate) struct LatchGuard(pub(crate) Arc<Latch>);

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.0.count_down();
    }
}

/// Poison-tolerant lock: a panicking holder does not wedge everyone else.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
