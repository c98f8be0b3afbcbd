//! `sift shell` - the interactive job prompt
//!
//! One channel carries everything the shell waits for: input lines from a
//! reader thread and completion notices from the job runner. While a job runs
//! the shell blocks on that channel, so ENTER, `abort` and job completion are
//! handled as they arrive without polling.

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tracing::{debug, info};

use sift_jobs::{JobHandle, JobId, JobReport, JobRunner, JobState, OutputSink};

use super::error::HelpfulError;
use super::{open_store, Toolbox};

const PROGRESS_HINT: &str = "Hit ENTER for progress, or type \"abort<ENTER>\" to abort the command.";

#[derive(Debug, clap::Args)]
pub struct ShellArgs {
    /// Store directory to run jobs against
    pub store: PathBuf,
}

pub fn run(args: ShellArgs, pool_threads: Option<usize>) -> Result<()> {
    let toolbox = Toolbox::start(pool_threads)?;
    let console = Console::new(Box::new(io::stdout()));
    let shell = Shell::new(toolbox, &args.store, console)?;
    shell.run(io::BufReader::new(io::stdin()))
}

enum Event {
    Line(String),
    Eof,
    JobDone(JobId),
}

enum Flow {
    Continue,
    Exit,
}

/// Cloneable writer shared by the shell and the jobs it starts.
#[derive(Clone)]
pub struct Console {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(out)),
        }
    }

    fn sink(&self) -> OutputSink {
        Box::new(self.clone())
    }
}

impl Write for Console {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }
}

pub struct Shell {
    toolbox: Toolbox,
    store_path: PathBuf,
    description: Option<String>,
    runner: JobRunner,
    events: Receiver<Event>,
    events_tx: Sender<Event>,
    out: Console,
    last: Option<JobHandle>,
}

impl Shell {
    /// Validates the store up front; each job still reopens it.
    pub fn new(toolbox: Toolbox, store: &Path, out: Console) -> Result<Self> {
        let opened = open_store(store)?;
        let description = opened.config().description.clone();

        let (events_tx, events) = mpsc::channel();
        let done_tx = Mutex::new(events_tx.clone());
        let runner = JobRunner::with_listener(Box::new(move |report: &JobReport| {
            let tx = done_tx.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = tx.send(Event::JobDone(report.id));
        }))
        .context("Failed to start job runner")?;

        Ok(Self {
            toolbox,
            store_path: store.to_path_buf(),
            description,
            runner,
            events,
            events_tx,
            out,
            last: None,
        })
    }

    pub fn run<R>(mut self, input: R) -> Result<()>
    where
        R: BufRead + Send + 'static,
    {
        spawn_reader(input, self.events_tx.clone())?;
        info!(store = %self.store_path.display(), "Shell started");

        self.banner()?;
        self.help()?;

        loop {
            write!(self.out, "> ")?;
            self.out.flush()?;

            let Some(line) = self.next_line() else {
                writeln!(self.out)?;
                break;
            };
            if let Flow::Exit = self.dispatch(&line)? {
                break;
            }
        }

        info!("Shell stopped");
        Ok(())
    }

    /// Next input line while idle. Completion notices for jobs that were
    /// already aborted are dropped here.
    fn next_line(&self) -> Option<String> {
        loop {
            match self.events.recv() {
                Ok(Event::Line(line)) => return Some(line),
                Ok(Event::JobDone(id)) => debug!(%id, "Ignoring completion of finished job"),
                Ok(Event::Eof) | Err(_) => return None,
            }
        }
    }

    fn dispatch(&mut self, line: &str) -> Result<Flow> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(Flow::Continue);
        };
        let args: Vec<String> = words.map(str::to_string).collect();

        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "exit" | "quit" => return Ok(Flow::Exit),
            "help" => self.help()?,
            "last" => self.last()?,
            _ => return self.run_job(&name, &args),
        }
        Ok(Flow::Continue)
    }

    fn banner(&mut self) -> io::Result<()> {
        writeln!(self.out, "Welcome to the sift parallel jobs tool.")?;
        writeln!(self.out, "Target store: {}", self.store_path.display())?;
        if let Some(description) = &self.description {
            writeln!(self.out, "Description: {}", description)?;
        }
        writeln!(self.out, "---")
    }

    fn help(&mut self) -> io::Result<()> {
        writeln!(self.out, "Available commands:")?;
        for factory in self.toolbox.registry.iter() {
            writeln!(self.out, "  {} {}", factory.name(), factory.args_help())?;
            writeln!(self.out, "      {}", factory.description())?;
        }
        writeln!(self.out, "  last")?;
        writeln!(self.out, "      Show the progress report of the last job")?;
        writeln!(self.out, "  help")?;
        writeln!(self.out, "      Show this help")?;
        writeln!(self.out, "  exit")?;
        writeln!(self.out, "      Leave the shell")
    }

    fn last(&mut self) -> io::Result<()> {
        match &self.last {
            Some(handle) => handle.job().report(),
            None => writeln!(self.out, "No job has been run yet."),
        }
    }

    fn run_job(&mut self, name: &str, args: &[String]) -> Result<Flow> {
        let Some(factory) = self.toolbox.registry.lookup(name) else {
            writeln!(self.out, "No such job or command: {}", name)?;
            return Ok(Flow::Continue);
        };

        let store = match open_store(&self.store_path) {
            Ok(store) => store,
            Err(e) => {
                write!(self.out, "{}", e)?;
                return Ok(Flow::Continue);
            }
        };
        let ctx = self.toolbox.context(store);
        let job = match factory.build(args, &ctx, self.out.sink()) {
            Ok(job) => job,
            Err(e) => {
                write!(self.out, "{}", HelpfulError::bad_job_args(factory, &e))?;
                return Ok(Flow::Continue);
            }
        };

        let handle = match self.runner.run(job) {
            Ok(handle) => handle,
            Err(e) => {
                writeln!(self.out, "{}", e)?;
                return Ok(Flow::Continue);
            }
        };
        writeln!(self.out, "{}", PROGRESS_HINT)?;

        let flow = self.supervise(&handle)?;
        self.last = Some(handle);
        Ok(flow)
    }

    /// Serve progress and abort requests until the job ends.
    fn supervise(&mut self, handle: &JobHandle) -> Result<Flow> {
        loop {
            match self.events.recv() {
                Ok(Event::JobDone(id)) if id == handle.id() => {
                    self.outcome(handle, &handle.wait())?;
                    return Ok(Flow::Continue);
                }
                Ok(Event::JobDone(_)) => {}
                Ok(Event::Line(line)) if line.trim().eq_ignore_ascii_case("abort") => {
                    writeln!(self.out, "Aborting job {}...", handle.name())?;
                    let report = self.runner.abort()?;
                    self.outcome(handle, &report)?;
                    return Ok(Flow::Continue);
                }
                Ok(Event::Line(_)) => handle.job().report()?,
                Ok(Event::Eof) | Err(_) => {
                    debug!(job = %handle.name(), "Input closed while a job was running");
                    let report = self.runner.abort()?;
                    self.outcome(handle, &report)?;
                    return Ok(Flow::Exit);
                }
            }
        }
    }

    fn outcome(&mut self, handle: &JobHandle, report: &JobReport) -> io::Result<()> {
        match report.state {
            JobState::Aborted => writeln!(self.out, "Aborted job {}.", report.name),
            JobState::Failed => {
                writeln!(
                    self.out,
                    "Job {} failed after {:.3}ms: {}",
                    report.name,
                    report.elapsed_ms(),
                    report.fault.as_deref().unwrap_or("unknown error")
                )?;
                handle.job().report()
            }
            _ => {
                writeln!(
                    self.out,
                    "Job {} finished. Took {:.3}ms.",
                    report.name,
                    report.elapsed_ms()
                )?;
                handle.job().report()
            }
        }
    }
}

fn spawn_reader<R>(input: R, tx: Sender<Event>) -> io::Result<()>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("sift-stdin".to_string())
        .spawn(move || {
            for line in input.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(Event::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "Input read failed");
                        break;
                    }
                }
            }
            let _ = tx.send(Event::Eof);
        })?;
    Ok(())
}
