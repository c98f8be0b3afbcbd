//! `sift run` - one job, no prompt
//!
//! Shows a spinner with the live tally, aborts the job on SIGINT/SIGTERM
//! (Ctrl+C on windows) and exits non-zero unless the job completed.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use sift_jobs::{Job, JobReport, JobRunner, JobState, OutputSink};

use super::error::HelpfulError;
use super::{open_store, Toolbox};

const TICK: Duration = Duration::from_millis(100);

/// Exit code for a job stopped by a signal (128 + SIGINT)
const EXIT_ABORTED: u8 = 130;

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Store directory
    pub store: PathBuf,

    /// Job name (e.g. countnodes)
    pub job: String,

    /// Job arguments (e.g. <threads> [chunks] [probe|raw])
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: RunArgs, pool_threads: Option<usize>) -> Result<ExitCode> {
    let toolbox = Toolbox::start(pool_threads)?;
    let factory = toolbox
        .registry
        .lookup(&args.job)
        .ok_or_else(|| HelpfulError::unknown_job(&args.job, toolbox.registry.names()))?;

    let store = open_store(&args.store)?;
    let sink: OutputSink = if args.json {
        Box::new(io::sink())
    } else {
        Box::new(io::stdout())
    };
    let job = factory
        .build(&args.args, &toolbox.context(store), sink)
        .map_err(|e| HelpfulError::bad_job_args(factory, &e))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    install_signal_handler(Arc::clone(&interrupted))?;

    let runner = JobRunner::new().context("Failed to start job runner")?;
    let handle = runner.run(Arc::clone(&job))?;
    info!(job = %args.job, store = %args.store.display(), "Running job");

    let spinner = if args.json {
        ProgressBar::hidden()
    } else {
        new_spinner(&args.job)
    };

    let mut abort_sent = false;
    let report = loop {
        if let Some(report) = handle.wait_timeout(TICK) {
            break report;
        }
        if interrupted.load(Ordering::SeqCst) && !abort_sent {
            abort_sent = true;
            spinner.set_message("aborting...");
            warn!(job = %args.job, "Interrupted, aborting job");
            job.request_abort();
        }
        let progress = handle.progress();
        if !abort_sent {
            spinner.set_message(format!(
                "{}/{} chunks left, tally {}",
                progress.active_workers, progress.total_workers, progress.tally
            ));
        }
    };
    spinner.finish_and_clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        print_outcome(&report)?;
        job.report()?;
    }

    Ok(match report.state {
        JobState::Completed => ExitCode::SUCCESS,
        JobState::Aborted => ExitCode::from(EXIT_ABORTED),
        _ => ExitCode::from(1),
    })
}

fn new_spinner(job: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner} {prefix} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_prefix(job.to_string());
    spinner.enable_steady_tick(TICK);
    spinner
}

fn print_outcome(report: &JobReport) -> io::Result<()> {
    let mut out = io::stdout().lock();
    match report.state {
        JobState::Completed => writeln!(
            out,
            "Job {} finished. Took {:.3}ms.",
            report.name,
            report.elapsed_ms()
        ),
        JobState::Aborted => writeln!(out, "Aborted job {}.", report.name),
        _ => writeln!(
            out,
            "Job {} failed after {:.3}ms: {}",
            report.name,
            report.elapsed_ms(),
            report.fault.as_deref().unwrap_or("unknown error")
        ),
    }
}

pub(crate) fn report_json(report: &JobReport) -> serde_json::Value {
    serde_json::json!({
        "id": report.id.0,
        "name": report.name,
        "state": report.state.as_str(),
        "started_at": report.started_at.to_rfc3339(),
        "elapsed_ms": report.elapsed_ms(),
        "fault": report.fault,
        "progress": {
            "total_workers": report.progress.total_workers,
            "active_workers": report.progress.active_workers,
            "tally": report.progress.tally,
        },
    })
}

fn install_signal_handler(flag: Arc<AtomicBool>) -> Result<()> {
    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        std::thread::Builder::new()
            .name("sift-signals".to_string())
            .spawn(move || {
                for sig in signals.forever() {
                    info!("Received signal {}", sig);
                    flag.store(true, Ordering::SeqCst);
                }
            })?;
    }

    #[cfg(windows)]
    {
        ctrlc::set_handler(move || {
            info!("Received Ctrl+C");
            flag.store(true, Ordering::SeqCst);
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_jobs::{JobId, ProgressSnapshot};

    #[test]
    fn test_report_json_shape() {
        let report = JobReport {
            id: JobId(3),
            name: "countnodes".to_string(),
            state: JobState::Failed,
            started_at: "2026-01-02T03:04:05Z".parse().unwrap(),
            elapsed: Duration::from_millis(1500),
            fault: Some("boom".to_string()),
            progress: ProgressSnapshot {
                total_workers: 4,
                active_workers: 0,
                tally: 75,
            },
        };
        let json = report_json(&report);
        assert_eq!(json["id"], 3);
        assert_eq!(json["state"], "failed");
        assert_eq!(json["elapsed_ms"], 1500.0);
        assert_eq!(json["fault"], "boom");
        assert_eq!(json["progress"]["tally"], 75);
        assert_eq!(json["started_at"], "2026-01-02T03:04:05+00:00");
    }
}
