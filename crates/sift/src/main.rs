//! Sift - parallel, cancellable jobs over an offline record store
//!
//! - `sift shell <STORE>`: interactive prompt with live progress and abort
//! - `sift run <STORE> <JOB> [ARGS..]`: one job, Ctrl+C aborts it
//! - `sift init <STORE>`: write a demo store
//! - `sift config`: show paths and effective settings

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use sift_logging::{init_logging, LogConfig};

mod cli;

#[derive(Parser, Debug)]
#[command(name = "sift", version, about = "Parallel, cancellable jobs over an offline record store")]
struct Cli {
    /// Enable verbose logging (debug to stderr, RUST_LOG honoured)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Override the worker pool size from config.toml
    #[arg(long, global = true, env = "SIFT_POOL_THREADS")]
    pool_threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive job prompt against a store
    Shell(cli::shell::ShellArgs),

    /// Run a single job and exit
    Run(cli::run::RunArgs),

    /// Create a demo store
    Init(cli::init::InitArgs),

    /// Show configuration paths and settings
    Config(cli::config::ConfigArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The shell prompt and the run spinner own the terminal.
    let interactive = matches!(cli.command, Commands::Shell(_) | Commands::Run(_));
    if let Err(err) = init_logging(LogConfig {
        app_name: "sift",
        verbose: cli.verbose,
        interactive,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    let pool_threads = cli.pool_threads;
    let result = match cli.command {
        Commands::Shell(args) => cli::shell::run(args, pool_threads).map(|()| ExitCode::SUCCESS),
        Commands::Run(args) => cli::run::run(args, pool_threads),
        Commands::Init(args) => cli::init::run(args).map(|()| ExitCode::SUCCESS),
        Commands::Config(args) => cli::config::run(args, pool_threads).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            match err.downcast_ref::<cli::error::HelpfulError>() {
                Some(helpful) => eprint!("{}", helpful),
                None => eprintln!("{:?}", err),
            }
            ExitCode::from(1)
        }
    }
}
