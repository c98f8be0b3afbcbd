//! Job Registry - name to factory lookup
//!
//! Factories are registered explicitly at start-up; [`JobRegistry::new`]
//! installs the built-in record counters.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use sift_store::{RecordKind, RecordStore};

use crate::chunked_count::{ChunkedCountConfig, ChunkedCountJob, DEFAULT_CANCEL_CHECK_INTERVAL};
use crate::error::{BuildError, PartitionError};
use crate::job::{Job, OutputSink};
use crate::pool::WorkerPool;
use crate::scan::StrategyKind;

/// What a factory needs to build a job besides its arguments.
#[derive(Clone)]
pub struct JobContext {
    pub store: Arc<dyn RecordStore>,
    pub pool: Arc<WorkerPool>,
    pub cancel_check_interval: u64,
}

impl JobContext {
    pub fn new(store: Arc<dyn RecordStore>, pool: Arc<WorkerPool>) -> Self {
        Self {
            store,
            pool,
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
        }
    }
}

/// Builds one kind of job from positional string arguments.
pub trait JobFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Argument synopsis shown after the name in help output.
    fn args_help(&self) -> &str;

    fn description(&self) -> &str;

    fn build(
        &self,
        args: &[String],
        ctx: &JobContext,
        out: OutputSink,
    ) -> Result<Arc<dyn Job>, BuildError>;
}

pub struct JobRegistry {
    factories: BTreeMap<String, Box<dyn JobFactory>>,
}

impl JobRegistry {
    /// Registry with the built-in jobs.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(CountRecordsFactory::new(
            "countnodes",
            RecordKind::Node,
        )));
        registry.register(Box::new(CountRecordsFactory::new(
            "countrels",
            RecordKind::Relationship,
        )));
        debug!("Registered {} jobs", registry.factories.len());
        registry
    }

    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Add a factory, replacing any previous one with the same name.
    pub fn register(&mut self, factory: Box<dyn JobFactory>) {
        let name = factory.name().to_string();
        debug!("Registering job: {}", name);
        self.factories.insert(name, factory);
    }

    pub fn lookup(&self, name: &str) -> Option<&dyn JobFactory> {
        self.factories.get(name).map(|f| f.as_ref())
    }

    /// Factories in name order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn JobFactory> {
        self.factories.values().map(|f| f.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// `<threads> [chunks] [probe|raw]` over one record kind.
pub struct CountRecordsFactory {
    name: &'static str,
    kind: RecordKind,
    description: String,
}

impl CountRecordsFactory {
    pub fn new(name: &'static str, kind: RecordKind) -> Self {
        Self {
            name,
            kind,
            description: format!("Count live {} records in parallel", kind),
        }
    }

    fn parse(&self, args: &[String]) -> Result<(usize, usize, StrategyKind), BuildError> {
        if args.len() > 3 {
            return Err(BuildError::TooManyArguments {
                max: 3,
                got: args.len(),
            });
        }

        let threads = match args.first() {
            Some(raw) => parse_count("threads", raw)?,
            None => return Err(BuildError::MissingArgument { name: "threads" }),
        };
        if threads == 0 {
            return Err(BuildError::InvalidArgument {
                name: "threads",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let chunks = match args.get(1) {
            Some(raw) => parse_count("chunks", raw)?,
            None => threads,
        };
        if chunks == 0 {
            return Err(PartitionError::ZeroChunks.into());
        }

        let strategy = match args.get(2) {
            Some(raw) => raw
                .parse::<StrategyKind>()
                .map_err(|reason| BuildError::InvalidArgument {
                    name: "strategy",
                    value: raw.clone(),
                    reason,
                })?,
            None => StrategyKind::default(),
        };

        Ok((threads, chunks, strategy))
    }
}

impl JobFactory for CountRecordsFactory {
    fn name(&self) -> &str {
        self.name
    }

    fn args_help(&self) -> &str {
        "<threads> [chunks] [probe|raw]"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn build(
        &self,
        args: &[String],
        ctx: &JobContext,
        out: OutputSink,
    ) -> Result<Arc<dyn Job>, BuildError> {
        let (threads, chunks, strategy) = self.parse(args)?;
        let config = ChunkedCountConfig::new(self.kind, threads)
            .chunks(chunks)
            .check_interval(ctx.cancel_check_interval);
        Ok(Arc::new(ChunkedCountJob::new(
            self.name,
            config,
            Arc::clone(&ctx.store),
            strategy.strategy(),
            Arc::clone(&ctx.pool),
            out,
        )))
    }
}

fn parse_count(name: &'static str, raw: &str) -> Result<usize, BuildError> {
    raw.parse::<usize>()
        .map_err(|e| BuildError::InvalidArgument {
            name,
            value: raw.to_string(),
            reason: e.to_string(),
        })
}
