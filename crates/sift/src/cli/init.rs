//! `sift init` - write a demo store

use anyhow::Result;
use std::path::PathBuf;

use sift_store::{RecordKind, StoreBuilder};

use super::error::HelpfulError;

#[derive(Debug, clap::Args)]
pub struct InitArgs {
    /// Store directory to create
    pub store: PathBuf,

    /// Node record slots to write
    #[arg(long, default_value_t = 100_000)]
    pub nodes: u64,

    /// Relationship record slots to write
    #[arg(long, default_value_t = 250_000)]
    pub relationships: u64,

    /// Fraction of slots marked in use (0.0 - 1.0)
    #[arg(long, default_value_t = 0.9)]
    pub live_ratio: f64,

    /// Seed for the liveness pattern
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Label stored in store.toml
    #[arg(long)]
    pub description: Option<String>,

    /// Overwrite existing record files
    #[arg(long)]
    pub force: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let has_records = RecordKind::ALL
        .iter()
        .any(|kind| args.store.join(kind.file_name()).exists());
    if has_records && !args.force {
        return Err(HelpfulError::store_exists(&args.store).into());
    }

    let mut builder = StoreBuilder::new(&args.store)
        .nodes(args.nodes)
        .relationships(args.relationships)
        .live_ratio(args.live_ratio)
        .seed(args.seed);
    if let Some(description) = &args.description {
        builder = builder.description(description.clone());
    }
    let summary = builder
        .build()
        .map_err(|e| HelpfulError::store_unreadable(&args.store, e))?;

    if args.json {
        let out = serde_json::json!({
            "store": args.store.to_string_lossy(),
            "nodes": { "slots": summary.nodes, "live": summary.live_nodes },
            "relationships": {
                "slots": summary.relationships,
                "live": summary.live_relationships,
            },
            "seed": args.seed,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Created store {}", args.store.display());
        println!(
            "  nodes:          {} slots, {} live",
            summary.nodes, summary.live_nodes
        );
        println!(
            "  relationships:  {} slots, {} live",
            summary.relationships, summary.live_relationships
        );
    }
    Ok(())
}
