mod cli_support;

use cli_support::{assert_cli_success, init_store, run_cli, run_cli_json, TestHome};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct InitOutput {
    store: String,
    nodes: SlotCounts,
    relationships: SlotCounts,
    seed: u64,
}

#[derive(Debug, Deserialize)]
struct SlotCounts {
    slots: u64,
    live: u64,
}

#[derive(Debug, Deserialize)]
struct RunOutput {
    id: u64,
    name: String,
    state: String,
    started_at: String,
    elapsed_ms: f64,
    fault: Option<String>,
    progress: ProgressOutput,
}

#[derive(Debug, Deserialize)]
struct ProgressOutput {
    total_workers: usize,
    active_workers: usize,
    tally: u64,
}

#[derive(Debug, Deserialize)]
struct ConfigOutput {
    home: String,
    pool_threads: usize,
    cancel_check_interval: u64,
    config_file: ConfigFile,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    path: String,
    exists: bool,
}

#[test]
fn test_init_json_reports_slots() {
    let home = TestHome::new();
    let store = home.store_path("store");
    let init: InitOutput = run_cli_json(
        &["init", store.as_str(), "--nodes", "500", "--relationships", "40", "--json"],
        &home,
    );
    assert_eq!(init.store, store);
    assert_eq!(init.nodes.slots, 500);
    assert_eq!(init.relationships.slots, 40);
    assert!(init.nodes.live <= 500);
    assert_eq!(init.seed, 42);
}

#[test]
fn test_init_refuses_existing_store() {
    let home = TestHome::new();
    let store = PathBuf::from(home.store_path("store"));
    init_store(&home, &store, 10, 10, 1.0);

    let store_arg = store.to_string_lossy().to_string();
    let output = run_cli(&["init", store_arg.as_str()], &home);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: Store already exists"), "stderr:\n{}", stderr);

    let args = ["init", store_arg.as_str(), "--nodes", "5", "--force"];
    let output = run_cli(&args, &home);
    assert_cli_success(&output, &args);
}

#[test]
fn test_countnodes_counts_live_nodes() {
    let home = TestHome::new();
    let store = PathBuf::from(home.store_path("store"));
    init_store(&home, &store, 100, 30, 1.0);
    let store_arg = store.to_string_lossy().to_string();

    let run: RunOutput = run_cli_json(&["run", store_arg.as_str(), "countnodes", "4", "--json"], &home);
    assert_eq!(run.name, "countnodes");
    assert_eq!(run.state, "completed");
    assert!(run.fault.is_none());
    assert!(run.elapsed_ms >= 0.0);
    assert!(!run.started_at.is_empty());
    assert_eq!(run.id, 1);
    assert_eq!(run.progress.total_workers, 4);
    assert_eq!(run.progress.active_workers, 0);
    assert_eq!(run.progress.tally, 100);
}

#[test]
fn test_countrels_drops_uncovered_tail() {
    let home = TestHome::new();
    let store = PathBuf::from(home.store_path("store"));
    init_store(&home, &store, 5, 10, 1.0);
    let store_arg = store.to_string_lossy().to_string();

    // 10 ids over 3 chunks of 3: id 9 is never scanned.
    let run: RunOutput = run_cli_json(
        &["run", store_arg.as_str(), "countrels", "3", "3", "raw", "--json"],
        &home,
    );
    assert_eq!(run.state, "completed");
    assert_eq!(run.progress.total_workers, 3);
    assert_eq!(run.progress.tally, 9);
}

#[test]
fn test_text_output_prints_progress_report() {
    let home = TestHome::new();
    let store = PathBuf::from(home.store_path("store"));
    init_store(&home, &store, 64, 0, 1.0);
    let store_arg = store.to_string_lossy().to_string();

    let args = ["run", store_arg.as_str(), "countnodes", "2"];
    let output = run_cli(&args, &home);
    assert_cli_success(&output, &args);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Job countnodes finished. Took "), "stdout:\n{}", stdout);
    assert!(stdout.contains("Total threads: 2\nRunning threads: 0\nTally so far: 64"));
}

#[test]
fn test_missing_store_suggests_init() {
    let home = TestHome::new();
    let store = home.store_path("nowhere");
    let output = run_cli(&["run", store.as_str(), "countnodes", "2"], &home);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: "), "stderr:\n{}", stderr);
    assert!(stderr.contains("sift init"), "stderr:\n{}", stderr);
}

#[test]
fn test_unknown_job_lists_available() {
    let home = TestHome::new();
    let store = PathBuf::from(home.store_path("store"));
    init_store(&home, &store, 4, 4, 1.0);
    let store_arg = store.to_string_lossy().to_string();

    let output = run_cli(&["run", store_arg.as_str(), "countedges", "2"], &home);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No such job: countedges"), "stderr:\n{}", stderr);
    assert!(stderr.contains("countnodes, countrels"), "stderr:\n{}", stderr);
}

#[test]
fn test_bad_arguments_show_usage() {
    let home = TestHome::new();
    let store = PathBuf::from(home.store_path("store"));
    init_store(&home, &store, 4, 4, 1.0);
    let store_arg = store.to_string_lossy().to_string();

    let output = run_cli(&["run", store_arg.as_str(), "countnodes", "0"], &home);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid arguments for countnodes"), "stderr:\n{}", stderr);
    assert!(stderr.contains("Usage: countnodes <threads> [chunks] [probe|raw]"));
}

#[test]
fn test_config_json_uses_sift_home() {
    let home = TestHome::new();
    std::fs::write(home.dir.path().join("config.toml"), "cancel_check_interval = 64\n").unwrap();

    let config: ConfigOutput = run_cli_json(&["config", "--json", "--pool-threads", "3"], &home);
    assert_eq!(PathBuf::from(&config.home), home.dir.path());
    assert!(config.config_file.exists);
    assert!(config.config_file.path.ends_with("config.toml"));
    assert_eq!(config.pool_threads, 3);
    assert_eq!(config.cancel_check_interval, 64);
}
