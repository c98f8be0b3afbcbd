#![allow(dead_code)]

use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

pub fn sift_bin() -> &'static str {
    env!("CARGO_BIN_EXE_sift")
}

/// Isolated sift home so tests never read the user's config or logs.
pub struct TestHome {
    pub dir: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create sift home"),
        }
    }

    pub fn envs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("SIFT_HOME", self.dir.path().to_string_lossy().to_string()),
            ("RUST_LOG", "error".to_string()),
        ]
    }

    pub fn store_path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().to_string()
    }
}

pub fn run_cli(args: &[&str], home: &TestHome) -> Output {
    let mut cmd = Command::new(sift_bin());
    cmd.args(args);
    for (key, value) in home.envs() {
        cmd.env(key, value);
    }
    cmd.output().expect("failed to execute sift CLI")
}

pub fn run_cli_with_stdin(args: &[&str], home: &TestHome, stdin: &str) -> Output {
    let mut cmd = Command::new(sift_bin());
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in home.envs() {
        cmd.env(key, value);
    }
    let mut child = cmd.spawn().expect("failed to spawn sift CLI");
    child
        .stdin
        .take()
        .expect("stdin piped")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("failed to wait for sift CLI")
}

pub fn assert_cli_success(output: &Output, args: &[&str]) {
    assert!(
        output.status.success(),
        "command failed: {}\nstdout:\n{}\nstderr:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn run_cli_json<T: DeserializeOwned>(args: &[&str], home: &TestHome) -> T {
    let output = run_cli(args, home);
    assert_cli_success(&output, args);
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "failed to parse JSON output: {}\nstdout:\n{}\nstderr:\n{}",
            err,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

/// `sift init` a store of `nodes` nodes and `relationships` relationships.
pub fn init_store(home: &TestHome, store: &Path, nodes: u64, relationships: u64, live_ratio: f64) {
    let store = store.to_string_lossy().to_string();
    let nodes = nodes.to_string();
    let relationships = relationships.to_string();
    let live_ratio = live_ratio.to_string();
    let args = [
        "init",
        store.as_str(),
        "--nodes",
        nodes.as_str(),
        "--relationships",
        relationships.as_str(),
        "--live-ratio",
        live_ratio.as_str(),
    ];
    let output = run_cli(&args, home);
    assert_cli_success(&output, &args);
}
