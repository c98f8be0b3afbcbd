mod cli_support;

use cli_support::{assert_cli_success, init_store, run_cli, run_cli_with_stdin, TestHome};
use std::path::PathBuf;

#[test]
fn test_shell_session_from_stdin() {
    let home = TestHome::new();
    let store = PathBuf::from(home.store_path("store"));
    init_store(&home, &store, 120, 0, 1.0);
    let store_arg = store.to_string_lossy().to_string();

    let args = ["shell", store_arg.as_str()];
    let output = run_cli_with_stdin(&args, &home, "help\nnope\n\nlast\ncountnodes x\nexit\n");
    assert_cli_success(&output, &args);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Welcome to the sift parallel jobs tool.\n"));
    assert!(stdout.contains(&format!("Target store: {}", store_arg)));
    assert!(stdout.contains("  countrels <threads> [chunks] [probe|raw]"));
    assert!(stdout.contains("No such job or command: nope"));
    assert!(stdout.contains("No job has been run yet."));
    assert!(stdout.contains("Invalid arguments for countnodes"), "stdout:\n{}", stdout);
    assert!(!stdout.contains("Hit ENTER for progress"));
}

#[test]
fn test_shell_eof_during_job_exits() {
    let home = TestHome::new();
    let store = PathBuf::from(home.store_path("store"));
    init_store(&home, &store, 64, 0, 1.0);
    let store_arg = store.to_string_lossy().to_string();

    // Input ends while the job may still be running: either outcome is fine,
    // but the shell must report it and exit cleanly.
    let args = ["shell", store_arg.as_str()];
    let output = run_cli_with_stdin(&args, &home, "countnodes 2\n");
    assert_cli_success(&output, &args);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Hit ENTER for progress"), "stdout:\n{}", stdout);
    assert!(
        stdout.contains("Job countnodes finished.") || stdout.contains("Aborted job countnodes."),
        "stdout:\n{}",
        stdout
    );
}

#[test]
fn test_shell_exits_on_eof() {
    let home = TestHome::new();
    let store = PathBuf::from(home.store_path("store"));
    init_store(&home, &store, 8, 8, 1.0);
    let store_arg = store.to_string_lossy().to_string();

    let args = ["shell", store_arg.as_str()];
    let output = run_cli_with_stdin(&args, &home, "");
    assert_cli_success(&output, &args);
    assert!(String::from_utf8_lossy(&output.stdout).contains("> "));
}

#[test]
fn test_shell_needs_existing_store() {
    let home = TestHome::new();
    let store = home.store_path("missing");
    let output = run_cli(&["shell", store.as_str()], &home);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sift init"), "stderr:\n{}", stderr);
}
