//! Smoke tests for the wsprobe binary

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn wsprobe() -> Command {
    Command::cargo_bin("wsprobe").expect("wsprobe binary should exist")
}

fn write_plan(dir: &TempDir, yaml: &str) -> std::path::PathBuf {
    let path = dir.path().join("plan.yaml");
    fs::write(&path, yaml).unwrap();
    path
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    wsprobe()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    wsprobe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("sample"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn test_no_args_fails() {
    wsprobe().assert().failure();
}

#[test]
fn test_sample_subcommand_help() {
    wsprobe()
        .args(["sample", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--connect-pattern"))
        .stdout(predicate::str::contains("--no-stomp"));
}

// ============================================================================
// validate
// ============================================================================

#[test]
fn test_validate_good_plan() {
    let dir = TempDir::new().unwrap();
    let plan = write_plan(
        &dir,
        "name: smoke\nusers: 2\nsamples:\n  - name: feed\n    server_address: localhost\n    server_port: 8080\n    context_path: /stomp\n    streaming_connection: true\n",
    );
    wsprobe()
        .arg("validate")
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::contains("Plan 'smoke'"))
        .stdout(predicate::str::contains("feed -> ws://localhost:8080/stomp (streaming)"));
}

#[test]
fn test_validate_plan_without_host() {
    let dir = TempDir::new().unwrap();
    let plan = write_plan(&dir, "samples:\n  - name: broken\n    context_path: /stomp\n");
    wsprobe()
        .arg("validate")
        .arg(&plan)
        .assert()
        .failure()
        .stderr(predicate::str::contains("sample #1 (broken)"));
}

#[test]
fn test_validate_malformed_yaml() {
    let dir = TempDir::new().unwrap();
    let plan = write_plan(&dir, "users: [1, 2\n");
    wsprobe()
        .arg("validate")
        .arg(&plan)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_validate_missing_file() {
    wsprobe()
        .args(["validate", "/nonexistent/plan.yaml"])
        .assert()
        .failure();
}

// ============================================================================
// sample / run against nothing
// ============================================================================

#[test]
fn test_sample_unreachable_server_fails() {
    wsprobe()
        .args([
            "sample",
            "ws://127.0.0.1:1/",
            "--connection-timeout",
            "1000",
            "--format",
            "json",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"error_code\": 1006"))
        .stderr(predicate::str::contains("response code 1006"));
}

#[test]
fn test_run_unreachable_plan_reports_failures() {
    let dir = TempDir::new().unwrap();
    let plan = write_plan(
        &dir,
        "name: down\nsamples:\n  - name: nothing\n    context_path: ws://127.0.0.1:1/\n    connection_timeout: 1000\n",
    );
    wsprobe()
        .arg("run")
        .arg(&plan)
        .args(["--iterations", "2", "--format", "json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"failed\": 2"))
        .stderr(predicate::str::contains("nothing: 2 of 2 failed"))
        .stderr(predicate::str::contains("2 of 2 samples failed"));
}
