//! End-to-end tests for the `chordprobe` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn chordprobe() -> Command {
    let mut cmd = Command::cargo_bin("chordprobe").unwrap();
    cmd.env("RUST_LOG", "warn");
    cmd
}

/// Config that keeps simulated runs fast: one repetition, short pauses.
const FAST_CONFIG: &str = r#"
[oracle]
required_checks = 2
poll_interval_ms = 10
retry_pause_ms = 10

[scenarios]
repetitions = 1
growth_sizes = [2, 4]
shrink_pairs = [[4, 2]]
crash_network_size = 4
settle_after_reset_ms = 0
settle_after_join_ms = 0
settle_after_leave_ms = 0

[throughput]
network_size = 4
pairs = 20
repetitions = 1
join_interval_ms = 0
"#;

#[test]
fn help_lists_commands() {
    chordprobe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("bench"))
        .stdout(predicate::str::contains("health"))
        .stdout(predicate::str::contains("report"));
}

#[test]
fn health_on_simulated_cluster() {
    chordprobe()
        .args(["--sim", "4", "health"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Healthy nodes: 4/4"));
}

#[test]
fn health_without_nodes_fails() {
    chordprobe()
        .arg("health")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No node addresses"));
}

#[test]
fn malformed_address_is_rejected() {
    chordprobe()
        .args(["health", "not-an-address"])
        .assert()
        .failure();
}

#[test]
fn bench_on_simulated_cluster_writes_results() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("chordprobe.toml");
    let output = dir.path().join("results.json");
    fs::write(&config, FAST_CONFIG).unwrap();

    chordprobe()
        .arg("--config")
        .arg(&config)
        .args(["--sim", "4", "--seed", "1", "bench", "--output"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("GROWTH Experiment:"))
        .stdout(predicate::str::contains("CRASH Experiment:"));

    let json = fs::read_to_string(&output).unwrap();
    assert!(json.contains("\"experiment\": \"growth\""));
    assert!(json.contains("\"experiment\": \"shrink\""));

    chordprobe()
        .arg("report")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("SHRINK Experiment:"))
        .stdout(predicate::str::contains("Successful: 1 (100.0%)"));
}

#[test]
fn throughput_on_simulated_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("chordprobe.toml");
    fs::write(&config, FAST_CONFIG).unwrap();

    chordprobe()
        .arg("--config")
        .arg(&config)
        .args(["--sim", "4", "throughput"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Average throughput for 4 nodes"));
}

#[test]
fn reconfigure_on_simulated_cluster() {
    chordprobe()
        .args([
            "--sim",
            "3",
            "reconfigure",
            "--max-nodes",
            "8",
            "--finger-table-size",
            "3",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reconfigured 3 nodes"));
}

#[test]
fn unsatisfiable_oracle_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("chordprobe.toml");
    fs::write(&config, "[oracle]\nrequired_checks = 0\n").unwrap();

    chordprobe()
        .arg("--config")
        .arg(&config)
        .args(["--sim", "3", "health"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required_checks"));
}

#[test]
fn oversized_simulated_cluster_is_rejected() {
    chordprobe()
        .args(["--sim", "60000", "health"])
        .assert()
        .failure();
}

#[test]
fn report_on_missing_file_fails() {
    chordprobe()
        .args(["report", "/nonexistent/results.json"])
        .assert()
        .failure();
}
