//! ---
//! qnet_section: "05-external-interfaces"
//! qnet_subsection: "binary"
//! qnet_type: "source"
//! qnet_scope: "code"
//! qnet_description: "Control CLI for solving closed queueing networks."
//! qnet_version: "v0.0.0-prealpha"
//! qnet_owner: "tbd"
//! ---
use std::fs;

use assert_cmd::Command;
use tempfile::TempDir;

fn qnetctl(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("qnetctl").unwrap();
    cmd.current_dir(dir.path()).env_remove("QNET_CONFIG");
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn solve_prints_worked_example() {
    let dir = tempfile::tempdir().unwrap();
    let output = qnetctl(&dir)
        .args(["solve", "--loads", "2,3", "--population", "3"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["g"], serde_json::json!([1.0, 5.0, 19.0, 65.0]));
    assert_eq!(value["policy"]["strategy"], "direct");
}

#[test]
fn solve_honours_strategy_override() {
    let dir = tempfile::tempdir().unwrap();
    let output = qnetctl(&dir)
        .args([
            "solve",
            "--loads",
            "2,3",
            "--population",
            "3",
            "--strategy",
            "log-domain",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["policy"]["strategy"], "log-domain");
    let g3 = value["g"][3].as_f64().unwrap();
    assert!((g3 - 65.0).abs() < 1e-9);
}

#[test]
fn invalid_inputs_fail() {
    let dir = tempfile::tempdir().unwrap();
    qnetctl(&dir)
        .args(["solve", "--population", "5"])
        .assert()
        .failure();
    qnetctl(&dir)
        .args(["solve", "--loads", "1,-2", "--population", "2"])
        .assert()
        .failure();
    qnetctl(&dir)
        .args(["solve", "--loads", "1", "--population", "-1"])
        .assert()
        .failure();
    qnetctl(&dir)
        .args([
            "solve",
            "--loads",
            "1",
            "--population",
            "1",
            "--strategy",
            "rescale",
            "--threshold",
            "0.5",
        ])
        .assert()
        .failure();
}

#[test]
fn analyze_exports_reports() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("net.yaml"),
        "population: 3\nqueues:\n  - load: 2.0\n  - load: 3.0\n",
    )
    .unwrap();

    let output = qnetctl(&dir)
        .args(["analyze", "--network", "net.yaml", "--output", "out"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["population"], 3);
    assert_eq!(report["queues"].as_array().unwrap().len(), 2);
    assert!(dir.path().join("out/normalization.json").exists());
    assert!(dir.path().join("out/performance.json").exists());
}

#[test]
fn batch_reports_each_line() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("batch.jsonl"),
        concat!(
            r#"{"population": 3, "queues": [{"load": 2.0}, {"load": 3.0}]}"#,
            "\n",
            r#"{"population": 2, "queues": [{"load": 0.0}]}"#,
            "\n",
        ),
    )
    .unwrap();

    let output = qnetctl(&dir)
        .args(["batch", "--input", "batch.jsonl"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    let ln_g = lines[0]["ln_g"].as_f64().unwrap();
    assert!((ln_g - 65f64.ln()).abs() < 1e-12);
    assert!(lines[1]["error"].as_str().unwrap().contains("zero"));
}

#[test]
fn batch_keeps_going_past_malformed_lines() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("batch.jsonl"),
        concat!(
            r#"{"population": 1, "queues": [{"load": 2.0}]}"#,
            "\n",
            "{broken\n",
            "\n",
            r#"{"population": -4, "queues": [{"load": 2.0}]}"#,
            "\n",
            r#"{"population": 3, "queues": [{"load": 2.0}, {"load": 3.0}]}"#,
            "\n",
        ),
    )
    .unwrap();

    let output = qnetctl(&dir)
        .args(["batch", "--input", "batch.jsonl"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let records: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 4);
    assert_eq!(records[1]["line"], 2);
    assert!(records[1]["error"].is_string());
    assert!(records[1].get("population").is_none());
    assert_eq!(records[2]["line"], 4);
    assert!(records[2]["error"].as_str().unwrap().contains("non-negative"));
    assert_eq!(records[3]["line"], 5);
    assert_eq!(records[3]["population"], 3);
    assert!(records[3]["error"].is_null());
}

#[test]
fn config_reads_file_from_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("qnet.toml"),
        "[solver]\nstrategy = \"rescale\"\nrescale_threshold = 1e20\n",
    )
    .unwrap();

    let output = qnetctl(&dir).arg("config").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("# loaded from qnet.toml"));
    assert!(stdout.contains("strategy = \"rescale\""));
}
