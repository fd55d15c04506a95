//! CLI smoke tests against the real binary and a throwaway root dir.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn tm(root: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tm").unwrap();
    cmd.arg("--root").arg(root.path()).arg("--quiet");
    cmd
}

fn stdout_json(root: &TempDir, args: &[&str]) -> Value {
    let output = tm(root)
        .args(args)
        .arg("--robot")
        .output()
        .expect("run tm");
    assert!(
        output.status.success(),
        "command {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("robot output is JSON")
}

#[test]
fn init_creates_root_and_config() {
    let root = TempDir::new().unwrap();
    tm(&root)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));

    assert!(root.path().join("tm.db").exists());
    assert!(root.path().join("config.toml").exists());

    // Idempotent.
    tm(&root).arg("init").assert().success();
}

#[test]
fn employee_roundtrip_via_cli() {
    let root = TempDir::new().unwrap();
    tm(&root).arg("init").assert().success();

    tm(&root)
        .args([
            "employee",
            "add",
            "Ada",
            "--skill",
            "rust:24:12",
            "--productivity",
            "0.8",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added employee Ada"));

    tm(&root)
        .args(["employee", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ada").and(predicate::str::contains("rust")));
}

#[test]
fn full_assignment_cycle_via_cli() {
    let root = TempDir::new().unwrap();
    tm(&root).arg("init").assert().success();

    let employee = stdout_json(
        &root,
        &["employee", "add", "Ada", "--skill", "rust", "--productivity", "0.8"],
    );
    let employee_id = employee["id"].as_str().unwrap().to_string();

    let task = stdout_json(
        &root,
        &[
            "task",
            "add",
            "Ship exporter",
            "--skill",
            "rust",
            "--difficulty",
            "2",
            "--due-in-hours",
            "48",
        ],
    );
    let task_id = task["id"].as_str().unwrap().to_string();

    // Preview, then assign.
    tm(&root)
        .args(["recommend", &task_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ada"));

    let assignment = stdout_json(&root, &["assign", &task_id]);
    assert_eq!(assignment["employee_id"].as_str().unwrap(), employee_id);
    assert_eq!(assignment["context"]["values"].as_array().unwrap().len(), 8);

    // Complete and check the feedback payload.
    let feedback = stdout_json(&root, &["complete", &task_id]);
    assert_eq!(feedback["task_id"].as_str().unwrap(), task_id);
    let reward = feedback["components"]["reward_value"].as_f64().unwrap();
    assert!((reward - 1.7).abs() < 1e-9);

    tm(&root)
        .args(["stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("updates=1"));

    tm(&root)
        .args(["task", "list", "--status", "done"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ship exporter"));
}

#[test]
fn duplicate_completion_fails_with_code() {
    let root = TempDir::new().unwrap();
    tm(&root).arg("init").assert().success();

    stdout_json(&root, &["employee", "add", "Ada", "--skill", "rust"]);
    let task = stdout_json(&root, &["task", "add", "Fix bug", "--skill", "rust"]);
    let task_id = task["id"].as_str().unwrap().to_string();

    stdout_json(&root, &["assign", &task_id]);
    stdout_json(&root, &["complete", &task_id]);

    let output = tm(&root)
        .args(["complete", &task_id, "--robot"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(err["error"]["code"].as_str().unwrap(), "TASK_ALREADY_COMPLETED");
    assert_eq!(err["error"]["numeric_code"].as_u64().unwrap(), 103);
}

#[test]
fn unknown_task_is_a_clean_error() {
    let root = TempDir::new().unwrap();
    tm(&root).arg("init").assert().success();

    tm(&root)
        .args(["assign", "no-such-task"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Task not found"));
}

#[test]
fn rework_flows_into_reward() {
    let root = TempDir::new().unwrap();
    tm(&root).arg("init").assert().success();

    stdout_json(&root, &["employee", "add", "Ada", "--skill", "rust"]);
    let task = stdout_json(
        &root,
        &["task", "add", "Refactor", "--skill", "rust", "--difficulty", "2"],
    );
    let task_id = task["id"].as_str().unwrap().to_string();

    stdout_json(&root, &["assign", &task_id]);
    tm(&root)
        .args(["rework", &task_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("count: 1"));

    let feedback = stdout_json(&root, &["complete", &task_id]);
    let p_rework = feedback["components"]["p_rework"].as_f64().unwrap();
    assert!((p_rework - -0.5).abs() < 1e-9);
}
