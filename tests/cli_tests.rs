//! CLI integration tests
//!
//! Tests the command-line interface using assert_cmd

mod common;

use predicates::prelude::*;

use common::{read_json, Sandbox};

// ─────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    Sandbox::new()
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("launch"))
        .stdout(predicate::str::contains("wait"))
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_command() {
    Sandbox::new()
        .cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("sciplan "))
        .stdout(predicate::str::contains("Target:"));
}

// ─────────────────────────────────────────────────────────────────
// Plan Workflow Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_launch_status_wait_fetch_mock_plan() {
    let sandbox = Sandbox::new();
    let plan = sandbox.write_mock_plan("plan.json", &["A", "B"]);

    sandbox
        .cmd()
        .args(["launch", "--yes"])
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::contains("launched  A"))
        .stdout(predicate::str::contains("launched  B"))
        .stdout(predicate::str::contains("plan id"));

    let doc = read_json(&plan);
    assert!(doc["id"].is_string());
    for task in doc["tasks"].as_array().unwrap() {
        assert!(task["ref"].as_str().unwrap().starts_with("mock-"));
        assert!(task["agent_ref"].is_string());
    }
    let stored = sandbox
        .plans_dir()
        .join(format!("{}.json", doc["id"].as_str().unwrap()));
    assert!(stored.exists());

    sandbox
        .cmd()
        .arg("status")
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::contains("A"));

    sandbox
        .cmd()
        .args(["wait", "--interval", "0.001"])
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::contains("COMPLETED"));

    let out = sandbox.path().join("results");
    sandbox
        .cmd()
        .arg("fetch")
        .arg(&plan)
        .arg("--dir")
        .arg(&out)
        .assert()
        .success();
    let snapshot = std::fs::read_to_string(out.join("plan.json")).unwrap();
    assert!(snapshot.contains("\"A\"") && snapshot.contains("\"B\""));
}

#[test]
fn test_launch_declined_is_aborted() {
    let sandbox = Sandbox::new();
    let plan = sandbox.write_mock_plan("plan.json", &["A"]);

    sandbox
        .cmd()
        .arg("launch")
        .arg(&plan)
        .write_stdin("n\n")
        .assert()
        .failure()
        .code(60)
        .stderr(predicate::str::contains("confirm"));

    assert!(read_json(&plan)["tasks"][0]["ref"].is_null());
}

#[test]
fn test_launch_accepts_empty_answer() {
    let sandbox = Sandbox::new();
    let plan = sandbox.write_mock_plan("plan.json", &["A"]);

    sandbox
        .cmd()
        .arg("launch")
        .arg(&plan)
        .write_stdin("\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Launch? [Y/n]"));
}

#[test]
fn test_relaunch_keeps_refs_without_force() {
    let sandbox = Sandbox::new();
    let plan = sandbox.write_mock_plan("plan.json", &["A"]);

    sandbox.cmd().args(["launch", "-y"]).arg(&plan).assert().success();
    let first = read_json(&plan)["tasks"][0]["ref"].clone();

    sandbox.cmd().args(["launch", "-y"]).arg(&plan).assert().success();
    assert_eq!(read_json(&plan)["tasks"][0]["ref"], first);

    sandbox.cmd().args(["launch", "-y", "--force"]).arg(&plan).assert().success();
    assert_ne!(read_json(&plan)["tasks"][0]["ref"], first);
}

#[test]
fn test_status_before_launch_fails() {
    let sandbox = Sandbox::new();
    let plan = sandbox.write_mock_plan("plan.json", &["A"]);

    sandbox
        .cmd()
        .arg("status")
        .arg(&plan)
        .assert()
        .failure()
        .code(60)
        .stderr(predicate::str::contains("E600"));
}

#[test]
fn test_wait_rejects_oversized_interval() {
    let sandbox = Sandbox::new();
    let plan = sandbox.write_mock_plan("plan.json", &["A"]);
    sandbox.cmd().args(["launch", "-y"]).arg(&plan).assert().success();

    sandbox
        .cmd()
        .arg("wait")
        .arg(&plan)
        .args(["--interval", "1e300"])
        .assert()
        .failure()
        .code(10)
        .stderr(predicate::str::contains("too large"));
}

#[test]
fn test_missing_plan_file() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["status", "nope.json"])
        .assert()
        .failure()
        .code(20);
}

#[test]
fn test_plans_and_show() {
    let sandbox = Sandbox::new();
    let plan = sandbox.write_mock_plan("plan.json", &["A"]);
    sandbox.cmd().args(["launch", "--yes"]).arg(&plan).assert().success();
    let id = read_json(&plan)["id"].as_str().unwrap().to_string();

    sandbox
        .cmd()
        .arg("plans")
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()));

    sandbox
        .cmd()
        .args(["show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"app_id\": \"Echo\""));

    sandbox
        .cmd()
        .args(["show", "does-not-exist"])
        .assert()
        .failure()
        .code(60);
}

#[test]
fn test_stop_mock_plan() {
    let sandbox = Sandbox::new();
    let plan = sandbox.write_mock_plan("plan.json", &["A", "B"]);
    sandbox.cmd().args(["launch", "--yes"]).arg(&plan).assert().success();

    sandbox
        .cmd()
        .arg("stop")
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 task(s)"));
}

// ─────────────────────────────────────────────────────────────────
// Config Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_redacts_token() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["config", "show"])
        .env("SCIPLAN_ACCESS_TOKEN", "very-secret")
        .assert()
        .success()
        .stdout(predicate::str::contains("[gateway]"))
        .stdout(predicate::str::contains("very-secret").not());
}

#[test]
fn test_config_init_and_force() {
    let sandbox = Sandbox::new();
    let target = sandbox.path().join("new").join("config.toml");

    sandbox
        .cmd()
        .args(["config", "init", "--path"])
        .arg(&target)
        .assert()
        .success();
    assert!(target.exists());

    sandbox
        .cmd()
        .args(["config", "init", "--path"])
        .arg(&target)
        .assert()
        .failure();

    sandbox
        .cmd()
        .args(["config", "init", "--force", "--path"])
        .arg(&target)
        .assert()
        .success();
}
