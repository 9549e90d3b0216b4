//! CLI integration tests
//!
//! Tests the command-line interface using assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the safe-action binary
fn safe_action_cmd() -> Command {
    Command::cargo_bin("safe-action").unwrap()
}

// ─────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    safe_action_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("safe-action"))
        .stdout(predicate::str::contains("demo"))
        .stdout(predicate::str::contains("version"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_command() {
    safe_action_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("safe-action"))
        .stdout(predicate::str::contains("Build Information"))
        .stdout(predicate::str::contains("Git Hash"))
        .stdout(predicate::str::contains("Target"));
}

#[test]
fn test_short_version_flag() {
    safe_action_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("safe-action"));
}

// ─────────────────────────────────────────────────────────────────
// Config Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_config_init_then_validate_and_show() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("safe-action.toml");

    safe_action_cmd()
        .args(["config", "init", "--path"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file created"));
    assert!(path.exists());

    safe_action_cmd()
        .args(["config", "validate", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));

    safe_action_cmd()
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[serializer]"))
        .stdout(predicate::str::contains("[logging]"))
        .stdout(predicate::str::contains("[demo]"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("safe-action.toml");
    std::fs::write(&path, "[demo]\nusers = 5\n").unwrap();

    safe_action_cmd()
        .args(["config", "init", "--path"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    safe_action_cmd()
        .args(["config", "init", "--force", "--path"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn test_config_validate_nonexistent_file() {
    safe_action_cmd()
        .args(["config", "validate", "--config", "/nonexistent/path/config.toml"])
        .assert()
        .failure()
        .code(10)
        .stderr(predicate::str::contains("not found"))
        .stderr(predicate::str::contains("config init"));
}

#[test]
fn test_config_validate_rejects_zero_capacity() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[serializer]\nqueue_capacity = 0\n").unwrap();

    safe_action_cmd()
        .args(["config", "validate", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .code(10)
        .stderr(predicate::str::contains("queue_capacity"));
}

// ─────────────────────────────────────────────────────────────────
// Demo Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_demo_help() {
    safe_action_cmd()
        .args(["demo", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--users"))
        .stdout(predicate::str::contains("--scenario"))
        .stdout(predicate::str::contains("--remove-mode"));
}

#[test]
fn test_demo_json_report() {
    safe_action_cmd()
        .args(["-q", "demo", "--users", "12", "--remove-mode", "sync", "--json"])
        .env("SAFE_ACTION_DEMO_MAX_JITTER_MS", "2")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"scenario\": \"create-then-delete\""))
        .stdout(predicate::str::contains("\"scenario\": \"create-and-delete\""))
        .stdout(predicate::str::contains("\"created\": 12"))
        .stdout(predicate::str::contains("\"final_counts\": {}"));
}

#[test]
fn test_demo_single_scenario_text_report() {
    safe_action_cmd()
        .args(["-q", "demo", "--users", "9", "--scenario", "create-and-delete"])
        .env("SAFE_ACTION_DEMO_MAX_JITTER_MS", "1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Scenario create-and-delete"))
        .stdout(predicate::str::contains("Subscriptions created: 9"))
        .stdout(predicate::str::contains("create-then-delete").not());
}

#[test]
fn test_demo_rejects_zero_users() {
    safe_action_cmd()
        .args(["-q", "demo", "--users", "0"])
        .assert()
        .failure()
        .code(10);
}

#[test]
fn test_demo_rejects_huge_user_count() {
    safe_action_cmd()
        .args(["-q", "demo", "--users", "18446744073709551615"])
        .assert()
        .failure()
        .code(10)
        .stderr(predicate::str::contains("users must be between"));
}

#[test]
fn test_demo_with_invalid_config() {
    safe_action_cmd()
        .args(["demo", "--config", "/nonexistent/config.toml"])
        .assert()
        .failure();
}

// ─────────────────────────────────────────────────────────────────
// Verbosity Flag Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_verbose_flag() {
    safe_action_cmd().arg("-v").arg("version").assert().success();
}

#[test]
fn test_quiet_flag() {
    safe_action_cmd().arg("--quiet").arg("version").assert().success();
}

// ─────────────────────────────────────────────────────────────────
// Error Handling Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_command() {
    safe_action_cmd()
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_missing_subcommand() {
    safe_action_cmd().assert().failure();
}
