//! Smoke tests for the listsweep CLI
//!
//! Only commands that need no browser run here.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the listsweep binary
fn listsweep() -> Command {
    let mut cmd = Command::cargo_bin("listsweep").expect("listsweep binary should exist");
    cmd.env_remove("LISTSWEEP_STATE").env_remove("LISTSWEEP_CONFIG");
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_help_flag() {
    listsweep()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("select-all"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("stats"));
}

#[test]
fn test_version_flag() {
    listsweep()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("listsweep"));
}

#[test]
fn test_no_args_fails() {
    listsweep().assert().failure();
}

#[test]
fn test_delete_help_mentions_confirmation() {
    listsweep()
        .args(["delete", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"))
        .stdout(predicate::str::contains("--all"));
}

#[test]
fn test_select_without_ids_fails() {
    listsweep().arg("select").assert().failure();
}

// ============================================================================
// Stats (no browser)
// ============================================================================

#[test]
fn test_stats_initializes_state_file() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.json");

    listsweep()
        .args(["stats", "--color", "never", "--state"])
        .arg(&state)
        .assert()
        .success()
        .stdout(predicate::str::contains("Total deleted:      0"))
        .stdout(predicate::str::contains("Last used:          never"))
        .stdout(predicate::str::contains("Average per day:    0.0"));

    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&state).unwrap()).unwrap();
    assert_eq!(saved["statistics"]["totalDeleted"], 0);
    assert!(saved["statistics"]["installDate"].is_string());
}

#[test]
fn test_stats_reads_existing_counters() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.json");
    fs::write(
        &state,
        r#"{
  "enabled": true,
  "selectedIds": ["abc"],
  "statistics": {
    "totalDeleted": 30,
    "installDate": "2020-01-01T00:00:00Z",
    "lastUsed": "2020-01-11T12:00:00Z"
  }
}"#,
    )
    .unwrap();

    listsweep()
        .arg("stats")
        .arg("--state")
        .arg(&state)
        .assert()
        .success()
        .stdout(predicate::str::contains("Total deleted:      30"))
        .stdout(predicate::str::contains("Installed:          2020-01-01"))
        .stdout(predicate::str::contains("Last used:          2020-01-11"));

    // other keys survive untouched
    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&state).unwrap()).unwrap();
    assert_eq!(saved["selectedIds"][0], "abc");
}

#[test]
fn test_stats_rejects_corrupt_state_file() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.json");
    fs::write(&state, "[1, 2, 3]").unwrap();

    listsweep()
        .arg("stats")
        .arg("--state")
        .arg(&state)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_stats_reads_millisecond_dates_without_rewriting() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.json");
    let original = r#"{"statistics":{"totalDeleted":120,"installDate":1700000000000,"lastUsed":null}}"#;
    fs::write(&state, original).unwrap();

    listsweep()
        .arg("stats")
        .arg("--state")
        .arg(&state)
        .assert()
        .success()
        .stdout(predicate::str::contains("Total deleted:      120"))
        .stdout(predicate::str::contains("Installed:          2023-11-14"));

    assert_eq!(fs::read_to_string(&state).unwrap(), original);
}
