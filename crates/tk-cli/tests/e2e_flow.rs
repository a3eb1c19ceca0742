//! End-to-end tests driving the `tk` binary.
//!
//! Each test runs against a file backend in its own temporary HOME, so
//! state carries over between invocations exactly as it would for a user.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

fn tk_binary() -> String {
    env!("CARGO_BIN_EXE_tk").to_string()
}

fn store_path(home: &Path) -> PathBuf {
    home.join("timers.json")
}

/// Runs `tk` with the given arguments and returns its parsed stdout.
fn tk(home: &Path, args: &[&str]) -> Value {
    let output = tk_raw(home, args);
    assert!(
        output.status.success(),
        "tk {} should succeed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn tk_raw(home: &Path, args: &[&str]) -> std::process::Output {
    Command::new(tk_binary())
        .env("HOME", home)
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("XDG_DATA_HOME")
        .env("TK_ACTOR", "e2e")
        .env("TK_BACKEND__KIND", "file")
        .env("TK_BACKEND__PATH", store_path(home))
        .args(args)
        .output()
        .expect("failed to run tk")
}

fn id(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}

/// Test the full timer lifecycle with explicit timestamps.
#[test]
fn test_timer_lifecycle() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();

    let timer = tk(home, &["timer", "create", "--comment", "client call"]);
    let timer_id = id(&timer);
    assert_eq!(timer["elapsed_ms"], 0);
    assert_eq!(timer["audit"]["last_updated_by"], "e2e");

    let started = tk(
        home,
        &["timer", "start", &timer_id, "--at", "2024-01-15T09:00:00Z"],
    );
    let first_slice = started["active_time_slice_id"].as_str().unwrap().to_string();

    // Starting again is a no-op.
    let again = tk(
        home,
        &["timer", "start", &timer_id, "--at", "2024-01-15T09:00:30Z"],
    );
    assert_eq!(again["active_time_slice_id"], first_slice.as_str());

    let paused = tk(
        home,
        &["timer", "pause", &timer_id, "--at", "2024-01-15T09:01:00Z"],
    );
    assert_eq!(paused["elapsed_ms"], 60_000);
    assert!(paused.get("active_time_slice_id").is_none());

    tk(
        home,
        &["timer", "start", &timer_id, "--at", "2024-01-15T10:00:00Z"],
    );
    let submitted = tk(
        home,
        &["timer", "submit", &timer_id, "--at", "2024-01-15T10:00:01Z"],
    );
    assert_eq!(submitted["elapsed_ms"], 61_000);
    assert_eq!(submitted["completed"], true);
    assert_eq!(submitted["finish"], "2024-01-15T10:00:01Z");

    let slices = tk(home, &["slice", "list", "--timer", &timer_id]);
    assert_eq!(slices.as_array().unwrap().len(), 2);

    // The document is human-readable JSON keyed by collection.
    let document: Value =
        serde_json::from_str(&std::fs::read_to_string(store_path(home)).unwrap()).unwrap();
    assert!(document["timers"].get(&timer_id).is_some());
    assert!(document["time_slices"].get(&first_slice).is_some());
}

/// Test that pausing a stopped timer fails with a readable error.
#[test]
fn test_pause_without_start_fails() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    let timer_id = id(&tk(home, &["timer", "create"]));

    let output = tk_raw(home, &["timer", "pause", &timer_id]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("has no active time slice"),
        "unexpected stderr: {stderr}"
    );
}

/// Test that deletes are blocked by dependents until they are removed.
#[test]
fn test_delete_respects_references() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();

    let employee = tk(home, &["employee", "create", "--email", "ada@example.com"]);
    let employee_id = id(&employee);
    let timer_id = id(&tk(
        home,
        &["timer", "create", "--employee", &employee_id],
    ));
    let slice_id = tk(home, &["timer", "start", &timer_id])["active_time_slice_id"]
        .as_str()
        .unwrap()
        .to_string();

    let output = tk_raw(home, &["employee", "delete", &employee_id]);
    assert!(!output.status.success());
    let output = tk_raw(home, &["timer", "delete", &timer_id]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("still referenced"));

    tk(home, &["slice", "delete", &slice_id]);
    tk(home, &["timer", "delete", &timer_id]);
    let deleted = tk(home, &["employee", "delete", &employee_id]);
    assert_eq!(deleted["deleted"], employee_id.as_str());

    assert_eq!(tk(home, &["timer", "list"]), Value::Array(Vec::new()));
}
