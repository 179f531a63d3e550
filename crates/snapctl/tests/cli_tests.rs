//! CLI integration tests.
//!
//! These run the binary for behaviour that needs no snapper daemon.

use std::process::Command;

fn snapctl() -> Command {
    Command::new(env!("CARGO_BIN_EXE_snapctl"))
}

#[test]
fn test_help_command() {
    let output = snapctl().arg("--help").output().expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Filesystem snapshots, diffs and undo via snapper"));
    assert!(stdout.contains("--config"));
    assert!(stdout.contains("undo"));
    assert!(stdout.contains("baseline"));
}

#[test]
fn test_version_flag() {
    let output = snapctl().arg("--version").output().expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("snapctl "));
}

#[test]
fn test_set_config_rejects_bad_pair() {
    let output = snapctl()
        .args(["set-config", "SYNC_ACL"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("expected KEY=VALUE"));
}

#[test]
fn test_operations_listing() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, "{}").unwrap();

    let output = snapctl()
        .arg("--config-file")
        .arg(&config)
        .arg("operations")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let operations: std::collections::BTreeMap<String, String> =
        serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = operations.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["cmd.run", "test.ping"]);
}

#[test]
fn test_missing_config_file() {
    let output = snapctl()
        .args(["--config-file", "/nonexistent/snapctl.json", "list-snapshots"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read /nonexistent/snapctl.json"));
}
