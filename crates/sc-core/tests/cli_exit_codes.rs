//! Exit code contract of the sc-core binary.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;

fn sc_core() -> Command {
    let mut cmd = cargo_bin_cmd!("sc-core");
    cmd.env_remove("SCRIPTCAST_CONFIG")
        .env_remove("SCRIPTCAST_CONFIG_DIR")
        .env("SC_LOG", "off");
    cmd
}

fn write_config(dir: &tempfile::TempDir, body: &str) -> String {
    let path = dir.path().join("scriptcast.json");
    std::fs::write(&path, body).unwrap();
    path.display().to_string()
}

#[test]
fn version_is_clean() {
    sc_core()
        .arg("version")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("sc-core"));
}

#[test]
fn version_json_has_schema() {
    let output = sc_core().args(["version", "-f", "json"]).output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["schema_version"], "1.0.0");
}

#[test]
fn unknown_argument_is_args_error() {
    sc_core().arg("--no-such-flag").assert().code(10);
}

#[test]
fn missing_config_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    sc_core()
        .args(["config", "check"])
        .arg(&path)
        .assert()
        .code(11)
        .stderr(predicate::str::contains("Configuration Error"));
}

#[test]
fn invalid_config_value_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, r#"{"schema_version":"1.0.0","refresh":{"interval_ms":0}}"#);
    sc_core()
        .args(["--config", &path, "config", "check"])
        .assert()
        .code(11)
        .stderr(predicate::str::contains("refresh.interval_ms"));
}

#[test]
fn config_error_json_is_structured() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "{ nope");
    let output = sc_core()
        .args(["--config", &path, "-f", "json", "config", "show"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(11));
    let err: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["code"], 10);
    assert_eq!(err["category"], "config");
}

#[test]
fn valid_config_checks_clean() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, r#"{"schema_version":"1.0.0"}"#);
    sc_core()
        .args(["--config", &path, "config", "check"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Valid"));
}

#[test]
fn config_show_reports_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"{"schema_version":"1.0.0","boundary":{"success_marker":"ok"}}"#,
    );
    let output = sc_core()
        .args(["--config", &path, "-f", "json", "config", "show"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["settings"]["boundary"]["success_marker"], "ok");
    assert_eq!(doc["source"]["hash"].as_str().map(str::len), Some(64));
}

#[test]
fn clients_without_bridge_is_boundary_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"{"schema_version":"1.0.0","boundary":{"library_path":"/nonexistent/libscbridge.so"}}"#,
    );
    sc_core()
        .args(["--config", &path, "clients"])
        .assert()
        .code(12)
        .stderr(predicate::str::contains("Native Boundary Unavailable"));
}

#[test]
fn missing_script_is_io_error() {
    sc_core()
        .args(["check", "/nonexistent/script.lua"])
        .assert()
        .code(21)
        .stderr(predicate::str::contains("I/O Error"));
}
