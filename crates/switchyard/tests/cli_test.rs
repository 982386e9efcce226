//! Integration tests for the `switchyard` CLI binary.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `switchyard` binary with env isolation.
///
/// Points config directories at `home` so tests never touch the user's
/// real configuration.
fn switchyard_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("switchyard");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("SWITCHYARD_CONFIG")
        .env_remove("SWITCHYARD_OUTPUT")
        .env_remove("SWITCHYARD_ENGINE__INITIAL_OWNER")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const TWO_SWITCHES: &str = r#"{ "steps": [
    { "op": "commit", "writes": [
        { "type": "put_node", "id": "openflow:1" },
        { "type": "put_node", "id": "openflow:2" },
        { "type": "put_port", "id": "openflow:1:1", "enabled": true, "speed_kbps": 10000000 },
        { "type": "put_port", "id": "openflow:2:1", "enabled": true, "speed_kbps": 10000000 }
    ] },
    { "op": "commit", "writes": [
        { "type": "put_link", "id": "l-1-2", "source": "openflow:1:1", "destination": "openflow:2:1" }
    ] }
] }"#;

fn write_scenario(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("scenario.json");
    std::fs::write(&path, body).unwrap();
    path
}

fn replay_json(home: &Path, scenario: &Path, extra: &[&str]) -> serde_json::Value {
    let output = switchyard_cmd(home)
        .arg("replay")
        .arg(scenario)
        .args(extra)
        .args(["-o", "json-compact"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    serde_json::from_slice(&output.stdout).unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = switchyard_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    switchyard_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("replay")
            .and(predicate::str::contains("static"))
            .and(predicate::str::contains("config")),
    );
}

// ── Replay ──────────────────────────────────────────────────────────

#[test]
fn test_replay_materializes_link() {
    let home = tempfile::tempdir().unwrap();
    let scenario = write_scenario(home.path(), TWO_SWITCHES);
    let report = replay_json(home.path(), &scenario, &[]);

    let links = report["topology"]["links"].as_array().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0]["id"], "l-1-2");

    let events = report["events"].as_array().unwrap();
    assert_eq!(events[0]["kind"], "node");
    assert_eq!(events[0]["update_type"], "CREATED");
    let isl_change = events
        .iter()
        .find(|e| e["kind"] == "port" && e["update_type"] == "CHANGED")
        .unwrap();
    assert_eq!(isl_change["has_inter_switch_link"], true);
}

#[test]
fn test_replay_observer_publishes_nothing() {
    let home = tempfile::tempdir().unwrap();
    let scenario = write_scenario(home.path(), TWO_SWITCHES);
    let report = replay_json(home.path(), &scenario, &["--observer"]);

    assert!(report["events"].as_array().unwrap().is_empty());
    assert_eq!(report["topology"]["nodes"].as_array().unwrap().len(), 2);
}

#[test]
fn test_replay_edge_port_parks_link() {
    let home = tempfile::tempdir().unwrap();
    let body = TWO_SWITCHES.replacen(
        r#""steps": ["#,
        r#""steps": [ { "op": "edge_port", "port": "openflow:2:1" },"#,
        1,
    );
    let scenario = write_scenario(home.path(), &body);
    let report = replay_json(home.path(), &scenario, &["--topology-only"]);

    assert!(report.get("events").is_none());
    assert!(report["topology"]["links"].as_array().unwrap().is_empty());
    let ignored = report["topology"]["ignored_links"].as_array().unwrap();
    assert_eq!(ignored[0]["id"], "l-1-2");
}

#[test]
fn test_replay_persist_writes_static_files() {
    let home = tempfile::tempdir().unwrap();
    let statics = home.path().join("statics");
    let config = home.path().join("switchyard.toml");
    std::fs::write(
        &config,
        format!("[static_topology]\ndirectory = {:?}\n", statics.display().to_string()),
    )
    .unwrap();
    let scenario = write_scenario(
        home.path(),
        r#"{ "steps": [ { "op": "edge_port", "port": "openflow:9:1" } ] }"#,
    );

    switchyard_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .arg("replay")
        .arg(&scenario)
        .arg("--persist")
        .assert()
        .success();

    switchyard_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["static", "show", "-o", "json-compact"])
        .assert()
        .success()
        .stdout(predicate::str::contains("openflow:9:1"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_replay_missing_file() {
    let home = tempfile::tempdir().unwrap();
    let output = switchyard_cmd(home.path())
        .args(["replay", "/nonexistent/scenario.json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("Could not read scenario"));
}

#[test]
fn test_replay_invalid_scenario_is_usage_error() {
    let home = tempfile::tempdir().unwrap();
    let scenario = write_scenario(home.path(), r#"{ "steps": [ { "op": "reboot" } ] }"#);
    let output = switchyard_cmd(home.path())
        .arg("replay")
        .arg(&scenario)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Invalid scenario"));
}

#[test]
fn test_invalid_engine_config_fails() {
    let home = tempfile::tempdir().unwrap();
    let scenario = write_scenario(home.path(), TWO_SWITCHES);
    let output = switchyard_cmd(home.path())
        .env("SWITCHYARD_ENGINE__PORT_COST_BASE", "0")
        .arg("replay")
        .arg(&scenario)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_init_then_show() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("cfg").join("switchyard.toml");

    switchyard_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(config.exists());

    switchyard_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .code(2);

    switchyard_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("port_cost_base = 10000000000"));
}
