//! Integration tests for the `camprov` CLI binary.
//!
//! Every run uses a seeded, zero-latency, failure-free simulated fleet and
//! a throwaway HOME, so nothing touches the user's real configuration.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

const FLEET_SIZE: usize = 3;

/// Build a [`Command`] for the `camprov` binary with env isolation.
fn camprov_cmd(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("camprov");
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env_remove("CAMPROV_CONFIG")
        .env_remove("RUST_LOG")
        .env("CAMPROV_SIMULATION__FLEET_SIZE", FLEET_SIZE.to_string())
        .env("CAMPROV_SIMULATION__SEED", "42")
        .env("CAMPROV_SIMULATION__VISIBILITY", "1.0")
        .env("CAMPROV_SIMULATION__DISCOVERY_LATENCY_MS", "0")
        .env("CAMPROV_SIMULATION__APPLY_LATENCY_MS", "0")
        .env("CAMPROV_SIMULATION__DISCOVERY_FAILURE_RATE", "0.0")
        .env("CAMPROV_SIMULATION__APPLY_FAILURE_RATE", "0.0")
        .env("CAMPROV_SIMULATION__QUERY_FAILURE_RATE", "0.0")
        .env("CAMPROV_SIMULATION__UNREACHABLE_RATE", "0.0");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn json_stdout(cmd: &mut assert_cmd::Command) -> Value {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "command failed:\n{}",
        combined_output(&output)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("camprov.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

fn field<'a>(device: &'a Value, key: &str) -> &'a str {
    device[key].as_str().unwrap_or_default()
}

fn macs(home: &TempDir) -> Vec<String> {
    let output = camprov_cmd(home).args(["scan", "-o", "plain"]).output().unwrap();
    String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let output = camprov_cmd(&home).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    camprov_cmd(&home).arg("--help").assert().success().stdout(
        predicate::str::contains("scan")
            .and(predicate::str::contains("provision"))
            .and(predicate::str::contains("pool"))
            .and(predicate::str::contains("run")),
    );
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    camprov_cmd(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("camprov"));
}

#[test]
fn test_invalid_subcommand() {
    let home = TempDir::new().unwrap();
    let output = camprov_cmd(&home).arg("foobar").output().unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("foobar"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let home = TempDir::new().unwrap();
    camprov_cmd(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    let home = TempDir::new().unwrap();
    camprov_cmd(&home)
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("elsewhere.toml");
    camprov_cmd(&home)
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("elsewhere.toml"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("nested").join("camprov.toml");

    camprov_cmd(&home)
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("[pool]"));
    assert!(written.contains("prefix = \"192.168.1\""));

    let output = camprov_cmd(&home)
        .args(["config", "init", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6));
    assert!(combined_output(&output).contains("--force"));

    camprov_cmd(&home)
        .args(["config", "init", "--force", "--config"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn test_config_show_missing_explicit_file() {
    let home = TempDir::new().unwrap();
    let output = camprov_cmd(&home)
        .args(["config", "show", "--config"])
        .arg(home.path().join("absent.toml"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("config init"));
}

#[test]
fn test_config_show_reflects_env_overrides() {
    let home = TempDir::new().unwrap();
    let cfg = json_stdout(
        camprov_cmd(&home)
            .env("CAMPROV_POOL__START", "20")
            .args(["config", "show", "-o", "json"]),
    );
    assert_eq!(cfg["pool"]["start"], 20);
    assert_eq!(cfg["pool"]["end"], 99);
    assert_eq!(cfg["orchestrator"]["mode"], "automatic");
}

#[test]
fn test_invalid_config_is_a_usage_error() {
    let home = TempDir::new().unwrap();
    let path = write_config(&home, "[pool]\nstart = 50\nend = 40\n");
    let output = camprov_cmd(&home)
        .args(["scan", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("pool.start"));
}

// ── Scan ────────────────────────────────────────────────────────────

#[test]
fn test_scan_assigns_pool_addresses_in_order() {
    let home = TempDir::new().unwrap();
    let devices = json_stdout(camprov_cmd(&home).args(["scan", "-o", "json"]));
    let devices = devices.as_array().unwrap();
    assert_eq!(devices.len(), FLEET_SIZE);

    let mut pending: Vec<&str> = devices.iter().map(|d| field(d, "pending_address")).collect();
    pending.sort_unstable();
    assert_eq!(pending, ["192.168.1.10", "192.168.1.11", "192.168.1.12"]);
    assert!(devices.iter().all(|d| field(d, "state") == "discovered"));
}

#[test]
fn test_scan_in_manual_mode_leaves_cameras_unassigned() {
    let home = TempDir::new().unwrap();
    let devices = json_stdout(camprov_cmd(&home).args(["scan", "--mode", "manual", "-o", "json"]));
    assert!(
        devices
            .as_array()
            .unwrap()
            .iter()
            .all(|d| d["pending_address"].is_null())
    );
}

#[test]
fn test_repeated_cycles_do_not_duplicate_cameras() {
    let home = TempDir::new().unwrap();
    let devices = json_stdout(camprov_cmd(&home).args(["scan", "--cycles", "3", "-o", "json"]));
    assert_eq!(devices.as_array().unwrap().len(), FLEET_SIZE);
}

#[test]
fn test_scan_discovery_failure() {
    let home = TempDir::new().unwrap();
    let output = camprov_cmd(&home)
        .env("CAMPROV_SIMULATION__DISCOVERY_FAILURE_RATE", "1.0")
        .arg("scan")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));
    assert!(combined_output(&output).contains("Discovery failed"));
}

// ── Provision ───────────────────────────────────────────────────────

#[test]
fn test_provision_configures_every_camera() {
    let home = TempDir::new().unwrap();
    let devices = json_stdout(camprov_cmd(&home).args(["provision", "-o", "json"]));

    for device in devices.as_array().unwrap() {
        assert_eq!(field(device, "state"), "configured");
        assert!(field(device, "current_address").starts_with("192.168.1."));
        assert!(device["pending_address"].is_null());
        assert_eq!(device["attempt_count"], 1);
    }
}

#[test]
fn test_provision_honors_pins_and_skips() {
    let home = TempDir::new().unwrap();
    let ids = macs(&home);
    assert_eq!(ids.len(), FLEET_SIZE);

    let pin = format!("{}=192.168.1.50", ids[0]);
    let devices = json_stdout(camprov_cmd(&home).args([
        "provision",
        "--mode",
        "manual",
        "--assign",
        &pin,
        "--skip",
        &ids[1],
        "-o",
        "json",
    ]));

    let by_mac = |mac: &str| {
        devices
            .as_array()
            .unwrap()
            .iter()
            .find(|d| field(d, "hardware_id") == mac)
            .unwrap()
            .clone()
    };
    let pinned = by_mac(&ids[0]);
    assert_eq!(field(&pinned, "state"), "configured");
    assert_eq!(field(&pinned, "current_address"), "192.168.1.50");
    assert_eq!(field(&by_mac(&ids[1]), "state"), "skipped");
    assert_eq!(field(&by_mac(&ids[2]), "state"), "discovered");
}

#[test]
fn test_provision_rejects_out_of_range_pin() {
    let home = TempDir::new().unwrap();
    let ids = macs(&home);
    let output = camprov_cmd(&home)
        .args(["provision", "--assign"])
        .arg(format!("{}=10.0.0.1", ids[0]))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("not in the managed range"));
}

#[test]
fn test_provision_unknown_camera() {
    let home = TempDir::new().unwrap();
    let output = camprov_cmd(&home)
        .args(["provision", "--skip", "00:11:22:33:44:55"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("not found"));
}

// ── Pool ────────────────────────────────────────────────────────────

#[test]
fn test_pool_shows_range_and_next_candidate() {
    let home = TempDir::new().unwrap();
    let path = write_config(&home, "[pool]\nreserved = [\"192.168.1.10\"]\n");
    let pool = json_stdout(
        camprov_cmd(&home)
            .args(["pool", "-o", "json", "--config"])
            .arg(Path::new(&path)),
    );
    assert_eq!(pool["range"], "192.168.1.10-99");
    assert_eq!(pool["capacity"], 90);
    assert_eq!(pool["free"], 89);
    assert_eq!(pool["next"], "192.168.1.11");
}
