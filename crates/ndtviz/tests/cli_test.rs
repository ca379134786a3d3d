//! Integration tests for the `ndtviz` CLI binary.
//!
//! These tests validate argument parsing, help output, shell completions,
//! config handling, and offline topology layout without a live backend.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `ndtviz` binary with env isolation.
///
/// Clears all `NDTVIZ_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn ndtviz_cmd() -> assert_cmd::Command {
    isolated_cmd(Path::new("/tmp/ndtviz-cli-test-nonexistent"))
}

fn isolated_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ndtviz");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env_remove("NDTVIZ_PROFILE")
        .env_remove("NDTVIZ_BACKEND")
        .env_remove("NDTVIZ_FEED")
        .env_remove("NDTVIZ_OUTPUT")
        .env_remove("NDTVIZ_INSECURE")
        .env_remove("NDTVIZ_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const LAB: &str = r"
name: twin
topology:
  kinds:
    nokia_srlinux:
      image: ghcr.io/nokia/srlinux
  nodes:
    leaf1:
      kind: nokia_srlinux
    spine1:
      kind: nokia_srlinux
  links:
    - endpoints: [leaf1:e1-1, spine1:e1-1]
    - endpoints: [spine1:e1-2, leaf1:e1-2]
";

fn write_lab(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("twin.clab.yml");
    std::fs::write(&path, LAB).unwrap();
    path
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = ndtviz_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    ndtviz_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("telemetry")
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("skew"))
            .and(predicate::str::contains("replay")),
    );
}

#[test]
fn test_version_flag() {
    ndtviz_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ndtviz"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    ndtviz_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    ndtviz_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = ndtviz_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(text.contains("foobar") || text.contains("unrecognized"), "{text}");
}

#[test]
fn test_watch_without_backend() {
    ndtviz_cmd()
        .arg("watch")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("No backend configured"));
}

#[test]
fn test_unknown_profile() {
    ndtviz_cmd()
        .args(["--profile", "nope", "skew"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_invalid_output_format() {
    let output = ndtviz_cmd()
        .args(["--output", "xml", "watch"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("xml"));
}

#[test]
fn test_device_and_link_conflict() {
    let output = ndtviz_cmd()
        .args(["watch", "--device", "leaf1", "--link", "a:e1,b:e2"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("cannot be used with"));
}

#[test]
fn test_replay_requires_at() {
    ndtviz_cmd()
        .arg("replay")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--at"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_defaults() {
    ndtviz_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[defaults]")
                .and(predicate::str::contains("export_delimiter = \";\""))
                .and(predicate::str::contains("history_window = 120")),
        );
}

#[test]
fn test_config_path() {
    ndtviz_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_then_profiles() {
    let home = tempfile::tempdir().unwrap();

    isolated_cmd(home.path())
        .args(["config", "init", "--backend", "http://twin:8000", "--name", "lab"])
        .assert()
        .success();

    isolated_cmd(home.path())
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lab *"));

    // Re-running without --force refuses to clobber the profile.
    isolated_cmd(home.path())
        .args(["config", "init", "--backend", "http://other:8000", "--name", "lab"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_config_init_rejects_bad_url() {
    let home = tempfile::tempdir().unwrap();
    isolated_cmd(home.path())
        .args(["config", "init", "--backend", "ws://twin:8000"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_config_use_unknown_profile() {
    ndtviz_cmd()
        .args(["config", "use", "ghost"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("ghost"));
}

// ── Offline topology ────────────────────────────────────────────────

#[test]
fn test_topology_file_without_backend() {
    let dir = tempfile::tempdir().unwrap();
    let lab = write_lab(dir.path());

    ndtviz_cmd()
        .args(["topology", "--file"])
        .arg(&lab)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("leaf1:e1-1")
                .and(predicate::str::contains("1/2"))
                .and(predicate::str::contains("2/2")),
        );
}

#[test]
fn test_topology_file_json_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let lab = write_lab(dir.path());

    let output = ndtviz_cmd()
        .args(["--output", "json", "topology", "--file"])
        .arg(&lab)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let links: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let offsets: Vec<f64> = links
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["offset"].as_f64().unwrap())
        .collect();
    assert_eq!(offsets.len(), 2);
    assert!((offsets[0] + offsets[1]).abs() < 1e-9);
    assert!(offsets[0] < offsets[1]);
}

#[test]
fn test_topology_nodes_plain() {
    let dir = tempfile::tempdir().unwrap();
    let lab = write_lab(dir.path());

    ndtviz_cmd()
        .args(["--output", "plain", "topology", "--nodes", "--file"])
        .arg(&lab)
        .assert()
        .success()
        .stdout(predicate::str::diff("leaf1\nspine1\n"));
}

#[test]
fn test_topology_missing_file() {
    ndtviz_cmd()
        .args(["topology", "--file", "/tmp/ndtviz-no-such-lab.clab.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ndtviz-no-such-lab"));
}
