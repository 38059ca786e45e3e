//! CLI smoke tests for ensemble.
//!
//! These tests run the real binary against small projects in temp
//! directories and check output and exit codes.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the ensemble binary, rooted in `dir`.
fn ensemble_cmd(dir: &TempDir) -> Command {
  let mut cmd = cargo_bin_cmd!("ensemble");
  cmd.current_dir(dir.path()).env_remove("ENSEMBLE_STATE_DIR");
  cmd
}

/// Create a temp directory holding an `ensemble.json`.
fn temp_project(content: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("ensemble.json"), content).unwrap();
  temp
}

/// zlib has two builds; curl depends on whichever zlib build is chosen.
const PROJECT: &str = r#"{
  "components": {
    "zlib": {
      "default_build": "release",
      "builds": {
        "release": { "script": "true" },
        "debug": { "script": "true" }
      }
    },
    "curl": {
      "builds": {
        "default": { "script": "echo built > curl.out", "dependencies": ["zlib"] }
      }
    }
  }
}"#;

const FAILING_PROJECT: &str = r#"{
  "components": {
    "base": { "builds": { "default": { "script": "exit 3" } } },
    "app": { "builds": { "default": { "script": "true", "dependencies": ["base"] } } }
  }
}"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  let temp = TempDir::new().unwrap();
  ensemble_cmd(&temp)
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  let temp = TempDir::new().unwrap();
  ensemble_cmd(&temp)
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("ensemble"));
}

#[test]
fn subcommand_help_works() {
  let temp = TempDir::new().unwrap();
  for sub in ["run", "graph", "components", "env"] {
    ensemble_cmd(&temp).args([sub, "--help"]).assert().success();
  }
}

#[test]
fn run_requires_a_target() {
  let temp = temp_project(PROJECT);
  ensemble_cmd(&temp).arg("run").assert().failure();
}

// =============================================================================
// Components
// =============================================================================

#[test]
fn components_lists_builds() {
  let temp = temp_project(PROJECT);
  ensemble_cmd(&temp)
    .arg("components")
    .assert()
    .success()
    .stdout(predicate::str::contains("zlib"))
    .stdout(predicate::str::contains("release"))
    .stdout(predicate::str::contains("(default)"));
}

#[test]
fn components_json_is_parseable() {
  let temp = temp_project(PROJECT);
  let output = ensemble_cmd(&temp).args(["components", "--json"]).output().unwrap();
  assert!(output.status.success());

  let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let names: Vec<_> = value.as_array().unwrap().iter().map(|c| c["name"].as_str().unwrap()).collect();
  assert_eq!(names, vec!["curl", "zlib"]);
}

#[test]
fn components_report_satisfaction_after_a_run() {
  let temp = temp_project(PROJECT);
  ensemble_cmd(&temp).args(["run", "zlib"]).assert().success();

  let output = ensemble_cmd(&temp).args(["components", "--json"]).output().unwrap();
  let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let zlib = value.as_array().unwrap().iter().find(|c| c["name"] == "zlib").unwrap();
  let release = zlib["builds"].as_array().unwrap().iter().find(|b| b["name"] == "zlib@release").unwrap();
  assert_eq!(release["satisfied"], true);
  assert_eq!(release["up_to_date"], true);

  let curl = value.as_array().unwrap().iter().find(|c| c["name"] == "curl").unwrap();
  assert_eq!(curl["builds"][0]["satisfied"], false);
}

// =============================================================================
// Graph
// =============================================================================

#[test]
fn graph_prints_dot() {
  let temp = temp_project(PROJECT);
  ensemble_cmd(&temp)
    .args(["graph", "curl"])
    .assert()
    .success()
    .stdout(predicate::str::starts_with("digraph"))
    .stdout(predicate::str::contains("zlib@release"))
    .stdout(predicate::str::contains("zlib@debug").not());
}

// =============================================================================
// Run
// =============================================================================

#[test]
fn pretend_runs_nothing() {
  let temp = temp_project(PROJECT);
  ensemble_cmd(&temp)
    .args(["run", "curl", "--pretend"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Would run"));

  assert!(!temp.path().join(".ensemble/curl/default/curl.out").exists());
}

#[test]
fn run_builds_then_reports_up_to_date() {
  let temp = temp_project(PROJECT);
  ensemble_cmd(&temp)
    .args(["run", "curl"])
    .assert()
    .success()
    .stdout(predicate::str::contains("zlib@release"))
    .stdout(predicate::str::contains("curl@default"));

  assert!(temp.path().join(".ensemble/curl/default/curl.out").exists());

  ensemble_cmd(&temp)
    .args(["run", "curl"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to do"));
}

#[test]
fn force_reruns_requested_target_only() {
  let temp = temp_project(PROJECT);
  ensemble_cmd(&temp).args(["run", "curl"]).assert().success();

  ensemble_cmd(&temp)
    .args(["run", "curl", "--force"])
    .assert()
    .success()
    .stdout(predicate::str::contains("curl@default"))
    .stdout(predicate::str::contains("zlib@release").not());
}

#[test]
fn state_dir_flag_is_honoured() {
  let temp = temp_project(PROJECT);
  let state = temp.path().join("state");
  ensemble_cmd(&temp)
    .args(["run", "zlib@debug", "--state-dir"])
    .arg(&state)
    .assert()
    .success();

  assert!(state.join("zlib/debug/.ensemble_done").exists());
  assert!(!temp.path().join(".ensemble").exists());
}

#[test]
fn state_dir_env_is_honoured() {
  let temp = temp_project(PROJECT);
  let state = temp.path().join("from-env");
  ensemble_cmd(&temp)
    .env("ENSEMBLE_STATE_DIR", &state)
    .args(["run", "zlib"])
    .assert()
    .success();

  assert!(state.join("zlib/release/.ensemble_done").exists());
}

#[test]
fn failing_action_exits_with_failure() {
  let temp = temp_project(FAILING_PROJECT);
  ensemble_cmd(&temp)
    .args(["run", "app"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("base@default failed"))
    .stderr(predicate::str::contains("app@default"));
}

// =============================================================================
// Env
// =============================================================================

#[test]
fn env_prints_exports_for_the_default_build() {
  let temp = temp_project(PROJECT);
  ensemble_cmd(&temp)
    .args(["env", "zlib"])
    .assert()
    .success()
    .stdout(predicate::str::contains("export ENSEMBLE_ACTION='zlib@release'"))
    .stdout(predicate::str::contains("export ENSEMBLE_STATE_DIR="))
    .stdout(predicate::str::contains("zlib/release"));
}

#[cfg(unix)]
#[test]
fn env_output_can_be_evaluated() {
  let temp = temp_project(PROJECT);
  let output = ensemble_cmd(&temp).args(["env", "curl@default"]).output().unwrap();
  assert!(output.status.success());

  let script = format!("{}\necho \"$ENSEMBLE_ACTION\"", String::from_utf8(output.stdout).unwrap());
  let shell = std::process::Command::new("sh").arg("-c").arg(script).output().unwrap();
  assert_eq!(String::from_utf8_lossy(&shell.stdout).trim(), "curl@default");
}

#[test]
fn env_for_unknown_target_is_an_error() {
  let temp = temp_project(PROJECT);
  ensemble_cmd(&temp)
    .args(["env", "openssl"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("openssl"));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn unknown_target_is_an_error() {
  let temp = temp_project(PROJECT);
  ensemble_cmd(&temp)
    .args(["run", "openssl"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("openssl"));
}

#[test]
fn missing_project_is_an_error() {
  let temp = TempDir::new().unwrap();
  ensemble_cmd(&temp)
    .args(["components"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Failed to load project"));
}

#[test]
fn invalid_project_is_an_error() {
  let temp = temp_project(r#"{ "components": { "a": { "bogus": 1 } } }"#);
  ensemble_cmd(&temp).args(["components"]).assert().code(1);
}
