//! Implementation of the `ensemble env` command.
//!
//! Prints the environment a build's script runs with as `export` lines, so a
//! shell can `eval` it and work inside the build by hand.

use std::path::Path;

use anyhow::{Context, Result};

use super::open_project;

pub fn cmd_env(project: &Path, state_dir: Option<&Path>, target: &str) -> Result<()> {
  let project = open_project(project, state_dir)?;
  let env = project
    .environment(target)
    .with_context(|| format!("Failed to resolve {target}"))?;
  for (name, value) in &env {
    println!("{}", export_var(name, value));
  }
  Ok(())
}

/// A POSIX shell `export` statement with the value single-quoted.
fn export_var(name: &str, value: &str) -> String {
  format!("export {}='{}'", name, value.replace('\'', r"'\''"))
}
