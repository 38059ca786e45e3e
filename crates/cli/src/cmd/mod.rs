mod components;
mod env;
mod graph;
mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use ensemble_lib::project::{Project, load_project};

pub use components::cmd_components;
pub use env::cmd_env;
pub use graph::cmd_graph;
pub use run::{RunOptions, cmd_run};

/// Overrides the state directory when `--state-dir` is not given.
pub const STATE_DIR_ENV: &str = "ENSEMBLE_STATE_DIR";

/// Where build state lives: `--state-dir`, then `ENSEMBLE_STATE_DIR`, then
/// `.ensemble` next to the project file.
pub fn resolve_state_dir(project: &Path, explicit: Option<&Path>) -> PathBuf {
  if let Some(dir) = explicit {
    return dir.to_path_buf();
  }
  if let Some(dir) = std::env::var_os(STATE_DIR_ENV).filter(|v| !v.is_empty()) {
    return PathBuf::from(dir);
  }
  project.parent().unwrap_or(Path::new(".")).join(".ensemble")
}

pub fn open_project(project: &Path, state_dir: Option<&Path>) -> Result<Project> {
  let state_dir = resolve_state_dir(project, state_dir);
  load_project(project, &state_dir).with_context(|| format!("Failed to load project: {}", project.display()))
}
