//! Script work implementation.
//!
//! Runs a shell script for one action and records success by writing a marker
//! file into the action's state directory. The marker is what makes the action
//! satisfied on the next invocation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::action::{ActionError, RunContext, Work};

/// Marker file written after a successful run.
pub const DONE_MARKER: &str = ".ensemble_done";

/// A shell script with its own state directory.
#[derive(Debug, Clone)]
pub struct ScriptWork {
  name: String,
  script: String,
  state_dir: PathBuf,
  cwd: Option<PathBuf>,
  env: BTreeMap<String, String>,
}

impl ScriptWork {
  /// `name` is only used in logs and errors.
  pub fn new(name: impl Into<String>, script: impl Into<String>, state_dir: impl Into<PathBuf>) -> Self {
    Self {
      name: name.into(),
      script: script.into(),
      state_dir: state_dir.into(),
      cwd: None,
      env: BTreeMap::new(),
    }
  }

  /// Run the script in `cwd` instead of the state directory.
  pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  /// Add an environment variable for the script.
  pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn state_dir(&self) -> &Path {
    &self.state_dir
  }

  pub fn marker_path(&self) -> PathBuf {
    self.state_dir.join(DONE_MARKER)
  }

  /// Variables the script runs with, on top of the inherited environment.
  ///
  /// Per-build variables override the `ENSEMBLE_*` ones.
  pub fn environment(&self) -> BTreeMap<String, String> {
    let mut env = BTreeMap::from([
      ("ENSEMBLE_ACTION".to_string(), self.name.clone()),
      ("ENSEMBLE_STATE_DIR".to_string(), self.state_dir.display().to_string()),
    ]);
    env.extend(self.env.iter().map(|(key, value)| (key.clone(), value.clone())));
    env
  }
}

impl Work for ScriptWork {
  fn is_satisfied(&self) -> bool {
    self.marker_path().exists()
  }

  fn run(&self, ctx: &RunContext) -> Result<(), ActionError> {
    if ctx.pretend {
      info!(action = %self.name, script = %self.script, "would run script");
      return Ok(());
    }

    if self.is_satisfied() && ctx.explicitly_requested {
      info!(action = %self.name, "already satisfied, running anyway");
    }

    std::fs::create_dir_all(&self.state_dir)?;
    let working_dir = self.cwd.as_deref().unwrap_or(&self.state_dir);

    let (shell, shell_args) = shell();
    let mut command = Command::new(shell);
    command
      .args(shell_args)
      .arg(&self.script)
      .current_dir(working_dir)
      .envs(self.environment());

    info!(action = %self.name, "running script");
    debug!(shell = %shell, working_dir = ?working_dir, "spawning process");

    let output = command.output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.trim().is_empty() {
      debug!(action = %self.name, stdout = %stdout.trim(), "script stdout");
    }
    if !stderr.trim().is_empty() {
      debug!(action = %self.name, stderr = %stderr.trim(), "script stderr");
    }

    if !output.status.success() {
      return Err(ActionError::CmdFailed {
        cmd: self.script.clone(),
        code: output.status.code(),
      });
    }

    std::fs::write(self.marker_path(), b"")?;
    Ok(())
  }

  fn check_prerequisites(&self) -> Result<(), ActionError> {
    match &self.cwd {
      Some(cwd) if !cwd.is_dir() => Err(ActionError::Prerequisite {
        action: self.name.clone(),
        message: format!("working directory {} does not exist", cwd.display()),
      }),
      _ => Ok(()),
    }
  }
}

#[cfg(unix)]
fn shell() -> (&'static str, &'static [&'static str]) {
  ("/bin/sh", &["-c"])
}

#[cfg(windows)]
fn shell() -> (&'static str, &'static [&'static str]) {
  ("cmd.exe", &["/C"])
}
