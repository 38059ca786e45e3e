//! Types for plan execution.
//!
//! This module defines the error type, the report and the configuration for
//! running a [`Plan`](crate::plan::Plan).

use std::fmt;

use thiserror::Error;

/// Errors that abort a run as a whole.
///
/// Individual action failures are not errors at this level; they are
/// collected in [`ExecutionReport::failed`].
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// Nothing is ready and nothing is running, yet actions remain. The plan
  /// was not acyclic.
  #[error("internal error: no action is ready but {} remain: {}", pending.len(), pending.join(", "))]
  Stalled { pending: Vec<String> },

  /// The run was cancelled by an interrupt.
  #[error("interrupted")]
  Interrupted,
}

impl ExecuteError {
  pub fn is_internal(&self) -> bool {
    matches!(self, ExecuteError::Stalled { .. })
  }
}

/// An action that failed, with the rendered error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
  pub name: String,
  pub error: String,
}

impl fmt::Display for ActionFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.name, self.error)
  }
}

/// Outcome of executing a plan.
#[derive(Debug, Default)]
pub struct ExecutionReport {
  /// Actions that ran to completion, in completion order.
  pub completed: Vec<String>,

  /// Actions that failed. Fail-fast keeps this to the first failure plus any
  /// action that was already running at the time.
  pub failed: Vec<ActionFailure>,

  /// Actions that never started because an earlier action failed.
  pub cancelled: Vec<String>,
}

impl ExecutionReport {
  /// Returns true if no action failed.
  pub fn is_success(&self) -> bool {
    self.failed.is_empty()
  }

  /// Returns the total number of actions accounted for.
  pub fn total(&self) -> usize {
    self.completed.len() + self.failed.len() + self.cancelled.len()
  }
}

/// Configuration for plan execution.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Maximum number of actions to run in parallel.
  pub parallelism: usize,

  /// Dry run: actions only report what they would do.
  pub pretend: bool,
}

impl ExecuteConfig {
  /// Configuration with the given worker count, clamped to at least one.
  pub fn with_parallelism(parallelism: usize) -> Self {
    Self {
      parallelism: parallelism.max(1),
      ..Default::default()
    }
  }
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      pretend: false,
    }
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
