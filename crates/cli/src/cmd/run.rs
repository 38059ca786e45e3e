//! Implementation of the `ensemble run` command.
//!
//! Plans the requested targets and executes the plan, printing a summary of
//! completed, failed and cancelled actions.

use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use ensemble_lib::execute::{ExecuteConfig, ExecuteError, execute, interrupt};
use ensemble_lib::plan::{PlanOptions, plan};

use super::open_project;
use crate::output::{count, format_duration, print_error, print_success, print_warning, symbols};

pub struct RunOptions {
  pub plan: PlanOptions,
  pub pretend: bool,
  pub jobs: Option<usize>,
}

/// Execute the run command.
///
/// Returns a failure exit code when any action failed. Planning errors and
/// interrupts are returned as errors so the caller can map them to their own
/// exit codes.
pub fn cmd_run(project: &Path, state_dir: Option<&Path>, targets: &[String], options: &RunOptions) -> Result<ExitCode> {
  let project = open_project(project, state_dir)?;
  let plan = plan(project.actions(), targets, &options.plan).context("Failed to plan")?;

  if plan.is_empty() {
    print_success("Nothing to do, everything is up to date");
    return Ok(ExitCode::SUCCESS);
  }

  let mut config = match options.jobs {
    Some(jobs) => ExecuteConfig::with_parallelism(jobs),
    None => ExecuteConfig::default(),
  };
  config.pretend = options.pretend;
  debug!(parallelism = config.parallelism, actions = plan.len(), "executing plan");

  let rt = Runtime::new().context("Failed to create async runtime")?;
  let start = Instant::now();
  let result = rt.block_on(async {
    let token = CancellationToken::new();
    let watcher = tokio::spawn(interrupt::watch(token.clone()));
    let result = execute(&plan, &config, token.clone()).await;
    token.cancel();
    let _ = watcher.await;
    result
  });
  release_runtime(rt, matches!(result, Err(ExecuteError::Interrupted)));
  let report = result?;
  let elapsed = start.elapsed();

  for name in &report.completed {
    println!("  {} {}", symbols::ARROW, name);
  }

  if report.is_success() {
    let verb = if options.pretend { "Would run" } else { "Ran" };
    print_success(&format!(
      "{} {} in {}",
      verb,
      count(report.completed.len(), "action"),
      format_duration(elapsed)
    ));
    return Ok(ExitCode::SUCCESS);
  }

  for failure in &report.failed {
    print_error(&format!("{} failed: {}", failure.name, failure.error));
  }
  if !report.cancelled.is_empty() {
    print_warning(&format!(
      "{} not started: {}",
      count(report.cancelled.len(), "action"),
      report.cancelled.join(", ")
    ));
  }
  Ok(ExitCode::FAILURE)
}

/// Drop the runtime. After an interrupt, blocking actions may still be
/// running; they are detached instead of waited for.
fn release_runtime(rt: Runtime, interrupted: bool) {
  if interrupted {
    debug!("detaching actions still running after interrupt");
    rt.shutdown_background();
  }
}
