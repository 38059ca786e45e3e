//! Plan execution module.
//!
//! Runs a [`Plan`] on a bounded pool of blocking workers. It handles:
//! - Dispatching actions as soon as their dependencies have completed
//! - Fail-fast: after the first failure nothing new is started
//! - Cooperative cancellation through a [`CancellationToken`]

pub mod cursor;
pub mod interrupt;
mod types;

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use petgraph::stable_graph::NodeIndex;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::action::{ActionError, RunContext};
use crate::graph::ActionGraph;
use crate::plan::Plan;

pub use cursor::TopologicalCursor;
pub use types::{ActionFailure, ExecuteConfig, ExecuteError, ExecutionReport};

/// Execute every action of `plan`.
///
/// An action starts only after all of its dependencies completed. At most
/// `config.parallelism` actions run at once; ready actions are dispatched in
/// name order.
///
/// # Arguments
///
/// * `plan` - The resolved plan to run
/// * `config` - Execution configuration
/// * `cancel` - Cancelled on interrupt; the run then returns
///   [`ExecuteError::Interrupted`] without waiting for running actions
///
/// # Returns
///
/// An [`ExecutionReport`]. Action failures are reported there, not as errors.
pub async fn execute(
  plan: &Plan,
  config: &ExecuteConfig,
  cancel: CancellationToken,
) -> Result<ExecutionReport, ExecuteError> {
  run_graph(plan.graph(), config, cancel).await
}

async fn run_graph(
  graph: &ActionGraph,
  config: &ExecuteConfig,
  cancel: CancellationToken,
) -> Result<ExecutionReport, ExecuteError> {
  let total = graph.len();
  info!(
    actions = total,
    parallelism = config.parallelism,
    pretend = config.pretend,
    "starting execution"
  );

  let mut cursor = TopologicalCursor::new(graph);
  let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));
  let mut join_set: JoinSet<Result<(), ActionError>> = JoinSet::new();
  let mut in_flight: HashMap<Id, NodeIndex> = HashMap::new();
  let mut queue: VecDeque<NodeIndex> = VecDeque::new();
  let mut report = ExecutionReport::default();
  let mut started = 0;
  let mut failing = false;

  loop {
    if cancel.is_cancelled() {
      warn!(running = join_set.len(), "execution interrupted");
      return Err(ExecuteError::Interrupted);
    }

    if !failing {
      queue.extend(cursor.take_ready());
    }

    while !failing && let Some(&idx) = queue.front() {
      let Ok(permit) = semaphore.clone().try_acquire_owned() else {
        break;
      };
      queue.pop_front();

      let Some(action) = graph.node(idx).action().cloned() else {
        cursor.done(idx);
        queue.extend(cursor.take_ready());
        continue;
      };

      let ctx = RunContext {
        pretend: config.pretend,
        explicitly_requested: graph.true_roots().iter().any(|root| root == action.name()),
      };
      let handle = join_set.spawn_blocking(move || {
        let _permit = permit;
        action.run(&ctx)
      });
      in_flight.insert(handle.id(), idx);
      started += 1;

      info!(
        current = started,
        total,
        running = ?running_names(&cursor, &in_flight),
        "running actions"
      );
    }

    if join_set.is_empty() {
      if failing || cursor.is_finished() {
        break;
      }
      let pending = cursor.blocked_names();
      error!(pending = ?pending, "no action is ready but the plan is not finished");
      return Err(ExecuteError::Stalled { pending });
    }

    let joined = tokio::select! {
      biased;
      _ = cancel.cancelled() => {
        warn!(running = join_set.len(), "execution interrupted");
        return Err(ExecuteError::Interrupted);
      }
      joined = join_set.join_next_with_id() => joined,
    };
    let Some(joined) = joined else {
      continue;
    };

    match joined {
      Ok((id, result)) => {
        let Some(idx) = in_flight.remove(&id) else {
          continue;
        };
        let name = cursor.name(idx).to_string();
        match result {
          Ok(()) => {
            debug!(action = %name, "action completed");
            cursor.done(idx);
            report.completed.push(name);
          }
          Err(e) => {
            error!(action = %name, error = %e, "action failed");
            report.failed.push(ActionFailure {
              name,
              error: e.to_string(),
            });
            failing = true;
          }
        }
      }
      Err(join_err) => {
        let name = in_flight
          .remove(&join_err.id())
          .map(|idx| cursor.name(idx).to_string())
          .unwrap_or_default();
        let message = describe_join_error(join_err);
        error!(action = %name, error = %message, "action panicked");
        report.failed.push(ActionFailure { name, error: message });
        failing = true;
      }
    }

    if failing && !queue.is_empty() {
      warn!(cancelled = queue.len(), "cancelling queued actions after failure");
      report
        .cancelled
        .extend(queue.drain(..).map(|idx| cursor.name(idx).to_string()));
    }
  }

  if failing {
    let never_started: Vec<String> = cursor
      .take_ready()
      .into_iter()
      .map(|idx| cursor.name(idx).to_string())
      .chain(cursor.blocked_names())
      .collect();
    report.cancelled.extend(never_started);
  }

  info!(
    completed = report.completed.len(),
    failed = report.failed.len(),
    cancelled = report.cancelled.len(),
    "execution complete"
  );

  Ok(report)
}

fn running_names(cursor: &TopologicalCursor, in_flight: &HashMap<Id, NodeIndex>) -> Vec<String> {
  let mut names: Vec<String> = in_flight.values().map(|&idx| cursor.name(idx).to_string()).collect();
  names.sort();
  names
}

fn describe_join_error(err: JoinError) -> String {
  if !err.is_panic() {
    return err.to_string();
  }
  let payload: Box<dyn Any + Send> = err.into_panic();
  if let Some(msg) = payload.downcast_ref::<&str>() {
    format!("panicked: {msg}")
  } else if let Some(msg) = payload.downcast_ref::<String>() {
    format!("panicked: {msg}")
  } else {
    "panicked".to_string()
  }
}
