//! Planner entry point: from requested targets to an executable DAG.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::action::{Action, ActionSet};
use crate::graph::builder::build_graph;
use crate::graph::ordering::enforce_build_ordering;
use crate::graph::reduce::{drop_root, remove_satisfied_attracting_components, remove_unreachable, simplify_choices};
use crate::graph::reduction::transitive_reduction;
use crate::graph::resolver::resolve_choices;
use crate::graph::{ActionGraph, GraphError};

/// Flags controlling how the plan is built.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
  /// Plan exactly the requested actions, without their dependencies.
  pub no_deps: bool,
  /// Keep requested actions in the plan even when they are already satisfied.
  pub force: bool,
}

/// A resolved, acyclic plan ready for execution.
#[derive(Debug, Clone)]
pub struct Plan {
  graph: ActionGraph,
}

impl Plan {
  pub fn graph(&self) -> &ActionGraph {
    &self.graph
  }

  /// The requested targets, after choices were replaced by their alternative.
  pub fn roots(&self) -> &[String] {
    self.graph.true_roots()
  }

  pub fn is_explicitly_requested(&self, name: &str) -> bool {
    self.roots().iter().any(|root| root == name)
  }

  /// Number of actions that will run.
  pub fn len(&self) -> usize {
    self.graph.len()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.is_empty()
  }

  pub fn action_names(&self) -> Vec<String> {
    self.graph.names()
  }

  pub fn action(&self, name: &str) -> Option<&Arc<Action>> {
    self.graph.index_of(name).and_then(|idx| self.graph.node(idx).action())
  }

  pub fn to_dot(&self) -> String {
    self.graph.to_dot()
  }
}

/// Resolve `requested` against `actions` into an acyclic plan.
///
/// # Errors
///
/// Unknown names, unsatisfiable choices, unresolvable build ordering and
/// failed prerequisite checks are user-facing errors. A cycle that survives
/// resolution is reported as [`GraphError::CycleAfterResolution`].
pub fn plan(actions: &ActionSet, requested: &[String], options: &PlanOptions) -> Result<Plan, GraphError> {
  let mut graph = build_graph(actions, requested, options.no_deps)?;
  resolve_choices(&mut graph)?;

  remove_unreachable(&mut graph);
  simplify_choices(&mut graph);
  drop_root(&mut graph);
  let pruned = remove_satisfied_attracting_components(&mut graph, options.force);
  enforce_build_ordering(&mut graph)?;
  transitive_reduction(&mut graph);

  if let Some(cycle) = graph.cycles(None).into_iter().next() {
    let cycle: Vec<String> = cycle.into_iter().map(|idx| graph.name(idx).to_string()).collect();
    error!(cycle = ?cycle, "cycle remains after resolution");
    return Err(GraphError::CycleAfterResolution { cycle });
  }

  for name in graph.names() {
    if let Some(action) = graph.index_of(&name).and_then(|idx| graph.node(idx).action()) {
      debug!(action = %name, "checking prerequisites");
      action.assert_prerequisites_are_met().map_err(GraphError::Prerequisite)?;
    }
  }

  info!(
    actions = graph.len(),
    edges = graph.edge_count(),
    pruned,
    roots = ?graph.true_roots(),
    "plan ready"
  );
  Ok(Plan { graph })
}
