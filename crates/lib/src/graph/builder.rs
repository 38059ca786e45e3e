//! Expansion of requested actions into the initial dependency graph.

use std::collections::HashSet;

use tracing::debug;

use super::{ActionGraph, EdgeKind, GraphError};
use crate::action::ActionSet;

/// Build the initial graph for `requested`.
///
/// The synthetic root gets an edge to every requested action. Unless
/// `no_deps` is set, dependencies are followed recursively. With `no_deps`
/// only requested choices are expanded, through their alternatives, so that
/// a choice still resolves to one action. The result may contain cycles
/// wherever choices reference each other.
pub fn build_graph(actions: &ActionSet, requested: &[String], no_deps: bool) -> Result<ActionGraph, GraphError> {
  let (mut graph, root) = ActionGraph::with_root();

  let mut stack = Vec::new();
  for name in requested {
    let action = actions.get(name).ok_or_else(|| GraphError::UnknownAction {
      name: name.clone(),
      referenced_by: None,
    })?;
    let idx = graph.add_action(action, actions);
    graph.add_edge(root, idx, EdgeKind::Dependency);
    stack.push(action.clone());
  }

  let mut visited: HashSet<String> = HashSet::new();
  while let Some(action) = stack.pop() {
    if !visited.insert(action.name().to_string()) {
      continue;
    }
    // Without dependencies, only choices are expanded so they can pick an alternative.
    if no_deps && !action.is_choice() {
      continue;
    }
    if action.is_choice() && action.dependencies().is_empty() {
      return Err(GraphError::EmptyChoice(action.name().to_string()));
    }

    let from = graph.add_action(&action, actions);
    for dep_name in action.dependencies() {
      let dep = actions.get(dep_name).ok_or_else(|| GraphError::UnknownAction {
        name: dep_name.clone(),
        referenced_by: Some(action.name().to_string()),
      })?;
      let to = graph.add_action(dep, actions);
      graph.add_edge(from, to, EdgeKind::Dependency);
      if !visited.contains(dep_name) {
        stack.push(dep.clone());
      }
    }
  }

  debug!(
    nodes = graph.len(),
    edges = graph.edge_count(),
    no_deps,
    "built dependency graph"
  );
  Ok(graph)
}
