//! Choice resolution.
//!
//! Every choice node must end up with exactly one outgoing edge, and no cycle
//! may contain an unsatisfied action. Assignments are searched with
//! backtracking, one strongly connected component at a time, largest first.
//! The search is exponential in the worst case; restricting it to a single
//! component and dropping choices that became unreachable keep it small in
//! practice.

use std::cmp::Reverse;
use std::collections::HashSet;

use petgraph::algo::tarjan_scc;
use petgraph::stable_graph::NodeIndex;
use tracing::{debug, warn};

use super::reduce::remove_unreachable;
use super::{ActionGraph, EdgeKind, GraphError};

/// Assign one alternative to every reachable choice.
///
/// On success every choice left in the graph has a single outgoing edge.
/// Fails with [`GraphError::NoAcyclicAssignment`] when some component admits
/// no acyclic assignment.
pub fn resolve_choices(graph: &mut ActionGraph) -> Result<(), GraphError> {
  loop {
    remove_unreachable(graph);

    let unresolved = unresolved_choices(graph);
    if unresolved.is_empty() {
      return check_remaining_cycles(graph);
    }

    let mut components = tarjan_scc(graph.inner());
    components.sort_by_cached_key(|scc| {
      let first = scc.iter().map(|&idx| graph.name(idx).to_string()).min();
      (Reverse(scc.len()), first)
    });

    let Some(component) = components
      .into_iter()
      .find(|scc| scc.iter().any(|idx| unresolved.contains(idx)))
    else {
      return check_remaining_cycles(graph);
    };

    let members: HashSet<NodeIndex> = component.iter().copied().collect();
    let mut choices: Vec<NodeIndex> = component.into_iter().filter(|idx| unresolved.contains(idx)).collect();
    choices.sort_by(|a, b| graph.name(*a).cmp(graph.name(*b)));

    debug!(
      component_size = members.len(),
      choices = choices.len(),
      "resolving choices in component"
    );

    if !assign(graph, &choices, &members) {
      let choices: Vec<String> = choices.iter().map(|&idx| graph.name(idx).to_string()).collect();
      warn!(choices = ?choices, "no acyclic assignment exists");
      return Err(GraphError::NoAcyclicAssignment { choices });
    }
  }
}

/// Cycles without an open choice can no longer be broken.
fn check_remaining_cycles(graph: &ActionGraph) -> Result<(), GraphError> {
  let Some(cycle) = graph.unsatisfied_cycles(None).into_iter().next() else {
    return Ok(());
  };
  let choices: Vec<String> = cycle
    .iter()
    .filter(|&&idx| graph.node(idx).is_choice())
    .map(|&idx| graph.name(idx).to_string())
    .collect();
  if choices.is_empty() {
    let cycle = cycle.iter().map(|&idx| graph.name(idx).to_string()).collect();
    return Err(GraphError::DependencyCycle { cycle });
  }
  warn!(choices = ?choices, "no acyclic assignment exists");
  Err(GraphError::NoAcyclicAssignment { choices })
}

/// Choices that still have more than one alternative edge.
fn unresolved_choices(graph: &ActionGraph) -> HashSet<NodeIndex> {
  graph
    .node_indices()
    .filter(|&idx| graph.node(idx).is_choice() && graph.successors(idx).len() > 1)
    .collect()
}

/// Alternatives of `choice` in the order they should be tried: satisfied
/// first, then the preferred one, then the rest by name.
fn ordered_alternatives(graph: &ActionGraph, choice: NodeIndex) -> Vec<NodeIndex> {
  let preferred = graph.node(choice).action().and_then(|action| action.preferred());
  let mut alternatives = graph.successors(choice);
  alternatives.sort_by_key(|&idx| {
    let node = graph.node(idx);
    (
      !node.is_satisfied(),
      Some(node.name()) != preferred,
      node.name().to_string(),
    )
  });
  alternatives
}

/// Backtracking assignment over `remaining` choices of one component.
///
/// Edges removed while trying an alternative are recorded and restored when
/// the branch fails, so a failed call leaves the graph as it found it.
fn assign(graph: &mut ActionGraph, remaining: &[NodeIndex], component: &HashSet<NodeIndex>) -> bool {
  let Some((&choice, rest)) = remaining.split_first() else {
    return acceptable(graph, component);
  };

  for alternative in ordered_alternatives(graph, choice) {
    let mut removed: Vec<(NodeIndex, EdgeKind)> = Vec::new();
    for other in graph.successors(choice) {
      if other != alternative
        && let Some(kind) = graph.remove_edge(choice, other)
      {
        removed.push((other, kind));
      }
    }

    let reachable = graph.reachable_from_root();
    let next: Vec<NodeIndex> = rest.iter().copied().filter(|idx| reachable.contains(idx)).collect();

    debug!(
      choice = %graph.name(choice),
      alternative = %graph.name(alternative),
      skipped = rest.len() - next.len(),
      "trying alternative"
    );

    if assign(graph, &next, component) {
      return true;
    }

    for (other, kind) in removed {
      graph.add_edge(choice, other, kind);
    }
  }

  false
}

/// Base case: the reachable part of the component may only contain cycles
/// made entirely of satisfied actions.
fn acceptable(graph: &ActionGraph, component: &HashSet<NodeIndex>) -> bool {
  let reachable = graph.reachable_from_root();
  let live: HashSet<NodeIndex> = component.intersection(&reachable).copied().collect();
  graph.unsatisfied_cycles(Some(&live)).is_empty()
}
