//! Serialization of build variants that are scheduled together.
//!
//! When several builds of one component are in the plan, every dependent must
//! observe the variant it asked for. The pass puts the variants (together with
//! their direct dependents) in a total order by adding [`EdgeKind::Ordering`]
//! edges, trying group permutations until one introduces no cycle through an
//! unsatisfied action.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::stable_graph::NodeIndex;
use tracing::debug;

use super::{ActionGraph, EdgeKind, GraphError};
use crate::action::BuildScope;

/// Order the variants of every component that has two or more builds in the
/// graph.
///
/// Components are handled independently, in name order.
pub fn enforce_build_ordering(graph: &mut ActionGraph) -> Result<(), GraphError> {
  for (component, builds) in variants_by_component(graph) {
    if builds.len() < 2 {
      continue;
    }
    let groups: Vec<Vec<NodeIndex>> = builds.values().map(|nodes| group_of(graph, nodes)).collect();
    order_component(graph, &component, &groups)?;
  }
  Ok(())
}

/// Build-scoped nodes grouped by component then by build.
fn variants_by_component(graph: &ActionGraph) -> BTreeMap<String, BTreeMap<String, Vec<NodeIndex>>> {
  let mut out: BTreeMap<String, BTreeMap<String, Vec<NodeIndex>>> = BTreeMap::new();
  for idx in graph.sorted_action_indices() {
    if let Some(scope) = scope_of(graph, idx) {
      out
        .entry(scope.component.clone())
        .or_default()
        .entry(scope.build.clone())
        .or_default()
        .push(idx);
    }
  }
  out
}

/// A variant's nodes plus their direct predecessors, in name order.
fn group_of(graph: &ActionGraph, nodes: &[NodeIndex]) -> Vec<NodeIndex> {
  let mut members: BTreeSet<(String, NodeIndex)> = BTreeSet::new();
  for &idx in nodes {
    members.insert((graph.name(idx).to_string(), idx));
    for pred in graph.predecessors(idx) {
      members.insert((graph.name(pred).to_string(), pred));
    }
  }
  members.into_iter().map(|(_, idx)| idx).collect()
}

fn scope_of(graph: &ActionGraph, idx: NodeIndex) -> Option<&BuildScope> {
  graph.node(idx).action().and_then(|action| action.scope())
}

fn order_component(graph: &mut ActionGraph, component: &str, groups: &[Vec<NodeIndex>]) -> Result<(), GraphError> {
  let mut order: Vec<usize> = (0..groups.len()).collect();
  loop {
    let added = link_groups(graph, groups, &order);
    if graph.unsatisfied_cycles(None).is_empty() {
      debug!(component, order = ?order, edges = added.len(), "ordered build variants");
      return Ok(());
    }
    for (from, to) in added {
      graph.remove_edge(from, to);
    }
    if !next_permutation(&mut order) {
      return Err(GraphError::UnresolvableOrdering {
        component: component.to_string(),
      });
    }
  }
}

/// Add ordering edges between consecutive groups of `order`. Returns the edges
/// that were actually added so the caller can undo them.
fn link_groups(graph: &mut ActionGraph, groups: &[Vec<NodeIndex>], order: &[usize]) -> Vec<(NodeIndex, NodeIndex)> {
  let mut added = Vec::new();
  for pair in order.windows(2) {
    for &from in &groups[pair[0]] {
      for &to in &groups[pair[1]] {
        if from == to {
          continue;
        }
        if let (Some(a), Some(b)) = (scope_of(graph, from), scope_of(graph, to))
          && a == b
        {
          continue;
        }
        if graph.add_edge(from, to, EdgeKind::Ordering) {
          added.push((from, to));
        }
      }
    }
  }
  added
}

/// Advance `items` to the next lexicographic permutation. Returns false once
/// the last permutation has been produced.
fn next_permutation(items: &mut [usize]) -> bool {
  let Some(pivot) = items.windows(2).rposition(|w| w[0] < w[1]) else {
    return false;
  };
  let Some(swap) = items.iter().rposition(|&x| x > items[pivot]) else {
    return false;
  };
  items.swap(pivot, swap);
  items[pivot + 1..].reverse();
  true
}
