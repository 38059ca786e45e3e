//! Simplification passes applied after choice resolution.
//!
//! Each pass rewrites the graph in place. Together with
//! [`ordering`](super::ordering) and [`reduction`](super::reduction) they turn
//! the resolved graph into the final plan.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::stable_graph::NodeIndex;
use tracing::debug;

use super::{ActionGraph, EdgeKind, Node};

/// Drop every node that cannot be reached from the synthetic root.
///
/// Does nothing once the root has been dropped.
pub fn remove_unreachable(graph: &mut ActionGraph) -> usize {
  if graph.root().is_none() {
    return 0;
  }
  let reachable = graph.reachable_from_root();
  let doomed: Vec<NodeIndex> = graph.node_indices().filter(|idx| !reachable.contains(idx)).collect();
  for &idx in &doomed {
    graph.remove_node(idx);
  }
  if !doomed.is_empty() {
    debug!(removed = doomed.len(), "removed unreachable nodes");
  }
  doomed.len()
}

/// Replace every resolved choice by direct edges from its dependents to the
/// alternative it kept.
pub fn simplify_choices(graph: &mut ActionGraph) {
  let choices: Vec<NodeIndex> = graph
    .sorted_action_indices()
    .into_iter()
    .filter(|&idx| graph.node(idx).is_choice())
    .collect();

  for choice in choices {
    if let Some(&target) = graph.successors(choice).first() {
      for pred in graph.predecessors(choice) {
        if pred != target && pred != choice {
          graph.add_edge(pred, target, EdgeKind::Dependency);
        }
      }
    }
    debug!(choice = %graph.name(choice), "collapsed choice");
    graph.remove_node(choice);
  }
}

/// Remove the synthetic root, remembering its direct successors as the true
/// roots of the plan.
pub fn drop_root(graph: &mut ActionGraph) {
  let Some(root) = graph.root() else {
    return;
  };
  let roots: Vec<String> = graph
    .successors(root)
    .into_iter()
    .map(|idx| graph.name(idx).to_string())
    .collect();
  graph.remove_node(root);
  graph.set_true_roots(roots);
}

/// Repeatedly delete attracting components whose members are all satisfied.
///
/// An attracting component has no edge leaving it, so nothing it contains
/// waits on anything still to be done. When `keep_roots` is set, true roots
/// removed here are put back so explicitly requested targets still run: they
/// are marked unsatisfied, and any path between them (or from a remaining
/// node to them) through removed nodes becomes a direct edge.
pub fn remove_satisfied_attracting_components(graph: &mut ActionGraph, keep_roots: bool) -> usize {
  let roots: HashSet<String> = graph.true_roots().iter().cloned().collect();
  let mut removed_roots: Vec<Node> = Vec::new();
  let mut removed_edges: BTreeSet<(String, String)> = BTreeSet::new();
  let mut removed = 0;

  loop {
    let components = tarjan_scc(graph.inner());
    let mut membership: HashMap<NodeIndex, usize> = HashMap::new();
    for (id, scc) in components.iter().enumerate() {
      for &idx in scc {
        membership.insert(idx, id);
      }
    }

    let doomed: Vec<NodeIndex> = components
      .iter()
      .enumerate()
      .filter(|(id, scc)| {
        scc.iter().all(|&idx| {
          graph.node(idx).is_satisfied() && graph.successors(idx).iter().all(|succ| membership[succ] == *id)
        })
      })
      .flat_map(|(_, scc)| scc.iter().copied())
      .collect();

    if doomed.is_empty() {
      break;
    }

    for &idx in &doomed {
      for pred in graph.predecessors(idx) {
        removed_edges.insert((graph.name(pred).to_string(), graph.name(idx).to_string()));
      }
      for succ in graph.successors(idx) {
        removed_edges.insert((graph.name(idx).to_string(), graph.name(succ).to_string()));
      }
    }

    for idx in doomed {
      if let Some(node) = graph.remove_node(idx) {
        debug!(action = %node.name(), "pruned satisfied action");
        removed += 1;
        if roots.contains(node.name()) {
          removed_roots.push(node);
        }
      }
    }
  }

  if keep_roots && !removed_roots.is_empty() {
    for node in removed_roots {
      debug!(action = %node.name(), "re-adding explicitly requested action");
      graph.insert_node(node.into_forced());
    }
    restore_paths(graph, &removed_edges);
  }

  removed
}

/// Reconnect re-added roots: a path from a present node to a re-added root
/// that only crossed removed nodes becomes a direct dependency edge.
fn restore_paths(graph: &mut ActionGraph, removed_edges: &BTreeSet<(String, String)>) {
  let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
  for (from, to) in removed_edges {
    adjacency.entry(from.as_str()).or_default().push(to.as_str());
  }

  let mut restored = Vec::new();
  for &start in adjacency.keys() {
    if !graph.contains(start) {
      continue;
    }
    let mut seen: HashSet<&str> = HashSet::from([start]);
    let mut stack: Vec<&str> = adjacency[start].clone();
    while let Some(next) = stack.pop() {
      if !seen.insert(next) {
        continue;
      }
      if graph.contains(next) {
        restored.push((start.to_string(), next.to_string()));
      } else if let Some(children) = adjacency.get(next) {
        stack.extend(children.iter().copied());
      }
    }
  }

  for (from, to) in restored {
    // Among forced roots in a cycle, the first edge in name order wins.
    if graph.can_reach(&to, &from) {
      continue;
    }
    if let (Some(a), Some(b)) = (graph.index_of(&from), graph.index_of(&to)) {
      graph.add_edge(a, b, EdgeKind::Dependency);
      debug!(from = %from, to = %to, "restored dependency of re-added action");
    }
  }
}
