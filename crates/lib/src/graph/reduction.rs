//! Transitive reduction that tolerates cycles.
//!
//! On a DAG every edge implied by a longer path is removed. When cycles
//! remain, strongly connected components are condensed, the condensation is
//! reduced, and the original edges are re-expanded: edges inside a component
//! are kept as they are, and edges between two components survive only if
//! the condensed edge does. Reachability is always preserved; minimality is
//! only guaranteed in the acyclic case.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

use petgraph::algo::tarjan_scc;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use tracing::debug;

use super::ActionGraph;

/// Remove edges implied by other paths. Returns the number of edges removed.
pub fn transitive_reduction(graph: &mut ActionGraph) -> usize {
  let edges: Vec<(NodeIndex, NodeIndex)> = graph
    .inner()
    .edge_references()
    .map(|e| (e.source(), e.target()))
    .collect();

  let redundant: Vec<(NodeIndex, NodeIndex)> = if graph.is_acyclic() {
    let kept = reduce_dag(&adjacency(edges.iter().copied()));
    edges.into_iter().filter(|edge| !kept.contains(edge)).collect()
  } else {
    let mut component: HashMap<NodeIndex, usize> = HashMap::new();
    for (id, scc) in tarjan_scc(graph.inner()).into_iter().enumerate() {
      for idx in scc {
        component.insert(idx, id);
      }
    }
    let condensed = adjacency(
      edges
        .iter()
        .map(|(from, to)| (component[from], component[to]))
        .filter(|(from, to)| from != to),
    );
    let kept = reduce_dag(&condensed);
    edges
      .into_iter()
      .filter(|(from, to)| {
        let (a, b) = (component[from], component[to]);
        a != b && !kept.contains(&(a, b))
      })
      .collect()
  };

  for &(from, to) in &redundant {
    graph.remove_edge(from, to);
  }
  debug!(removed = redundant.len(), "transitive reduction");
  redundant.len()
}

fn adjacency<K: Ord + Copy>(edges: impl Iterator<Item = (K, K)>) -> BTreeMap<K, BTreeSet<K>> {
  let mut out: BTreeMap<K, BTreeSet<K>> = BTreeMap::new();
  for (from, to) in edges {
    out.entry(from).or_default().insert(to);
    out.entry(to).or_default();
  }
  out
}

/// Transitive reduction of an acyclic adjacency map: the edge `u -> v` is kept
/// unless `v` is reachable from another child of `u`.
fn reduce_dag<K: Ord + Copy + Hash>(adjacency: &BTreeMap<K, BTreeSet<K>>) -> BTreeSet<(K, K)> {
  let mut memo: HashMap<K, BTreeSet<K>> = HashMap::new();
  let mut kept = BTreeSet::new();
  for (&from, children) in adjacency {
    for &to in children {
      let implied = children
        .iter()
        .filter(|&&other| other != to)
        .any(|&other| descendants(adjacency, other, &mut memo).contains(&to));
      if !implied {
        kept.insert((from, to));
      }
    }
  }
  kept
}

/// Every node reachable from `start` by at least one edge.
fn descendants<K: Ord + Copy + Hash>(
  adjacency: &BTreeMap<K, BTreeSet<K>>,
  start: K,
  memo: &mut HashMap<K, BTreeSet<K>>,
) -> BTreeSet<K> {
  if let Some(known) = memo.get(&start) {
    return known.clone();
  }
  let mut out = BTreeSet::new();
  if let Some(children) = adjacency.get(&start) {
    for &child in children {
      out.insert(child);
      out.extend(descendants(adjacency, child, memo));
    }
  }
  memo.insert(start, out.clone());
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::action::ActionSet;
  use crate::graph::EdgeKind;
  use crate::graph::EdgeKind::{Dependency as D, Ordering as O};
  use crate::util::testutil::{FakeWork, SetBuilder};

  fn graph_of(nodes: &[&str], edges: &[(&str, &str, EdgeKind)]) -> ActionGraph {
    let mut builder = SetBuilder::new();
    for name in nodes {
      builder = builder.task(name, &[], FakeWork::unsatisfied());
    }
    let set: ActionSet = builder.finish();
    let mut graph = ActionGraph::new();
    if let Some(root) = graph.root() {
      graph.remove_node(root);
    }
    for action in set.iter() {
      graph.add_action(action, &set);
    }
    for (from, to, kind) in edges {
      let (from, to) = (graph.index_of(from).unwrap(), graph.index_of(to).unwrap());
      graph.add_edge(from, to, *kind);
    }
    graph
  }

  fn reachability(graph: &ActionGraph) -> Vec<(String, String)> {
    let names = graph.names();
    let mut out = Vec::new();
    for from in &names {
      for to in &names {
        if from != to && graph.can_reach(from, to) {
          out.push((from.clone(), to.clone()));
        }
      }
    }
    out
  }

  #[test]
  fn diamond_shortcut_is_removed() {
    let mut graph = graph_of(
      &["a", "b", "c", "d"],
      &[("a", "b", D), ("a", "c", D), ("b", "d", D), ("c", "d", D), ("a", "d", D)],
    );
    let before = reachability(&graph);

    assert_eq!(transitive_reduction(&mut graph), 1);
    assert!(!graph.has_edge("a", "d"));
    assert_eq!(reachability(&graph), before);
  }

  #[test]
  fn long_chain_shortcuts_are_removed() {
    let mut graph = graph_of(
      &["a", "b", "c", "d"],
      &[("a", "b", D), ("b", "c", D), ("c", "d", D), ("a", "c", O), ("a", "d", D), ("b", "d", O)],
    );
    let before = reachability(&graph);

    transitive_reduction(&mut graph);
    assert_eq!(graph.edge_count(), 3);
    assert_eq!(reachability(&graph), before);
  }

  #[test]
  fn reduction_is_idempotent() {
    let mut graph = graph_of(&["a", "b", "c"], &[("a", "b", D), ("b", "c", D), ("a", "c", D)]);
    transitive_reduction(&mut graph);
    assert_eq!(transitive_reduction(&mut graph), 0);
  }

  #[test]
  fn cyclic_graph_keeps_reachability_and_markers() {
    // {b, c} is a cycle; a -> d is implied through it.
    let mut graph = graph_of(
      &["a", "b", "c", "d", "e"],
      &[
        ("a", "b", O),
        ("b", "c", D),
        ("c", "b", D),
        ("c", "d", D),
        ("a", "d", D),
        ("d", "e", D),
        ("b", "e", D),
      ],
    );
    let before = reachability(&graph);

    transitive_reduction(&mut graph);

    assert_eq!(reachability(&graph), before);
    assert!(graph.has_edge("b", "c"));
    assert!(graph.has_edge("c", "b"));
    assert!(!graph.has_edge("a", "d"));
    assert!(!graph.has_edge("b", "e"));
    assert_eq!(graph.edge_kind("a", "b"), Some(EdgeKind::Ordering));
  }

  #[test]
  fn dense_dag_preserves_reachability() {
    let nodes = ["n0", "n1", "n2", "n3", "n4", "n5", "n6"];
    let mut edges = Vec::new();
    for i in 0..nodes.len() {
      for j in (i + 1)..nodes.len() {
        if (i * 7 + j * 3) % 4 != 0 {
          edges.push((nodes[i], nodes[j], D));
        }
      }
    }
    let mut graph = graph_of(&nodes, &edges);
    let before = reachability(&graph);

    transitive_reduction(&mut graph);
    assert_eq!(reachability(&graph), before);
    for (from, to, _) in graph.edges() {
      let others: Vec<String> = graph.dependencies_of(&from).into_iter().filter(|n| n != &to).collect();
      assert!(
        others.iter().all(|other| !graph.can_reach(other, &to)),
        "{from} -> {to} is still implied"
      );
    }
  }
}
