//! Dependency graph and the planning pipeline.
//!
//! The pipeline turns a set of requested actions into an acyclic plan:
//!
//! 1. [`builder`] expands the requested actions into a graph hanging off a
//!    synthetic root. Choices may introduce cycles.
//! 2. [`resolver`] assigns one alternative to every choice, backtracking over
//!    strongly connected components until no unsatisfied cycle remains.
//! 3. [`reduce`] prunes and rewrites the graph, [`ordering`] serializes build
//!    variants of the same component, and [`reduction`] computes the
//!    transitive reduction.
//!
//! Edges point from dependent to dependency: `u -> v` means `v` must complete
//! before `u` may start.

pub mod builder;
pub mod ordering;
pub mod reduce;
pub mod reduction;
pub mod resolver;
mod types;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use petgraph::Direction;
use petgraph::algo::{has_path_connecting, is_cyclic_directed, tarjan_scc};
use petgraph::dot::Dot;
use petgraph::graphmap::DiGraphMap;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};

use crate::action::{Action, ActionSet};

pub use types::{EdgeKind, GraphError, Node};

/// A directed graph over actions plus an optional synthetic root.
///
/// Backed by a [`StableDiGraph`] so node indices stay valid while passes
/// remove nodes.
#[derive(Debug, Clone)]
pub struct ActionGraph {
  graph: StableDiGraph<Node, EdgeKind>,
  index: HashMap<String, NodeIndex>,
  root: Option<NodeIndex>,
  true_roots: Vec<String>,
}

impl Default for ActionGraph {
  fn default() -> Self {
    Self::new()
  }
}

impl ActionGraph {
  /// An empty graph holding only the synthetic root.
  pub fn new() -> Self {
    Self::with_root().0
  }

  /// Like [`new`](Self::new), also returning the root's index.
  pub(crate) fn with_root() -> (Self, NodeIndex) {
    let mut graph = StableDiGraph::new();
    let root = graph.add_node(Node::Root);
    let this = Self {
      graph,
      index: HashMap::new(),
      root: Some(root),
      true_roots: Vec::new(),
    };
    (this, root)
  }

  pub(crate) fn inner(&self) -> &StableDiGraph<Node, EdgeKind> {
    &self.graph
  }

  pub fn root(&self) -> Option<NodeIndex> {
    self.root
  }

  /// Add a node for `action`, snapshotting its satisfaction. Returns the
  /// existing index if the action is already present.
  pub(crate) fn add_action(&mut self, action: &Arc<Action>, actions: &ActionSet) -> NodeIndex {
    if let Some(&idx) = self.index.get(action.name()) {
      return idx;
    }
    let node = Node::Action {
      action: action.clone(),
      satisfied: actions.is_satisfied(action.name()),
    };
    self.insert_node(node)
  }

  /// Put a previously removed node back.
  pub(crate) fn insert_node(&mut self, node: Node) -> NodeIndex {
    let name = node.name().to_string();
    let idx = self.graph.add_node(node);
    self.index.insert(name, idx);
    idx
  }

  /// Add an edge unless one already connects the pair. Returns whether an
  /// edge was added.
  pub(crate) fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) -> bool {
    if self.graph.find_edge(from, to).is_some() {
      return false;
    }
    self.graph.add_edge(from, to, kind);
    true
  }

  pub(crate) fn remove_edge(&mut self, from: NodeIndex, to: NodeIndex) -> Option<EdgeKind> {
    let edge = self.graph.find_edge(from, to)?;
    self.graph.remove_edge(edge)
  }

  pub(crate) fn remove_node(&mut self, idx: NodeIndex) -> Option<Node> {
    let node = self.graph.remove_node(idx)?;
    match &node {
      Node::Root => self.root = None,
      Node::Action { action, .. } => {
        self.index.remove(action.name());
      }
    }
    Some(node)
  }

  pub(crate) fn set_true_roots(&mut self, roots: Vec<String>) {
    self.true_roots = roots;
  }

  /// The originally requested targets, recorded when the synthetic root is
  /// dropped.
  pub fn true_roots(&self) -> &[String] {
    &self.true_roots
  }

  pub fn node(&self, idx: NodeIndex) -> &Node {
    &self.graph[idx]
  }

  pub fn name(&self, idx: NodeIndex) -> &str {
    self.graph[idx].name()
  }

  pub fn index_of(&self, name: &str) -> Option<NodeIndex> {
    self.index.get(name).copied()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.index.contains_key(name)
  }

  /// Number of action nodes (the synthetic root is not counted).
  pub fn len(&self) -> usize {
    self.index.len()
  }

  pub fn is_empty(&self) -> bool {
    self.index.is_empty()
  }

  pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
    self.graph.node_indices()
  }

  /// Action node indices in name order.
  pub(crate) fn sorted_action_indices(&self) -> Vec<NodeIndex> {
    let mut names: Vec<(&String, &NodeIndex)> = self.index.iter().collect();
    names.sort();
    names.into_iter().map(|(_, &idx)| idx).collect()
  }

  /// Names of all action nodes, sorted.
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.index.keys().cloned().collect();
    names.sort();
    names
  }

  /// Direct successors (dependencies) of a node.
  pub fn successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
    let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(idx, Direction::Outgoing).collect();
    out.sort_by(|a, b| self.name(*a).cmp(self.name(*b)));
    out.dedup();
    out
  }

  /// Direct predecessors (dependents) of a node.
  pub fn predecessors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
    let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(idx, Direction::Incoming).collect();
    out.sort_by(|a, b| self.name(*a).cmp(self.name(*b)));
    out.dedup();
    out
  }

  /// Names of the direct dependencies of `name`, sorted.
  pub fn dependencies_of(&self, name: &str) -> Vec<String> {
    let Some(idx) = self.index_of(name) else {
      return Vec::new();
    };
    self.successors(idx).into_iter().map(|s| self.name(s).to_string()).collect()
  }

  pub fn edge_kind(&self, from: &str, to: &str) -> Option<EdgeKind> {
    let (from, to) = (self.index_of(from)?, self.index_of(to)?);
    self.graph.find_edge(from, to).map(|e| self.graph[e])
  }

  pub fn has_edge(&self, from: &str, to: &str) -> bool {
    self.edge_kind(from, to).is_some()
  }

  pub fn edge_count(&self) -> usize {
    self.graph.edge_count()
  }

  /// All edges as `(from, to, kind)` name triples, sorted.
  pub fn edges(&self) -> Vec<(String, String, EdgeKind)> {
    let mut edges: Vec<_> = self
      .graph
      .edge_references()
      .map(|e| {
        (
          self.name(e.source()).to_string(),
          self.name(e.target()).to_string(),
          *e.weight(),
        )
      })
      .collect();
    edges.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    edges
  }

  /// Whether a directed path leads from `from` to `to`.
  pub fn can_reach(&self, from: &str, to: &str) -> bool {
    match (self.index_of(from), self.index_of(to)) {
      (Some(from), Some(to)) => has_path_connecting(&self.graph, from, to, None),
      _ => false,
    }
  }

  pub fn is_acyclic(&self) -> bool {
    !is_cyclic_directed(&self.graph)
  }

  /// Nodes reachable from the synthetic root, root included. Empty once the
  /// root has been dropped.
  pub(crate) fn reachable_from_root(&self) -> HashSet<NodeIndex> {
    let mut seen = HashSet::new();
    let Some(root) = self.root else {
      return seen;
    };
    let mut queue = VecDeque::from([root]);
    seen.insert(root);
    while let Some(idx) = queue.pop_front() {
      for next in self.graph.neighbors_directed(idx, Direction::Outgoing) {
        if seen.insert(next) {
          queue.push_back(next);
        }
      }
    }
    seen
  }

  /// Strongly connected components that form a real cycle, restricted to
  /// `within` when given. Each component is sorted by name.
  pub(crate) fn cycles(&self, within: Option<&HashSet<NodeIndex>>) -> Vec<Vec<NodeIndex>> {
    let keep = |idx: NodeIndex| within.is_none_or(|set| set.contains(&idx));

    let mut map: DiGraphMap<NodeIndex, ()> = DiGraphMap::new();
    for idx in self.graph.node_indices().filter(|&idx| keep(idx)) {
      map.add_node(idx);
    }
    for edge in self.graph.edge_references() {
      if keep(edge.source()) && keep(edge.target()) {
        map.add_edge(edge.source(), edge.target(), ());
      }
    }

    tarjan_scc(&map)
      .into_iter()
      .filter(|scc| scc.len() > 1 || map.contains_edge(scc[0], scc[0]))
      .map(|mut scc| {
        scc.sort_by(|a, b| self.name(*a).cmp(self.name(*b)));
        scc
      })
      .collect()
  }

  /// Cycles that contain at least one unsatisfied action.
  pub(crate) fn unsatisfied_cycles(&self, within: Option<&HashSet<NodeIndex>>) -> Vec<Vec<NodeIndex>> {
    self
      .cycles(within)
      .into_iter()
      .filter(|scc| scc.iter().any(|&idx| !self.graph[idx].is_satisfied()))
      .collect()
  }

  /// Render the graph in Graphviz DOT format.
  pub fn to_dot(&self) -> String {
    format!("{}", Dot::new(&self.graph))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{FakeWork, SetBuilder};

  fn graph_of(set: &ActionSet, edges: &[(&str, &str)]) -> ActionGraph {
    let mut graph = ActionGraph::new();
    for action in set.iter() {
      graph.add_action(action, set);
    }
    for (from, to) in edges {
      let (from, to) = (graph.index_of(from).unwrap(), graph.index_of(to).unwrap());
      graph.add_edge(from, to, EdgeKind::Dependency);
    }
    graph
  }

  #[test]
  fn add_action_is_idempotent() {
    let set = SetBuilder::new().task("a", &[], FakeWork::unsatisfied()).finish();
    let mut graph = ActionGraph::new();
    let first = graph.add_action(set.get("a").unwrap(), &set);
    let second = graph.add_action(set.get("a").unwrap(), &set);
    assert_eq!(first, second);
    assert_eq!(graph.len(), 1);
  }

  #[test]
  fn duplicate_edges_are_not_added() {
    let set = SetBuilder::new()
      .task("a", &[], FakeWork::unsatisfied())
      .task("b", &[], FakeWork::unsatisfied())
      .finish();
    let mut graph = graph_of(&set, &[("a", "b")]);
    let (a, b) = (graph.index_of("a").unwrap(), graph.index_of("b").unwrap());
    assert!(!graph.add_edge(a, b, EdgeKind::Ordering));
    assert_eq!(graph.edge_kind("a", "b"), Some(EdgeKind::Dependency));
  }

  #[test]
  fn satisfied_cycles_are_not_reported_as_unsatisfied() {
    let set = SetBuilder::new()
      .task("a", &[], FakeWork::satisfied())
      .task("b", &[], FakeWork::satisfied())
      .task("c", &[], FakeWork::unsatisfied())
      .finish();
    let graph = graph_of(&set, &[("a", "b"), ("b", "a"), ("c", "c")]);

    assert_eq!(graph.cycles(None).len(), 2);
    let unsatisfied = graph.unsatisfied_cycles(None);
    assert_eq!(unsatisfied.len(), 1);
    assert_eq!(graph.name(unsatisfied[0][0]), "c");
  }

  #[test]
  fn cycles_can_be_restricted_to_a_subset() {
    let set = SetBuilder::new()
      .task("a", &[], FakeWork::unsatisfied())
      .task("b", &[], FakeWork::unsatisfied())
      .finish();
    let graph = graph_of(&set, &[("a", "b"), ("b", "a")]);
    let only_a: HashSet<_> = [graph.index_of("a").unwrap()].into();
    assert!(graph.cycles(Some(&only_a)).is_empty());
  }

  #[test]
  fn removing_a_node_forgets_its_name() {
    let set = SetBuilder::new().task("a", &[], FakeWork::unsatisfied()).finish();
    let mut graph = graph_of(&set, &[]);
    let idx = graph.index_of("a").unwrap();
    let node = graph.remove_node(idx).unwrap();
    assert!(!graph.contains("a"));
    graph.insert_node(node);
    assert!(graph.contains("a"));
  }

  #[test]
  fn dot_output_labels_ordering_edges() {
    let set = SetBuilder::new()
      .task("a", &[], FakeWork::unsatisfied())
      .task("b", &[], FakeWork::unsatisfied())
      .finish();
    let mut graph = graph_of(&set, &[]);
    let (a, b) = (graph.index_of("a").unwrap(), graph.index_of("b").unwrap());
    graph.add_edge(a, b, EdgeKind::Ordering);
    let dot = graph.to_dot();
    assert!(dot.contains("digraph"));
    assert!(dot.contains("ordering"));
  }
}
