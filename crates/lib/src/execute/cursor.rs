//! Incremental topological traversal of a plan.

use std::collections::{BTreeSet, HashMap};

use petgraph::stable_graph::NodeIndex;

use crate::graph::ActionGraph;

/// Tracks which nodes may start.
///
/// A node becomes ready once every node it depends on has been marked
/// [`done`](Self::done). Ready nodes are handed out in name order.
#[derive(Debug)]
pub struct TopologicalCursor {
  waiting_on: HashMap<NodeIndex, usize>,
  dependents: HashMap<NodeIndex, Vec<NodeIndex>>,
  names: HashMap<NodeIndex, String>,
  ready: BTreeSet<(String, NodeIndex)>,
  outstanding: usize,
}

impl TopologicalCursor {
  pub fn new(graph: &ActionGraph) -> Self {
    let mut cursor = Self {
      waiting_on: HashMap::new(),
      dependents: HashMap::new(),
      names: HashMap::new(),
      ready: BTreeSet::new(),
      outstanding: 0,
    };

    for idx in graph.node_indices() {
      let name = graph.name(idx).to_string();
      let deps = graph.successors(idx).len();
      if deps == 0 {
        cursor.ready.insert((name.clone(), idx));
      }
      cursor.waiting_on.insert(idx, deps);
      cursor.dependents.insert(idx, graph.predecessors(idx));
      cursor.names.insert(idx, name);
      cursor.outstanding += 1;
    }
    cursor
  }

  /// Remove and return every currently ready node, in name order.
  pub fn take_ready(&mut self) -> Vec<NodeIndex> {
    std::mem::take(&mut self.ready).into_iter().map(|(_, idx)| idx).collect()
  }

  pub fn has_ready(&self) -> bool {
    !self.ready.is_empty()
  }

  /// Mark `idx` complete, unlocking dependents whose last dependency it was.
  pub fn done(&mut self, idx: NodeIndex) {
    self.outstanding = self.outstanding.saturating_sub(1);
    let Some(dependents) = self.dependents.remove(&idx) else {
      return;
    };
    for dependent in dependents {
      if let Some(count) = self.waiting_on.get_mut(&dependent) {
        *count = count.saturating_sub(1);
        if *count == 0
          && let Some(name) = self.names.get(&dependent)
        {
          self.ready.insert((name.clone(), dependent));
        }
      }
    }
  }

  /// All nodes have been marked done.
  pub fn is_finished(&self) -> bool {
    self.outstanding == 0
  }

  /// Names of nodes still waiting on at least one dependency, sorted.
  pub fn blocked_names(&self) -> Vec<String> {
    let mut out: Vec<String> = self
      .waiting_on
      .iter()
      .filter(|(_, count)| **count > 0)
      .filter_map(|(idx, _)| self.names.get(idx).cloned())
      .collect();
    out.sort();
    out
  }

  pub fn name(&self, idx: NodeIndex) -> &str {
    self.names.get(&idx).map(String::as_str).unwrap_or_default()
  }
}
