use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::types::{Action, ActionKind};
use crate::graph::GraphError;

/// Catalog of actions keyed by qualified name.
///
/// Actions reference their dependencies by name; the set resolves those names
/// and answers satisfaction queries that need to look past a single action.
#[derive(Debug, Default, Clone)]
pub struct ActionSet {
  actions: BTreeMap<String, Arc<Action>>,
}

impl ActionSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add an action. Names must be unique.
  pub fn insert(&mut self, action: Action) -> Result<Arc<Action>, GraphError> {
    if self.actions.contains_key(action.name()) {
      return Err(GraphError::DuplicateAction(action.name().to_string()));
    }
    let action = Arc::new(action);
    self.actions.insert(action.name().to_string(), action.clone());
    Ok(action)
  }

  pub fn get(&self, name: &str) -> Option<&Arc<Action>> {
    self.actions.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.actions.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.actions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }

  /// All actions in name order.
  pub fn iter(&self) -> impl Iterator<Item = &Arc<Action>> {
    self.actions.values()
  }

  /// Whether the action's own effect is present.
  ///
  /// A choice is satisfied when any of its alternatives is. Unknown names are
  /// never satisfied.
  pub fn is_satisfied(&self, name: &str) -> bool {
    let Some(action) = self.actions.get(name) else {
      return false;
    };
    match action.kind() {
      ActionKind::AnyOf { .. } => action.dependencies().iter().any(|alt| self.local(alt)),
      _ => action.work_satisfied().unwrap_or(false),
    }
  }

  fn local(&self, name: &str) -> bool {
    self
      .actions
      .get(name)
      .and_then(|action| action.work_satisfied())
      .unwrap_or(false)
  }

  /// Whether the action and everything it depends on is already present.
  ///
  /// An action reached again while it is still being evaluated counts as
  /// satisfied, so cycles of satisfied actions are satisfied.
  pub fn is_satisfied_recursively(&self, name: &str) -> bool {
    let mut memo = HashMap::new();
    let mut path = HashMap::new();
    self.satisfied_rec(name, &mut path, &mut memo).0
  }

  /// Returns the answer and the shallowest path depth it assumed satisfied
  /// (`usize::MAX` when it assumed nothing). Only answers that assumed
  /// nothing above `name` itself are memoized.
  fn satisfied_rec(
    &self,
    name: &str,
    path: &mut HashMap<String, usize>,
    memo: &mut HashMap<String, bool>,
  ) -> (bool, usize) {
    if let Some(&known) = memo.get(name) {
      return (known, usize::MAX);
    }
    if let Some(&depth) = path.get(name) {
      return (true, depth);
    }
    let Some(action) = self.actions.get(name) else {
      return (false, usize::MAX);
    };

    let depth = path.len();
    path.insert(name.to_string(), depth);
    let mut assumed = usize::MAX;
    let result = match action.kind() {
      ActionKind::AnyOf { .. } => action.dependencies().iter().any(|alt| {
        let (ok, used) = self.satisfied_rec(alt, path, memo);
        assumed = assumed.min(used);
        ok
      }),
      _ => {
        action.work_satisfied().unwrap_or(false)
          && action.dependencies().iter().all(|dep| {
            let (ok, used) = self.satisfied_rec(dep, path, memo);
            assumed = assumed.min(used);
            ok
          })
      }
    };
    path.remove(name);

    // A negative answer never rests on an optimistic assumption.
    if !result || assumed >= depth {
      memo.insert(name.to_string(), result);
    }
    (result, assumed)
  }
}
