//! Types for the dependency graph and the planning pipeline.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::action::{Action, ActionError};

/// Errors raised while turning requested actions into a plan.
#[derive(Debug, Error)]
pub enum GraphError {
  /// Two actions share a qualified name.
  #[error("duplicate action: {0}")]
  DuplicateAction(String),

  /// A requested target or a dependency does not name a known action.
  #[error("unknown action {name}{}", referenced_by.as_ref().map(|by| format!(" (required by {by})")).unwrap_or_default())]
  UnknownAction {
    name: String,
    referenced_by: Option<String>,
  },

  /// A choice was declared without alternatives.
  #[error("choice {0} has no alternatives")]
  EmptyChoice(String),

  /// No assignment of alternatives to choices yields an acyclic graph.
  #[error("no acyclic assignment exists for choices: {}", choices.join(", "))]
  NoAcyclicAssignment { choices: Vec<String> },

  /// Actions depend on each other in a loop that no choice can break.
  #[error("dependency cycle: {}", cycle.join(" -> "))]
  DependencyCycle { cycle: Vec<String> },

  /// No order between the build variants of a component avoids a cycle.
  #[error("cannot order the builds of component {component} without introducing a cycle")]
  UnresolvableOrdering { component: String },

  /// An action's prerequisite check failed.
  #[error(transparent)]
  Prerequisite(ActionError),

  /// A cycle survived resolution. This is a defect in the planner.
  #[error("internal error: cycle remains after resolution: {}", cycle.join(" -> "))]
  CycleAfterResolution { cycle: Vec<String> },
}

impl GraphError {
  /// Internal-consistency failures, as opposed to user-facing errors.
  pub fn is_internal(&self) -> bool {
    matches!(self, GraphError::CycleAfterResolution { .. })
  }
}

/// Why an edge exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
  /// The source declared a dependency on the target.
  Dependency,
  /// Added by the ordering pass between build variants of one component.
  Ordering,
}

impl fmt::Display for EdgeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EdgeKind::Dependency => Ok(()),
      EdgeKind::Ordering => f.write_str("ordering"),
    }
  }
}

/// A graph node: the synthetic root or an action.
///
/// Satisfaction is captured when the node is created so that every pass of
/// one planning run sees the same answer.
#[derive(Debug, Clone)]
pub enum Node {
  Root,
  Action { action: Arc<Action>, satisfied: bool },
}

impl Node {
  pub const ROOT_NAME: &'static str = "<root>";

  pub fn name(&self) -> &str {
    match self {
      Node::Root => Self::ROOT_NAME,
      Node::Action { action, .. } => action.name(),
    }
  }

  pub fn action(&self) -> Option<&Arc<Action>> {
    match self {
      Node::Root => None,
      Node::Action { action, .. } => Some(action),
    }
  }

  pub fn is_satisfied(&self) -> bool {
    matches!(self, Node::Action { satisfied: true, .. })
  }

  pub fn is_choice(&self) -> bool {
    self.action().is_some_and(|action| action.is_choice())
  }

  /// The same node marked as work still to run.
  pub fn into_forced(self) -> Node {
    match self {
      Node::Action { action, .. } => Node::Action { action, satisfied: false },
      root => root,
    }
  }
}

impl fmt::Display for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}
