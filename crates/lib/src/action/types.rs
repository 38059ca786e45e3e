use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised by an action's prerequisite check or its run body.
#[derive(Debug, Error)]
pub enum ActionError {
  /// A prerequisite the action needs is missing.
  #[error("prerequisite not met for {action}: {message}")]
  Prerequisite { action: String, message: String },

  /// A script exited unsuccessfully.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CmdFailed { cmd: String, code: Option<i32> },

  /// Any other domain failure reported by the work itself.
  #[error("{0}")]
  Failed(String),

  /// I/O error while running the action.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Identifies which build variant of which component an action belongs to.
///
/// Both keys are opaque; they are only compared for equality and ordering
/// when the planner groups actions of the same component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuildScope {
  pub component: String,
  pub build: String,
}

impl BuildScope {
  pub fn new(component: impl Into<String>, build: impl Into<String>) -> Self {
    Self {
      component: component.into(),
      build: build.into(),
    }
  }

  /// The `component@build` form used as a qualified name.
  pub fn qualified_name(&self) -> String {
    format!("{}@{}", self.component, self.build)
  }
}

impl fmt::Display for BuildScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}@{}", self.component, self.build)
  }
}

/// Flags handed to [`Work::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunContext {
  /// Dry run: report what would happen without side effects.
  pub pretend: bool,
  /// The action is one of the targets the caller asked for.
  pub explicitly_requested: bool,
}

/// The side-effecting part of an action.
///
/// Implementations must be safe to call from a worker thread; the scheduler
/// runs each action's `run` on the blocking pool.
pub trait Work: Send + Sync {
  /// Whether the action's effect is already present (this action only).
  fn is_satisfied(&self) -> bool;

  /// Perform the action.
  fn run(&self, ctx: &RunContext) -> Result<(), ActionError>;

  /// Check invariants the action needs before anything is scheduled.
  fn check_prerequisites(&self) -> Result<(), ActionError> {
    Ok(())
  }
}

/// What kind of node an action is.
#[derive(Clone)]
pub enum ActionKind {
  /// A plain unit of work.
  Task(Arc<dyn Work>),
  /// Work belonging to one build variant of a component.
  Build { scope: BuildScope, work: Arc<dyn Work> },
  /// A choice among the action's dependencies, which are its alternatives.
  AnyOf { preferred: Option<String> },
}

impl fmt::Debug for ActionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ActionKind::Task(_) => write!(f, "Task"),
      ActionKind::Build { scope, .. } => write!(f, "Build({})", scope),
      ActionKind::AnyOf { preferred } => write!(f, "AnyOf(preferred: {:?})", preferred),
    }
  }
}

/// A node of the dependency graph.
///
/// Actions are immutable once constructed. Dependencies are held by
/// qualified name and resolved through an [`ActionSet`](super::ActionSet),
/// which lets declarations reference each other cyclically.
#[derive(Debug, Clone)]
pub struct Action {
  name: String,
  dependencies: Vec<String>,
  kind: ActionKind,
}

impl Action {
  /// A plain action.
  pub fn task(name: impl Into<String>, dependencies: Vec<String>, work: Arc<dyn Work>) -> Self {
    Self {
      name: name.into(),
      dependencies,
      kind: ActionKind::Task(work),
    }
  }

  /// A build-scoped action. Its name is `component@build`.
  pub fn build(scope: BuildScope, dependencies: Vec<String>, work: Arc<dyn Work>) -> Self {
    Self {
      name: scope.qualified_name(),
      dependencies,
      kind: ActionKind::Build { scope, work },
    }
  }

  /// A choice among `alternatives`, optionally preferring one of them.
  pub fn any_of(name: impl Into<String>, alternatives: Vec<String>, preferred: Option<String>) -> Self {
    Self {
      name: name.into(),
      dependencies: alternatives,
      kind: ActionKind::AnyOf { preferred },
    }
  }

  /// The qualified name, unique within an [`ActionSet`](super::ActionSet).
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Names of the actions this one depends on (alternatives for a choice).
  pub fn dependencies(&self) -> &[String] {
    &self.dependencies
  }

  pub fn kind(&self) -> &ActionKind {
    &self.kind
  }

  pub fn is_choice(&self) -> bool {
    matches!(self.kind, ActionKind::AnyOf { .. })
  }

  /// The preferred alternative of a choice.
  pub fn preferred(&self) -> Option<&str> {
    match &self.kind {
      ActionKind::AnyOf { preferred } => preferred.as_deref(),
      _ => None,
    }
  }

  /// The build scope of a build-scoped action.
  pub fn scope(&self) -> Option<&BuildScope> {
    match &self.kind {
      ActionKind::Build { scope, .. } => Some(scope),
      _ => None,
    }
  }

  fn work(&self) -> Option<&Arc<dyn Work>> {
    match &self.kind {
      ActionKind::Task(work) | ActionKind::Build { work, .. } => Some(work),
      ActionKind::AnyOf { .. } => None,
    }
  }

  /// Local satisfaction of the work itself. `None` for a choice, whose
  /// satisfaction depends on its alternatives.
  pub(crate) fn work_satisfied(&self) -> Option<bool> {
    self.work().map(|work| work.is_satisfied())
  }

  /// Run the action. A choice has nothing to do.
  pub fn run(&self, ctx: &RunContext) -> Result<(), ActionError> {
    match self.work() {
      Some(work) => work.run(ctx),
      None => Ok(()),
    }
  }

  /// Fails with a user-facing error if the action cannot possibly run.
  pub fn assert_prerequisites_are_met(&self) -> Result<(), ActionError> {
    match self.work() {
      Some(work) => work.check_prerequisites(),
      None => Ok(()),
    }
  }
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::FakeWork;

  #[test]
  fn build_action_is_named_after_scope() {
    let action = Action::build(BuildScope::new("zlib", "release"), vec![], FakeWork::unsatisfied());
    assert_eq!(action.name(), "zlib@release");
    assert_eq!(action.scope(), Some(&BuildScope::new("zlib", "release")));
    assert!(!action.is_choice());
  }

  #[test]
  fn choice_exposes_alternatives_and_preference() {
    let action = Action::any_of(
      "zlib",
      vec!["zlib@debug".to_string(), "zlib@release".to_string()],
      Some("zlib@release".to_string()),
    );
    assert!(action.is_choice());
    assert_eq!(action.dependencies().len(), 2);
    assert_eq!(action.preferred(), Some("zlib@release"));
    assert_eq!(action.work_satisfied(), None);
  }

  #[test]
  fn choice_run_is_a_no_op() {
    let action = Action::any_of("c", vec!["a".to_string()], None);
    assert!(action.run(&RunContext::default()).is_ok());
    assert!(action.assert_prerequisites_are_met().is_ok());
  }

  #[test]
  fn run_delegates_to_work() {
    let work = FakeWork::failing();
    let action = Action::task("broken", vec![], work.clone());
    assert!(action.run(&RunContext::default()).is_err());
    assert_eq!(work.runs(), 1);
  }

  #[test]
  fn action_error_display() {
    let err = ActionError::CmdFailed {
      cmd: "make".to_string(),
      code: Some(2),
    };
    assert_eq!(err.to_string(), "command failed with exit code Some(2): make");
  }
}
