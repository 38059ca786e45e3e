//! The action model.
//!
//! Actions are the nodes of the dependency graph. Each has a unique qualified
//! name, an ordered list of dependency names, and a kind:
//!
//! - [`ActionKind::Task`] - a plain unit of work
//! - [`ActionKind::Build`] - work belonging to one build variant of a component
//! - [`ActionKind::AnyOf`] - a choice; exactly one alternative survives planning
//!
//! The side effects live behind the [`Work`] trait so the planner and the
//! scheduler never depend on what an action actually does.

pub mod actions;
mod set;
mod types;

pub use set::ActionSet;
pub use types::*;
