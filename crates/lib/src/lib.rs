//! ensemble-lib: planning and running component builds
//!
//! This crate provides the pieces behind the `ensemble` command:
//! - `Action`: a named unit of work with dependencies, possibly a choice
//!   between alternatives or one build variant of a component
//! - `ActionGraph`: the dependency graph and the passes that resolve choices
//!   and reduce it to an acyclic plan
//! - `execute`: the bounded, fail-fast scheduler that runs a plan
//! - `Project`: the JSON project file that declares components and builds

pub mod action;
pub mod execute;
pub mod graph;
pub mod plan;
pub mod project;
pub mod util;
