//! Concrete [`Work`](super::Work) implementations.
//!
//! - [`script`] - Shell script execution with a marker file recording success

pub mod script;
