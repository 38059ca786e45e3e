//! Implementation of the `ensemble graph` command.
//!
//! Prints the resolved plan in Graphviz DOT format.

use std::path::Path;

use anyhow::{Context, Result};

use ensemble_lib::plan::{PlanOptions, plan};

use super::open_project;

pub fn cmd_graph(project: &Path, state_dir: Option<&Path>, targets: &[String], options: &PlanOptions) -> Result<()> {
  let project = open_project(project, state_dir)?;
  let plan = plan(project.actions(), targets, options).context("Failed to plan")?;
  print!("{}", plan.to_dot());
  Ok(())
}
