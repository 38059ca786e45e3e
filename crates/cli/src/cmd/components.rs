//! Components command implementation.
//!
//! Lists declared components, their builds, and which builds are already done
//! (on their own, and together with everything they depend on).

use std::path::Path;

use anyhow::Result;

use ensemble_lib::action::BuildScope;

use super::open_project;
use crate::output::{print_info, print_json, print_stat};

pub fn cmd_components(project: &Path, state_dir: Option<&Path>, json: bool) -> Result<()> {
  let project = open_project(project, state_dir)?;
  let actions = project.actions();

  if json {
    let components: Vec<_> = project
      .def()
      .components
      .iter()
      .map(|(name, def)| {
        let builds: Vec<_> = def
          .builds
          .keys()
          .map(|build| {
            let qualified = BuildScope::new(name, build).qualified_name();
            serde_json::json!({
              "name": qualified,
              "satisfied": actions.is_satisfied(&qualified),
              "up_to_date": actions.is_satisfied_recursively(&qualified),
            })
          })
          .collect();
        serde_json::json!({ "name": name, "default_build": def.default_build, "builds": builds })
      })
      .collect();
    return print_json(&components);
  }

  if project.def().components.is_empty() {
    print_info("No components declared");
    return Ok(());
  }

  for (name, def) in &project.def().components {
    print_info(name);
    for build in def.builds.keys() {
      let qualified = BuildScope::new(name, build).qualified_name();
      let mut state = if actions.is_satisfied_recursively(&qualified) {
        "up to date"
      } else if actions.is_satisfied(&qualified) {
        "done, dependencies pending"
      } else {
        "pending"
      }
      .to_string();
      if def.default_build.as_deref() == Some(build.as_str()) {
        state.push_str(" (default)");
      }
      print_stat(build, &state);
    }
  }
  Ok(())
}
