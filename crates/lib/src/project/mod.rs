//! Project loading.
//!
//! Turns a JSON project file into an [`ActionSet`]: one build-scoped script
//! action per `component@build`, and one choice per component over all of its
//! builds.

mod types;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::action::actions::script::ScriptWork;
use crate::action::{Action, ActionSet, BuildScope};

pub use types::*;

/// A loaded project: its declarations and the actions derived from them.
#[derive(Debug)]
pub struct Project {
  def: ProjectDef,
  actions: ActionSet,
  scripts: BTreeMap<String, Arc<ScriptWork>>,
  state_dir: PathBuf,
}

impl Project {
  pub fn def(&self) -> &ProjectDef {
    &self.def
  }

  pub fn actions(&self) -> &ActionSet {
    &self.actions
  }

  pub fn state_dir(&self) -> &Path {
    &self.state_dir
  }

  /// The qualified build a target names. A bare component resolves to its
  /// `default_build`, or to its only build.
  pub fn resolve_build(&self, target: &str) -> Result<String, ProjectError> {
    if self.scripts.contains_key(target) {
      return Ok(target.to_string());
    }
    let component = self
      .def
      .components
      .get(target)
      .ok_or_else(|| ProjectError::UnknownTarget(target.to_string()))?;

    let mut builds = component.builds.keys();
    let build = match (&component.default_build, builds.next(), builds.next()) {
      (Some(build), _, _) => build,
      (None, Some(only), None) => only,
      _ => {
        return Err(ProjectError::AmbiguousTarget {
          component: target.to_string(),
          builds: component.builds.keys().cloned().collect::<Vec<_>>().join(", "),
        });
      }
    };
    Ok(BuildScope::new(target, build).qualified_name())
  }

  /// Environment a build's script runs with.
  pub fn environment(&self, target: &str) -> Result<BTreeMap<String, String>, ProjectError> {
    let name = self.resolve_build(target)?;
    self
      .scripts
      .get(&name)
      .map(|work| work.environment())
      .ok_or(ProjectError::UnknownTarget(name))
  }
}

/// Read and load the project file at `path`.
///
/// # Arguments
///
/// * `path` - The project file
/// * `state_dir` - Root under which each build keeps its state directory
pub fn load_project(path: &Path, state_dir: &Path) -> Result<Project, ProjectError> {
  let content = std::fs::read_to_string(path).map_err(|source| ProjectError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  let def: ProjectDef = serde_json::from_str(&content).map_err(|source| ProjectError::Parse {
    path: path.to_path_buf(),
    source,
  })?;
  let base_dir = path.parent().unwrap_or(Path::new("."));

  let project = from_def(def, base_dir, state_dir)?;
  info!(
    path = %path.display(),
    components = project.def.components.len(),
    actions = project.actions.len(),
    "loaded project"
  );
  Ok(project)
}

/// Build the action set for an already parsed project.
///
/// Relative working directories are resolved against `base_dir`.
pub fn from_def(def: ProjectDef, base_dir: &Path, state_dir: &Path) -> Result<Project, ProjectError> {
  let mut actions = ActionSet::new();
  let mut scripts = BTreeMap::new();

  for (component, comp_def) in &def.components {
    validate_name(component)?;
    if comp_def.builds.is_empty() {
      return Err(ProjectError::NoBuilds(component.clone()));
    }

    let mut alternatives = Vec::new();
    for (build, build_def) in &comp_def.builds {
      validate_name(build)?;
      let scope = BuildScope::new(component, build);
      let qualified = scope.qualified_name();

      let mut work = ScriptWork::new(&qualified, &build_def.script, state_dir.join(component).join(build));
      if let Some(cwd) = &build_def.cwd {
        work = work.with_cwd(base_dir.join(cwd));
      }
      for (key, value) in &build_def.env {
        work = work.with_env(key, value);
      }

      debug!(action = %qualified, dependencies = ?build_def.dependencies, "declaring build");
      let work = Arc::new(work);
      actions.insert(Action::build(scope, build_def.dependencies.clone(), work.clone()))?;
      scripts.insert(qualified.clone(), work);
      alternatives.push(qualified);
    }

    let preferred = match &comp_def.default_build {
      Some(build) if comp_def.builds.contains_key(build) => Some(BuildScope::new(component, build).qualified_name()),
      Some(build) => {
        return Err(ProjectError::UnknownDefaultBuild {
          component: component.clone(),
          build: build.clone(),
        });
      }
      None => None,
    };
    actions.insert(Action::any_of(component, alternatives, preferred))?;
  }

  Ok(Project {
    def,
    actions,
    scripts,
    state_dir: state_dir.to_path_buf(),
  })
}

fn validate_name(name: &str) -> Result<(), ProjectError> {
  if name.is_empty() || name.contains(BUILD_SEPARATOR) || name.trim() != name {
    return Err(ProjectError::InvalidName(name.to_string()));
  }
  Ok(())
}
