//! Project file types.
//!
//! A project file declares components and their builds:
//!
//! ```json
//! {
//!   "components": {
//!     "zlib": {
//!       "default_build": "release",
//!       "builds": {
//!         "release": { "script": "make install" },
//!         "debug": { "script": "make install DEBUG=1" }
//!       }
//!     },
//!     "curl": {
//!       "builds": {
//!         "default": { "script": "make", "dependencies": ["zlib"] }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! A dependency written `zlib` lets the planner pick any build of `zlib`,
//! preferring its `default_build`; `zlib@debug` names one build exactly.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::GraphError;

/// Separates component and build in a qualified name.
pub const BUILD_SEPARATOR: char = '@';

/// Errors raised while loading a project file.
#[derive(Debug, Error)]
pub enum ProjectError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// Component and build names must be non-empty and must not contain `@`.
  #[error("invalid name {0:?}")]
  InvalidName(String),

  #[error("component {0} declares no builds")]
  NoBuilds(String),

  #[error("component {component} has no build named {build}")]
  UnknownDefaultBuild { component: String, build: String },

  #[error("no build named {0}")]
  UnknownTarget(String),

  /// A bare component name with several builds and no `default_build`.
  #[error("component {component} has several builds, pick one of: {builds}")]
  AmbiguousTarget { component: String, builds: String },

  #[error(transparent)]
  Graph(#[from] GraphError),
}

/// The whole project file.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectDef {
  pub components: BTreeMap<String, ComponentDef>,
}

/// A component and its build variants.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentDef {
  /// Build preferred when a dependent names only the component.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_build: Option<String>,
  pub builds: BTreeMap<String, BuildDef>,
}

/// One build variant.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildDef {
  /// Shell script that performs the build.
  pub script: String,
  /// `component` or `component@build` references.
  #[serde(default)]
  pub dependencies: Vec<String>,
  /// Working directory, relative to the project file.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cwd: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, String>,
}
