//! Build artifacts and the graph that orders them.

pub mod graph;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::execute::StagePlanner;
use crate::plan::SkipDirective;

pub use graph::{ArtifactGraph, GraphError};

/// Well-known artifact identifiers.
pub mod ids {
  pub const CORE: &str = "core";
  pub const EXECUTABLE: &str = "n8";
  pub const ACCELERATED: &str = "n8-accelerated";
  pub const STDLIB: &str = "stdlib";
  pub const UNINSTALLER: &str = "uninstaller";
  pub const INSTALLER: &str = "installer";
  pub const PACKAGE: &str = "package";
}

/// Unique name of an artifact within one build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ArtifactId(pub String);

impl ArtifactId {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ArtifactId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for ArtifactId {
  fn from(id: &str) -> Self {
    Self(id.to_string())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
  Executable,
  SharedLibrary,
  StaticArchive,
  Installer,
  Uninstaller,
  Package,
}

impl ArtifactKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Executable => "executable",
      Self::SharedLibrary => "shared-library",
      Self::StaticArchive => "static-archive",
      Self::Installer => "installer",
      Self::Uninstaller => "uninstaller",
      Self::Package => "package",
    }
  }
}

impl fmt::Display for ArtifactKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One build output and the stage that produces it.
#[derive(Debug, Clone)]
pub struct Artifact {
  pub id: ArtifactId,
  pub kind: ArtifactKind,
  pub output: PathBuf,
  pub deps: Vec<ArtifactId>,
  /// Set when a skip directive reuses the output of an earlier run.
  pub reused_by: Option<SkipDirective>,
  pub planner: Arc<dyn StagePlanner>,
}

impl Artifact {
  pub fn new(id: &str, kind: ArtifactKind, output: impl Into<PathBuf>, planner: Arc<dyn StagePlanner>) -> Self {
    Self {
      id: ArtifactId::from(id),
      kind,
      output: output.into(),
      deps: Vec::new(),
      reused_by: None,
      planner,
    }
  }

  pub fn depends_on<'a>(mut self, deps: impl IntoIterator<Item = &'a str>) -> Self {
    self.deps.extend(deps.into_iter().map(ArtifactId::from));
    self
  }

  pub fn reused(mut self, directive: SkipDirective) -> Self {
    self.reused_by = Some(directive);
    self
  }
}
