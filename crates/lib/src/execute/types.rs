//! Types for build execution.
//!
//! This module defines the error taxonomy, per-stage outcomes and the
//! report a run produces.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use super::context::BuildContext;
use super::runner::{Invocation, ToolError};
use crate::artifact::{Artifact, ArtifactId, ArtifactKind, GraphError};
use crate::config::ConfigError;
use crate::discover::DiscoveryError;
use crate::embed::EmbedError;
use crate::execute::cleanup::TransientFiles;
use crate::layout::LayoutError;
use crate::package::PackageError;
use crate::platform::{BuildTarget, PlatformError};
use crate::plan::{PrunedArtifact, SkipDirective};
use crate::probe::ProbeError;
use crate::profile::ProfileError;
use crate::util::hash::{ContentHash, hash_file};

/// Coarse error classes used for reporting and exit handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
  Configuration,
  Discovery,
  Probe,
  ToolInvocation,
  ResourceIo,
  Graph,
  Io,
  Cancelled,
}

impl ErrorKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Configuration => "configuration",
      Self::Discovery => "discovery",
      Self::Probe => "probe",
      Self::ToolInvocation => "tool invocation",
      Self::ResourceIo => "resource io",
      Self::Graph => "graph",
      Self::Io => "io",
      Self::Cancelled => "cancelled",
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Errors that can occur while planning or executing a build.
#[derive(Debug, Error)]
pub enum ExecuteError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Platform(#[from] PlatformError),

  #[error(transparent)]
  Profile(#[from] ProfileError),

  #[error(transparent)]
  Probe(#[from] ProbeError),

  #[error(transparent)]
  Discovery(#[from] DiscoveryError),

  #[error(transparent)]
  Embed(#[from] EmbedError),

  #[error(transparent)]
  Package(#[from] PackageError),

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Layout(#[from] LayoutError),

  #[error(transparent)]
  Tool(#[from] ToolError),

  /// A host preparation step (submodules, prerequisites) failed.
  #[error("host setup step '{step}' failed: {source}")]
  HostSetup {
    step: &'static str,
    #[source]
    source: ToolError,
  },

  /// The tools exited zero but the declared output is not there.
  #[error("artifact {artifact} did not produce {path}")]
  MissingOutput { artifact: ArtifactId, path: PathBuf },

  /// A stage ran before the dependency whose output it needs.
  #[error("artifact {artifact} needs {dependency}, which has not completed")]
  UnfinishedDependency { artifact: ArtifactId, dependency: ArtifactId },

  /// A skip directive asked to reuse an output that does not exist.
  #[error("cannot reuse {artifact}: {path} does not exist")]
  MissingReusedOutput { artifact: ArtifactId, path: PathBuf },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("build cancelled")]
  Cancelled,

  #[error("stage {artifact} panicked: {message}")]
  Panicked { artifact: ArtifactId, message: String },
}

impl ExecuteError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Config(_) | Self::Platform(_) | Self::Profile(_) | Self::MissingReusedOutput { .. } => {
        ErrorKind::Configuration
      }
      Self::Probe(_) => ErrorKind::Probe,
      Self::Discovery(_) => ErrorKind::Discovery,
      Self::Embed(e) => match e {
        EmbedError::Read { .. } => ErrorKind::ResourceIo,
        EmbedError::Write { .. } => ErrorKind::Io,
        EmbedError::Empty | EmbedError::InvalidSymbol { .. } | EmbedError::DuplicateSymbol(_) => {
          ErrorKind::Configuration
        }
      },
      Self::Graph(_) | Self::UnfinishedDependency { .. } => ErrorKind::Graph,
      Self::Tool(_) | Self::HostSetup { .. } | Self::MissingOutput { .. } => ErrorKind::ToolInvocation,
      Self::Package(_) | Self::Layout(_) | Self::Io(_) | Self::Panicked { .. } => ErrorKind::Io,
      Self::Cancelled => ErrorKind::Cancelled,
    }
  }
}

/// Why an artifact was not built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "reason", content = "artifact")]
pub enum SkipReason {
  DependencyFailed(ArtifactId),
  DependencySkipped(ArtifactId),
  /// Output reused from an earlier run.
  Directive(SkipDirective),
  Cancelled,
}

impl fmt::Display for SkipReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::DependencyFailed(id) => write!(f, "dependency {} failed", id),
      Self::DependencySkipped(id) => write!(f, "dependency {} was skipped", id),
      Self::Directive(d) => write!(f, "reused by {}", d),
      Self::Cancelled => f.write_str("cancelled"),
    }
  }
}

/// A finished output file and its digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
  pub path: PathBuf,
  pub size: u64,
  pub sha256: ContentHash,
}

impl OutputRecord {
  pub fn from_path(path: &Path) -> std::io::Result<Self> {
    let size = std::fs::metadata(path)?.len();
    Ok(Self {
      path: path.to_path_buf(),
      size,
      sha256: hash_file(path)?,
    })
  }
}

/// Terminal result of one artifact.
#[derive(Debug)]
pub enum StageOutcome {
  Succeeded { outputs: Vec<OutputRecord>, duration: Duration },
  Failed(ExecuteError),
  Skipped(SkipReason),
}

impl StageOutcome {
  pub fn state(&self) -> ArtifactState {
    match self {
      Self::Succeeded { .. } => ArtifactState::Succeeded,
      Self::Failed(_) => ArtifactState::Failed,
      Self::Skipped(_) => ArtifactState::Skipped,
    }
  }

  /// True when dependents may consume this artifact's output.
  pub fn satisfies_dependents(&self) -> bool {
    matches!(self, Self::Succeeded { .. } | Self::Skipped(SkipReason::Directive(_)))
  }
}

/// Lifecycle of one artifact within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactState {
  Pending,
  Running,
  Succeeded,
  Failed,
  Skipped,
}

impl ArtifactState {
  /// `Pending -> Running -> {Succeeded, Failed}` and `Pending -> Skipped`.
  pub fn can_transition_to(&self, next: ArtifactState) -> bool {
    matches!(
      (self, next),
      (Self::Pending, Self::Running)
        | (Self::Pending, Self::Skipped)
        | (Self::Running, Self::Succeeded)
        | (Self::Running, Self::Failed)
    )
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
  }
}

impl fmt::Display for ArtifactState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Pending => "pending",
      Self::Running => "running",
      Self::Succeeded => "succeeded",
      Self::Failed => "failed",
      Self::Skipped => "skipped",
    };
    f.write_str(s)
  }
}

#[derive(Debug)]
pub struct StageReport {
  pub id: ArtifactId,
  pub kind: ArtifactKind,
  pub outcome: StageOutcome,
}

/// Everything a run did, in dispatch order.
#[derive(Debug)]
pub struct BuildReport {
  pub target: BuildTarget,
  pub stages: Vec<StageReport>,
  /// Artifacts removed from the graph by skip directives.
  pub pruned: Vec<PrunedArtifact>,
  /// Transient paths removed by the cleanup phase.
  pub cleaned: Vec<PathBuf>,
  pub cancelled: bool,
  pub duration: Duration,
}

impl BuildReport {
  pub fn outcome(&self, id: &str) -> Option<&StageOutcome> {
    self.stages.iter().find(|s| s.id.as_str() == id).map(|s| &s.outcome)
  }

  pub fn succeeded(&self) -> impl Iterator<Item = &StageReport> {
    self
      .stages
      .iter()
      .filter(|s| matches!(s.outcome, StageOutcome::Succeeded { .. }))
  }

  pub fn failed(&self) -> impl Iterator<Item = &StageReport> {
    self.stages.iter().filter(|s| matches!(s.outcome, StageOutcome::Failed(_)))
  }

  pub fn skipped(&self) -> impl Iterator<Item = &StageReport> {
    self.stages.iter().filter(|s| matches!(s.outcome, StageOutcome::Skipped(_)))
  }

  /// Full success: nothing failed, nothing was skipped for a reason other
  /// than a directive, and the run was not cancelled.
  pub fn is_success(&self) -> bool {
    !self.cancelled
      && self.stages.iter().all(|s| {
        matches!(
          s.outcome,
          StageOutcome::Succeeded { .. } | StageOutcome::Skipped(SkipReason::Directive(_))
        )
      })
  }

  pub fn exit_code(&self) -> i32 {
    if self.is_success() { 0 } else { 1 }
  }

  pub fn with_pruned(mut self, pruned: Vec<PrunedArtifact>) -> Self {
    self.pruned = pruned;
    self
  }
}

/// Configuration for build execution.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
  /// Maximum number of stages running at once.
  pub jobs: usize,
}

impl Default for ExecuteOptions {
  fn default() -> Self {
    Self { jobs: 1 }
  }
}

/// Concrete work for one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagePlan {
  /// Run in order; the first failure aborts the stage.
  pub steps: Vec<Invocation>,
  /// Files that must exist once every step succeeded. The first one is the
  /// artifact's primary output.
  pub outputs: Vec<PathBuf>,
}

/// Turns an artifact and the current context into tool invocations.
///
/// `prepare` may do in-process work (resource generation, staging) and
/// must register anything it creates purely for the run in `transient`
/// before creating it.
pub trait StagePlanner: Send + Sync + fmt::Debug {
  fn prepare(
    &self,
    artifact: &Artifact,
    ctx: &BuildContext,
    transient: &TransientFiles,
  ) -> Result<StagePlan, ExecuteError>;
}
