//! Artifact set selection.
//!
//! [`plan`] declares which artifacts a target builds, wires their
//! dependencies and applies the skip directives. The result is a validated
//! [`ArtifactGraph`] ready for the driver; no tool runs here.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::artifact::{Artifact, ArtifactGraph, ArtifactId, ArtifactKind, ids};
use crate::config::Config;
use crate::execute::ExecuteError;
use crate::layout::Layout;
use crate::package::PackageArch;
use crate::platform::{Os, Variant};
use crate::profile::ToolchainProfile;
use crate::stages::{
  AcceleratedPlanner, CorePlanner, ExecutablePlanner, InstallerPlanner, PackagePlanner, StdlibPlanner,
  UninstallerPlanner, installer_file_name, package_file_name,
};

/// Partial-rebuild directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipDirective {
  /// Reuse the core archive and executable from the previous run.
  SkipCore,
  /// Leave out the stdlib and everything that needs it.
  SkipStdlib,
}

impl fmt::Display for SkipDirective {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::SkipCore => f.write_str("skip-core"),
      Self::SkipStdlib => f.write_str("skip-stdlib"),
    }
  }
}

/// What the caller asked for beyond the default artifact set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Directives {
  pub skip_core: bool,
  pub skip_stdlib: bool,
  /// Also build the CUDA executable.
  pub accelerated: bool,
}

/// An artifact removed from the graph by a directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrunedArtifact {
  pub id: ArtifactId,
  pub kind: ArtifactKind,
  pub directive: SkipDirective,
}

#[derive(Debug, Clone)]
pub struct BuildPlan {
  pub graph: ArtifactGraph,
  pub pruned: Vec<PrunedArtifact>,
}

/// Declare the artifact graph for the profile's target.
pub fn plan(
  profile: &ToolchainProfile,
  layout: &Layout,
  config: &Config,
  package_arch: PackageArch,
  directives: Directives,
) -> Result<BuildPlan, ExecuteError> {
  let target = profile.target;
  let project = &config.project;
  let mut artifacts = Vec::new();

  let mut core = Artifact::new(
    ids::CORE,
    ArtifactKind::StaticArchive,
    layout.core_archive(),
    Arc::new(CorePlanner),
  );
  let mut executable = Artifact::new(
    ids::EXECUTABLE,
    ArtifactKind::Executable,
    layout.bin.join(profile.executable_name(&project.executable)),
    Arc::new(ExecutablePlanner),
  )
  .depends_on([ids::CORE]);

  if directives.skip_core {
    core = core.reused(SkipDirective::SkipCore);
    executable = executable.reused(SkipDirective::SkipCore);
  }
  artifacts.push(core);
  artifacts.push(executable);

  if directives.accelerated {
    profile.require_accelerator()?;
    artifacts.push(
      Artifact::new(
        ids::ACCELERATED,
        ArtifactKind::Executable,
        layout.bin.join(profile.executable_name(&format!("{}-accelerated", project.executable))),
        Arc::new(AcceleratedPlanner),
      )
      .depends_on([ids::CORE]),
    );
  }

  artifacts.push(
    Artifact::new(
      ids::STDLIB,
      ArtifactKind::SharedLibrary,
      layout.stdlib_dir.join(profile.shared_library_name(&project.stdlib)),
      Arc::new(StdlibPlanner),
    )
    .depends_on([ids::CORE]),
  );

  match (target.os, target.variant) {
    (Os::Windows, _) => {
      artifacts.push(Artifact::new(
        ids::UNINSTALLER,
        ArtifactKind::Uninstaller,
        layout.bin.join(profile.executable_name("uninstaller")),
        Arc::new(UninstallerPlanner),
      ));
      artifacts.push(
        Artifact::new(
          ids::INSTALLER,
          ArtifactKind::Installer,
          layout.dist.join(installer_file_name(config, &target)),
          Arc::new(InstallerPlanner),
        )
        .depends_on([ids::EXECUTABLE, ids::STDLIB, ids::UNINSTALLER]),
      );
    }
    (Os::Linux, Variant::Standard) => {
      let mut package = Artifact::new(
        ids::PACKAGE,
        ArtifactKind::Package,
        layout.dist.join(package_file_name(config, package_arch)),
        Arc::new(PackagePlanner),
      )
      .depends_on([ids::EXECUTABLE, ids::STDLIB]);
      if directives.accelerated {
        package = package.depends_on([ids::ACCELERATED]);
      }
      artifacts.push(package);
    }
    _ => {}
  }

  let mut graph = ArtifactGraph::new(artifacts)?;
  let mut pruned = Vec::new();

  if directives.skip_stdlib {
    let removed = graph.downstream(&ArtifactId::from(ids::STDLIB));
    for id in &removed {
      if let Some(artifact) = graph.get(id) {
        debug!(artifact = %id, "pruned by skip-stdlib");
        pruned.push(PrunedArtifact {
          id: id.clone(),
          kind: artifact.kind,
          directive: SkipDirective::SkipStdlib,
        });
      }
    }
    graph = graph.without(&removed)?;
  }

  info!(
    target = %target,
    artifacts = graph.len(),
    pruned = pruned.len(),
    "planned build"
  );
  Ok(BuildPlan { graph, pruned })
}

/// Every output a skip directive reuses must already exist.
pub fn check_reused(graph: &ArtifactGraph) -> Result<(), ExecuteError> {
  for artifact in graph.iter().filter(|a| a.reused_by.is_some()) {
    if !artifact.output.exists() {
      return Err(ExecuteError::MissingReusedOutput {
        artifact: artifact.id.clone(),
        path: artifact.output.clone(),
      });
    }
  }
  Ok(())
}

/// Serializable view of a plan for `plan --json` and the terminal listing.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
  pub target: String,
  pub waves: Vec<Vec<PlannedArtifact>>,
  pub pruned: Vec<PrunedArtifact>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedArtifact {
  pub id: ArtifactId,
  pub kind: ArtifactKind,
  pub output: PathBuf,
  pub deps: Vec<ArtifactId>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reused_by: Option<SkipDirective>,
}

impl PlanSummary {
  pub fn new(plan: &BuildPlan, profile: &ToolchainProfile) -> Self {
    let graph = &plan.graph;
    let waves = graph
      .waves()
      .into_iter()
      .map(|wave| {
        wave
          .iter()
          .filter_map(|id| graph.get(id))
          .map(|artifact| PlannedArtifact {
            id: artifact.id.clone(),
            kind: artifact.kind,
            output: artifact.output.clone(),
            deps: graph.dependencies(&artifact.id),
            reused_by: artifact.reused_by,
          })
          .collect()
      })
      .collect();

    Self {
      target: profile.target.triple(),
      waves,
      pruned: plan.pruned.clone(),
    }
  }

  pub fn artifact_count(&self) -> usize {
    self.waves.iter().map(Vec::len).sum()
  }
}
