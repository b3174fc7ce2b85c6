//! Immutable per-run build state handed to every stage.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::artifact::ArtifactId;
use crate::config::Config;
use crate::discover::SourceSet;
use crate::layout::Layout;
use crate::package::PackageArch;
use crate::platform::BuildTarget;
use crate::profile::ToolchainProfile;

/// Snapshot of what a stage may read.
///
/// Stages never mutate the context. After each wave the driver derives a
/// new one carrying the outputs of the artifacts that finished.
#[derive(Debug, Clone)]
pub struct BuildContext {
  pub target: BuildTarget,
  pub config: Arc<Config>,
  pub profile: Arc<ToolchainProfile>,
  pub layout: Arc<Layout>,
  pub sources: Arc<SourceSet>,
  /// Debian architecture the package and installer are named for.
  pub package_arch: PackageArch,
  completed: BTreeMap<ArtifactId, Vec<PathBuf>>,
  transient: Vec<PathBuf>,
}

impl BuildContext {
  pub fn new(config: Config, profile: ToolchainProfile, layout: Layout, sources: SourceSet) -> Self {
    let target = profile.target;
    Self {
      target,
      config: Arc::new(config),
      profile: Arc::new(profile),
      layout: Arc::new(layout),
      sources: Arc::new(sources),
      package_arch: PackageArch::from_arch(target.arch),
      completed: BTreeMap::new(),
      transient: Vec::new(),
    }
  }

  pub fn with_package_arch(mut self, arch: PackageArch) -> Self {
    self.package_arch = arch;
    self
  }

  /// Derive a context that records `outputs` for `id`.
  pub fn with_completed(mut self, id: ArtifactId, outputs: Vec<PathBuf>) -> Self {
    self.completed.insert(id, outputs);
    self
  }

  /// Derive a context that knows about additional transient paths.
  pub fn with_transient(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
    for path in paths {
      if !self.transient.contains(&path) {
        self.transient.push(path);
      }
    }
    self
  }

  /// Primary output of a completed artifact.
  pub fn output(&self, id: &ArtifactId) -> Option<&Path> {
    self.completed.get(id)?.first().map(PathBuf::as_path)
  }

  pub fn outputs(&self, id: &ArtifactId) -> &[PathBuf] {
    self.completed.get(id).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn is_completed(&self, id: &ArtifactId) -> bool {
    self.completed.contains_key(id)
  }

  pub fn transient(&self) -> &[PathBuf] {
    &self.transient
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::{Arch, Os, Variant};
  use crate::probe::FeatureSet;

  fn context() -> BuildContext {
    let target = BuildTarget::new(Os::Linux, Arch::X86_64, Variant::Standard);
    let config = Config::default();
    let profile = ToolchainProfile::select(target, &FeatureSet::empty(Arch::X86_64)).unwrap();
    let layout = Layout::new(Path::new("/project"), &config);
    BuildContext::new(config, profile, layout, SourceSet::default())
  }

  #[test]
  fn completed_outputs_are_visible_in_derived_context() {
    let base = context();
    let next = base
      .clone()
      .with_completed(ArtifactId::from("core"), vec![PathBuf::from("/project/temp/libn8core.a")]);

    assert!(base.output(&ArtifactId::from("core")).is_none());
    assert_eq!(
      next.output(&ArtifactId::from("core")),
      Some(Path::new("/project/temp/libn8core.a"))
    );
    assert!(next.is_completed(&ArtifactId::from("core")));
    assert!(next.outputs(&ArtifactId::from("n8")).is_empty());
  }

  #[test]
  fn transient_paths_are_deduplicated() {
    let ctx = context()
      .with_transient([PathBuf::from("a.res"), PathBuf::from("b.res")])
      .with_transient([PathBuf::from("a.res")]);
    assert_eq!(ctx.transient().len(), 2);
  }
}
