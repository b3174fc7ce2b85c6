//! Stage planners: one per artifact kind.
//!
//! A planner turns the current [`BuildContext`] into the tool invocations
//! that produce its artifact. Planners never run tools themselves; the
//! driver does, so every command line here is observable in tests through a
//! fake runner.

pub mod compile;
pub mod package;
pub mod windows;

use std::path::{Path, PathBuf};

use crate::artifact::ArtifactId;
use crate::discover::CompilationUnit;
use crate::execute::{BuildContext, ExecuteError};
use crate::util::hash::hash_bytes;

pub use compile::{AcceleratedPlanner, CorePlanner, ExecutablePlanner, StdlibPlanner};
pub use package::{PackagePlanner, package_arch, package_file_name};
pub use windows::{InstallerPlanner, UninstallerPlanner, installer_file_name};

/// `-I<root>/<dir>` for each directory.
pub(crate) fn include_flags(root: &Path, dirs: &[PathBuf]) -> Vec<String> {
  dirs.iter().map(|dir| format!("-I{}", root.join(dir).display())).collect()
}

pub(crate) fn unit_paths(units: &[CompilationUnit]) -> impl Iterator<Item = String> + '_ {
  units.iter().map(|unit| unit.path.display().to_string())
}

/// Output of a dependency that finished (or was reused) earlier in the run.
pub(crate) fn dependency_output<'a>(
  ctx: &'a BuildContext,
  artifact: &ArtifactId,
  dependency: &str,
) -> Result<&'a Path, ExecuteError> {
  let dependency = ArtifactId::from(dependency);
  ctx
    .output(&dependency)
    .ok_or_else(|| ExecuteError::UnfinishedDependency {
      artifact: artifact.clone(),
      dependency,
    })
}

/// Flatten a path relative to `root` into an object file name:
/// `src/core/runtime.cpp` becomes `src_core_runtime-<digest>.o`.
///
/// Flattening alone is lossy (`a_b.cpp` and `a/b.cpp`, `x.cpp` and `x.cc`),
/// so the name carries the first eight hex digits of the relative path's
/// SHA-256.
pub(crate) fn object_name(root: &Path, source: &Path) -> String {
  let relative = source.strip_prefix(root).unwrap_or(source);
  let flat: String = relative
    .with_extension("")
    .to_string_lossy()
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
    .collect();
  let key = relative.to_string_lossy();
  let digest = hash_bytes(key.as_bytes());
  format!("{}-{}.o", flat.trim_start_matches('_'), &digest.0[..8])
}

#[cfg(test)]
pub(crate) mod fixtures {
  use std::path::Path;

  use crate::config::Config;
  use crate::discover::SourceSet;
  use crate::execute::BuildContext;
  use crate::layout::Layout;
  use crate::platform::{Arch, BuildTarget, Os, Variant};
  use crate::probe::FeatureSet;
  use crate::profile::ToolchainProfile;
  use crate::util::testutil::n8_source_tree;

  /// A context over a fresh N8 tree at `root` for the given target.
  pub fn context(root: &Path, os: Os, arch: Arch, variant: Variant) -> BuildContext {
    n8_source_tree(root);
    let target = BuildTarget::new(os, arch, variant);
    let config = Config::default();
    let profile = ToolchainProfile::select(target, &FeatureSet::empty(arch)).unwrap();
    let layout = Layout::new(root, &config);
    let sources = SourceSet::discover(root, &config.sources).unwrap();
    BuildContext::new(config, profile, layout, sources)
  }

  pub fn linux(root: &Path) -> BuildContext {
    context(root, Os::Linux, Arch::X86_64, Variant::Standard)
  }

  pub fn windows(root: &Path) -> BuildContext {
    context(root, Os::Windows, Arch::X86_64, Variant::Standard)
  }
}
