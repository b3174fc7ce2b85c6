//! Debian package stage.

use tracing::debug;

use crate::artifact::Artifact;
use crate::config::Config;
use crate::execute::{BuildContext, ExecuteError, StagePlan, StagePlanner, TransientFiles};
use crate::package::{PackageArch, PackageManifest, archive_invocation, stage};
use crate::platform::BuildTarget;

/// Package architecture for `target`.
///
/// A host build uses the host's machine string, so unusual machines fall
/// back to `all`. Foreign targets are mapped from their architecture.
pub fn package_arch(target: &BuildTarget, host_machine: &str) -> PackageArch {
  if target.is_host() {
    PackageArch::from_machine(host_machine)
  } else {
    PackageArch::from_arch(target.arch)
  }
}

pub fn package_file_name(config: &Config, arch: PackageArch) -> String {
  PackageManifest::from_config(config, arch).file_name()
}

/// Stages the install tree and archives it with `dpkg-deb`.
#[derive(Debug, Default)]
pub struct PackagePlanner;

impl StagePlanner for PackagePlanner {
  fn prepare(
    &self,
    artifact: &Artifact,
    ctx: &BuildContext,
    transient: &TransientFiles,
  ) -> Result<StagePlan, ExecuteError> {
    let layout = &ctx.layout;
    let manifest = PackageManifest::from_config(&ctx.config, ctx.package_arch);

    transient.register(&layout.staging);
    let staged = stage(&layout.install, &layout.staging, &ctx.config, manifest)?;
    debug!(stage = %artifact.id, files = staged.manifest.files.len(), "package staged");

    Ok(StagePlan {
      steps: vec![archive_invocation(&staged.root, &artifact.output)],
      outputs: vec![artifact.output.clone()],
    })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use tempfile::TempDir;

  use super::*;
  use crate::artifact::{ArtifactKind, ids};
  use crate::platform::{Arch, Os, Variant};
  use crate::stages::fixtures;
  use crate::util::testutil::write_file;

  #[test]
  fn foreign_targets_map_from_arch() {
    let foreign = if Arch::current() == Some(Arch::Arm) {
      BuildTarget::new(Os::Linux, Arch::X86, Variant::Standard)
    } else {
      BuildTarget::new(Os::Linux, Arch::Arm, Variant::Standard)
    };
    let expected = PackageArch::from_arch(foreign.arch);
    assert_eq!(package_arch(&foreign, "x86_64"), expected);
  }

  #[test]
  fn host_targets_use_the_machine_string() {
    let host = BuildTarget::current().unwrap();
    assert_eq!(package_arch(&host, "armv7l"), PackageArch::Armhf);
    assert_eq!(package_arch(&host, "riscv64"), PackageArch::All);
  }

  #[test]
  fn stages_and_archives() {
    let temp = TempDir::new().unwrap();
    let ctx = fixtures::linux(temp.path());
    write_file(&ctx.layout.bin, "n8", b"\x7fELF");
    let out = ctx.layout.dist.join(package_file_name(&ctx.config, ctx.package_arch));
    let artifact = Artifact::new(ids::PACKAGE, ArtifactKind::Package, &out, Arc::new(PackagePlanner));
    let transient = TransientFiles::new();

    let plan = PackagePlanner.prepare(&artifact, &ctx, &transient).unwrap();

    assert_eq!(transient.snapshot(), vec![ctx.layout.staging.clone()]);
    assert!(ctx.layout.staging.join("DEBIAN/control").is_file());
    assert!(ctx.layout.staging.join("opt/n8-lang/bin/n8").is_file());

    let step = &plan.steps[0];
    assert_eq!(step.program, "dpkg-deb");
    assert_eq!(step.args.last().unwrap(), &out.display().to_string());
    assert_eq!(plan.outputs, vec![out]);
  }

  #[test]
  fn missing_install_tree_fails() {
    let temp = TempDir::new().unwrap();
    let ctx = fixtures::linux(temp.path());
    let artifact = Artifact::new(ids::PACKAGE, ArtifactKind::Package, "p.deb", Arc::new(PackagePlanner));
    let err = PackagePlanner
      .prepare(&artifact, &ctx, &TransientFiles::new())
      .unwrap_err();
    assert!(matches!(err, ExecuteError::Package(_)));
  }
}
