//! Native compilation stages: core archive, executables, stdlib.

use tracing::debug;

use super::{dependency_output, include_flags, object_name, unit_paths};
use crate::artifact::{Artifact, ids};
use crate::execute::{BuildContext, ExecuteError, Invocation, StagePlan, StagePlanner, TransientFiles};

/// Compiles core and vendor sources to objects and archives them.
///
/// Both the executable and the stdlib link this archive, so the interpreter
/// sources are compiled once per run.
#[derive(Debug, Default)]
pub struct CorePlanner;

impl StagePlanner for CorePlanner {
  fn prepare(&self, artifact: &Artifact, ctx: &BuildContext, _: &TransientFiles) -> Result<StagePlan, ExecuteError> {
    let profile = &ctx.profile;
    let layout = &ctx.layout;
    let includes = include_flags(&layout.root, &ctx.config.sources.include_dirs);
    let flags = profile.object_flags();

    let mut steps = Vec::new();
    let mut objects = Vec::new();
    for unit in ctx.sources.core.iter().chain(ctx.sources.vendor.iter()) {
      let object = layout.objects.join(object_name(&layout.root, &unit.path));
      steps.push(
        Invocation::new(&profile.compiler)
          .args(flags.iter().cloned())
          .args(includes.iter().cloned())
          .arg("-c")
          .arg(unit.path.display().to_string())
          .arg("-o")
          .arg(object.display().to_string()),
      );
      objects.push(object.display().to_string());
    }

    debug!(stage = %artifact.id, objects = objects.len(), "planned core objects");
    steps.push(
      Invocation::new(&profile.archiver)
        .arg("rcs")
        .arg(artifact.output.display().to_string())
        .args(objects),
    );

    Ok(StagePlan {
      steps,
      outputs: vec![artifact.output.clone()],
    })
  }
}

/// Links the interpreter executable from the core archive.
#[derive(Debug, Default)]
pub struct ExecutablePlanner;

impl StagePlanner for ExecutablePlanner {
  fn prepare(&self, artifact: &Artifact, ctx: &BuildContext, _: &TransientFiles) -> Result<StagePlan, ExecuteError> {
    let profile = &ctx.profile;
    let archive = dependency_output(ctx, &artifact.id, ids::CORE)?;

    let link = Invocation::new(&profile.compiler)
      .args(profile.compile_flags())
      .args(profile.link_flags.iter().cloned())
      .arg("-o")
      .arg(artifact.output.display().to_string())
      .args(profile.whole_archive(archive))
      .args(profile.libraries.iter().cloned());

    Ok(StagePlan {
      steps: vec![link],
      outputs: vec![artifact.output.clone()],
    })
  }
}

/// Builds the stdlib shared library from the `.cc` sources, the
/// stdlib-only vendor sources and the whole core archive.
#[derive(Debug, Default)]
pub struct StdlibPlanner;

impl StagePlanner for StdlibPlanner {
  fn prepare(&self, artifact: &Artifact, ctx: &BuildContext, _: &TransientFiles) -> Result<StagePlan, ExecuteError> {
    let profile = &ctx.profile;
    let root = &ctx.layout.root;
    let archive = dependency_output(ctx, &artifact.id, ids::CORE)?;

    let build = Invocation::new(&profile.compiler)
      .args(profile.library_flags())
      .args(profile.shared_flags.iter().cloned())
      .args(include_flags(root, &ctx.config.sources.include_dirs))
      .args(include_flags(root, &ctx.config.sources.stdlib_include_dirs))
      .args(unit_paths(&ctx.sources.stdlib))
      .args(unit_paths(&ctx.sources.stdlib_vendor))
      .args(profile.whole_archive(archive))
      .args(profile.libraries.iter().cloned())
      .arg("-o")
      .arg(artifact.output.display().to_string());

    Ok(StagePlan {
      steps: vec![build],
      outputs: vec![artifact.output.clone()],
    })
  }
}

/// Builds the CUDA-accelerated executable with the accelerator compiler.
#[derive(Debug, Default)]
pub struct AcceleratedPlanner;

impl StagePlanner for AcceleratedPlanner {
  fn prepare(&self, artifact: &Artifact, ctx: &BuildContext, _: &TransientFiles) -> Result<StagePlan, ExecuteError> {
    let profile = &ctx.profile;
    let nvcc = profile.require_accelerator()?;
    let archive = dependency_output(ctx, &artifact.id, ids::CORE)?;
    let archive_dir = archive.parent().unwrap_or(&ctx.layout.temp);

    // `-x cu` applies to every input file, so the archive goes in through -L/-l.
    let build = Invocation::new(nvcc)
      .args(profile.accelerator_flags())
      .args(include_flags(&ctx.layout.root, &ctx.config.sources.include_dirs))
      .args(unit_paths(&ctx.sources.accelerated))
      .arg(format!("-L{}", archive_dir.display()))
      .arg("-ln8core")
      .args(profile.libraries.iter().cloned())
      .arg("-o")
      .arg(artifact.output.display().to_string());

    Ok(StagePlan {
      steps: vec![build],
      outputs: vec![artifact.output.clone()],
    })
  }
}
