//! End-to-end build orchestration.
//!
//! [`run`] drives one build:
//!
//! 1. Load the config and resolve the target
//! 2. Probe the host and select the toolchain profile
//! 3. Plan the artifact graph and check reused outputs
//! 4. Prepare the layout (wiped unless core is reused)
//! 5. Host setup: submodules, optional system packages
//! 6. Discover sources, failing on empty mandatory stages
//! 7. Execute the graph and report
//!
//! Everything up to step 6 runs before any stage tool is invoked.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactId;
use crate::config::Config;
use crate::discover::{LanguageKind, SourceSet, require_units};
use crate::execute::{
  BuildContext, BuildReport, CancelFlag, ExecuteError, ExecuteOptions, Invocation, ToolRunner, execute,
};
use crate::layout::Layout;
use crate::package::PackageArch;
use crate::plan::{BuildPlan, Directives, PlanSummary, check_reused, plan};
use crate::platform::{BuildTarget, Os, Variant, host_machine};
use crate::probe::{CpuFlagSource, FeatureSet, probe_target};
use crate::profile::ToolchainProfile;
use crate::stages::package_arch;

/// System packages the desktop runtime links against.
const PREREQ_PACKAGES: &[&str] = &["libglfw3-dev", "libgl1-mesa-dev"];

/// Commands run on the host before sources are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostSetup {
  /// `git submodule update --init --recursive`.
  pub submodules: bool,
  /// `sudo apt install` the prerequisites (linux/standard only).
  pub install_prereqs: bool,
}

impl Default for HostSetup {
  fn default() -> Self {
    Self {
      submodules: true,
      install_prereqs: false,
    }
  }
}

/// Everything a build run needs from the caller.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
  pub project_dir: PathBuf,
  /// Explicit config file; `n8forge.toml` at the project root otherwise.
  pub config_path: Option<PathBuf>,
  /// Defaults to the host.
  pub target: Option<BuildTarget>,
  pub directives: Directives,
  pub jobs: usize,
  pub host_setup: HostSetup,
  /// Replaces `windows.msys2_prefix` from the config.
  pub msys2_override: Option<PathBuf>,
  /// Replaces the host's `uname -m` when naming the package.
  pub host_machine: Option<String>,
}

/// Config, target and profile resolved for a project.
#[derive(Debug, Clone)]
pub struct Resolved {
  pub project_dir: PathBuf,
  pub config: Config,
  pub target: BuildTarget,
  pub features: FeatureSet,
  pub profile: ToolchainProfile,
  pub layout: Layout,
  pub package_arch: PackageArch,
}

impl Resolved {
  pub fn plan(&self, directives: Directives) -> Result<BuildPlan, ExecuteError> {
    plan(&self.profile, &self.layout, &self.config, self.package_arch, directives)
  }

  /// Name the package after `machine` instead of the host's own machine
  /// string. Foreign targets ignore it.
  pub fn with_host_machine(mut self, machine: &str) -> Self {
    self.package_arch = package_arch(&self.target, machine);
    self
  }
}

/// Load the config and select the profile, without touching the filesystem
/// beyond reading the config.
pub fn resolve(
  project_dir: &Path,
  config_path: Option<&Path>,
  target: Option<BuildTarget>,
  probe: &dyn CpuFlagSource,
) -> Result<Resolved, ExecuteError> {
  let project_dir = std::path::absolute(project_dir)?;
  let config = Config::load(&project_dir, config_path)?;
  let target = match target {
    Some(target) => target,
    None => BuildTarget::current()?,
  };

  let features = probe_target(&target, probe);
  let profile = ToolchainProfile::select(target, &features)?;
  let layout = Layout::new(&project_dir, &config);
  let package_arch = package_arch(&target, &host_machine());
  debug!(target = %target, root = ?project_dir, arch = %package_arch, "resolved project");

  Ok(Resolved {
    project_dir,
    config,
    target,
    features,
    profile,
    layout,
    package_arch,
  })
}

/// Run a full build.
pub async fn run(
  request: BuildRequest,
  probe: &dyn CpuFlagSource,
  runner: Arc<dyn ToolRunner>,
  cancel: CancelFlag,
) -> Result<BuildReport, ExecuteError> {
  let mut resolved = resolve(
    &request.project_dir,
    request.config_path.as_deref(),
    request.target,
    probe,
  )?;
  if let Some(prefix) = &request.msys2_override {
    resolved.config.windows.msys2_prefix = prefix.clone();
  }
  if let Some(machine) = &request.host_machine {
    resolved = resolved.with_host_machine(machine);
  }
  let Resolved {
    project_dir,
    config,
    target,
    profile,
    layout,
    package_arch,
    ..
  } = resolved;
  let directives = request.directives;

  info!(
    target = %target,
    compiler = %profile.compiler,
    skip_core = directives.skip_core,
    skip_stdlib = directives.skip_stdlib,
    "starting build"
  );

  let BuildPlan { graph, pruned } = plan(&profile, &layout, &config, package_arch, directives)?;
  check_reused(&graph)?;

  if directives.skip_core {
    layout.prepare_partial()?;
  } else {
    layout.prepare_full()?;
  }

  host_setup(&project_dir, &target, request.host_setup, &runner).await?;

  let sources = SourceSet::discover(&project_dir, &config.sources)?;
  check_mandatory(&config, &sources, directives)?;

  let ctx = BuildContext::new(config, profile, layout, sources).with_package_arch(package_arch);
  let options = ExecuteOptions {
    jobs: request.jobs.max(1),
  };
  let report = execute(&graph, ctx, runner, &options, &cancel).await;
  Ok(report.with_pruned(pruned))
}

/// Plan a build without running anything.
pub fn preview(resolved: &Resolved, directives: Directives) -> Result<PlanSummary, ExecuteError> {
  let plan = resolved.plan(directives)?;
  Ok(PlanSummary::new(&plan, &resolved.profile))
}

/// What `info` reports about the resolved target.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
  pub target: BuildTarget,
  pub host: bool,
  pub features: Vec<String>,
  pub profile: ToolchainProfile,
}

impl Inspection {
  pub fn new(resolved: &Resolved) -> Self {
    Self {
      target: resolved.target,
      host: resolved.target.is_host(),
      features: resolved.features.iter().map(|f| f.name().to_string()).collect(),
      profile: resolved.profile.clone(),
    }
  }
}

fn check_mandatory(config: &Config, sources: &SourceSet, directives: Directives) -> Result<(), ExecuteError> {
  let roots = &config.sources;
  if !directives.skip_core {
    require_units("core", LanguageKind::Cpp, &roots.core, &sources.core)?;
  }
  if !directives.skip_stdlib {
    require_units("stdlib", LanguageKind::StdlibCpp, &roots.stdlib, &sources.stdlib)?;
  }
  if directives.accelerated {
    require_units("n8-accelerated", LanguageKind::Cuda, &roots.accelerated, &sources.accelerated)?;
  }
  Ok(())
}

async fn host_setup(
  project_dir: &Path,
  target: &BuildTarget,
  setup: HostSetup,
  runner: &Arc<dyn ToolRunner>,
) -> Result<(), ExecuteError> {
  if setup.submodules {
    let invocation = Invocation::new("git")
      .args(["submodule", "update", "--init", "--recursive"])
      .current_dir(project_dir);
    run_step("submodules", invocation, runner).await?;
  } else {
    debug!("submodule update disabled");
  }

  if setup.install_prereqs {
    if target.os == Os::Linux && target.variant == Variant::Standard && target.is_host() {
      let invocation = Invocation::new("sudo")
        .args(["apt", "install", "-y"])
        .args(PREREQ_PACKAGES.iter().copied());
      run_step("prerequisites", invocation, runner).await?;
    } else {
      warn!(target = %target, "prerequisite install only supported on linux hosts, skipping");
    }
  }
  Ok(())
}

async fn run_step(step: &'static str, invocation: Invocation, runner: &Arc<dyn ToolRunner>) -> Result<(), ExecuteError> {
  info!(step, command = %invocation, "host setup");
  let runner = Arc::clone(runner);
  tokio::task::spawn_blocking(move || runner.run(&invocation))
    .await
    .map_err(|e| ExecuteError::Panicked {
      artifact: ArtifactId::from(step),
      message: e.to_string(),
    })?
    .map_err(|source| ExecuteError::HostSetup { step, source })?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use tempfile::TempDir;

  use super::*;
  use crate::execute::{ErrorKind, ToolError, ToolOutput};
  use crate::platform::Arch;
  use crate::probe::StaticFlags;
  use crate::util::testutil::{n8_source_tree, write_file};

  #[derive(Default)]
  struct Recorder {
    calls: Mutex<Vec<String>>,
    fail: Option<&'static str>,
  }

  impl ToolRunner for Recorder {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
      self.calls.lock().unwrap().push(invocation.to_string());
      if self.fail == Some(invocation.program.as_str()) {
        return Err(ToolError::Failed {
          program: invocation.program.clone(),
          code: Some(128),
          stderr: "fatal: not a git repository".to_string(),
        });
      }
      Ok(ToolOutput::default())
    }
  }

  fn windows() -> BuildTarget {
    BuildTarget::new(Os::Windows, Arch::X86_64, Variant::Standard)
  }

  #[test]
  fn resolve_uses_defaults_without_config() {
    let temp = TempDir::new().unwrap();
    let resolved = resolve(temp.path(), None, Some(windows()), &StaticFlags::new(["avx2"])).unwrap();
    assert_eq!(resolved.profile.target, windows());
    assert_eq!(resolved.config, Config::default());
    assert!(resolved.layout.bin.starts_with(temp.path()));
  }

  #[test]
  fn preview_lists_windows_waves() {
    let temp = TempDir::new().unwrap();
    let resolved = resolve(temp.path(), None, Some(windows()), &StaticFlags::new(Vec::<String>::new())).unwrap();
    let summary = preview(&resolved, Directives::default()).unwrap();
    assert_eq!(summary.artifact_count(), 5);
    assert!(summary.pruned.is_empty());
  }

  #[test]
  fn host_machine_names_the_package_only_for_host_targets() {
    let temp = TempDir::new().unwrap();
    let flags = StaticFlags::new(Vec::<String>::new());

    let host = resolve(temp.path(), None, None, &flags).unwrap().with_host_machine("riscv64");
    assert_eq!(host.package_arch, PackageArch::All);

    let linux_arm = BuildTarget::new(Os::Linux, Arch::Aarch64, Variant::Standard);
    if !linux_arm.is_host() {
      let foreign = resolve(temp.path(), None, Some(linux_arm), &flags)
        .unwrap()
        .with_host_machine("riscv64");
      assert_eq!(foreign.package_arch, PackageArch::Arm64);
      let summary = preview(&foreign, Directives::default()).unwrap();
      let package = summary.waves.iter().flatten().find(|a| a.id.as_str() == "package").unwrap();
      assert!(package.output.ends_with("n8-lang_1.0.0_arm64.deb"));
    }
  }

  #[test]
  fn inspection_reports_profile() {
    let temp = TempDir::new().unwrap();
    let resolved = resolve(temp.path(), None, Some(windows()), &StaticFlags::new(Vec::<String>::new())).unwrap();
    let inspection = Inspection::new(&resolved);
    assert_eq!(inspection.profile.compiler, resolved.profile.compiler);
    let json = serde_json::to_value(&inspection).unwrap();
    assert_eq!(json["target"]["os"], "windows");
  }

  #[tokio::test]
  async fn failed_submodule_update_is_fatal() {
    let temp = TempDir::new().unwrap();
    let runner = Recorder {
      fail: Some("git"),
      ..Recorder::default()
    };
    let runner: Arc<dyn ToolRunner> = Arc::new(runner);
    let err = host_setup(temp.path(), &windows(), HostSetup::default(), &runner)
      .await
      .unwrap_err();
    assert!(matches!(err, ExecuteError::HostSetup { step: "submodules", .. }));
    assert_eq!(err.kind(), ErrorKind::ToolInvocation);
  }

  #[tokio::test]
  async fn prereqs_skipped_for_foreign_targets() {
    let temp = TempDir::new().unwrap();
    let recorder = Arc::new(Recorder::default());
    let runner: Arc<dyn ToolRunner> = recorder.clone();
    let setup = HostSetup {
      submodules: false,
      install_prereqs: true,
    };
    host_setup(temp.path(), &windows(), setup, &runner).await.unwrap();
    assert!(recorder.calls.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn empty_stdlib_fails_before_any_stage_tool() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "src/N8.cpp", b"");
    let recorder = Arc::new(Recorder::default());
    let request = BuildRequest {
      project_dir: temp.path().to_path_buf(),
      target: Some(windows()),
      jobs: 1,
      ..BuildRequest::default()
    };

    let err = run(request, &StaticFlags::new(Vec::<String>::new()), recorder.clone(), CancelFlag::new())
      .await
      .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Discovery);
    let calls = recorder.calls.lock().unwrap();
    assert_eq!(calls.as_slice(), ["git submodule update --init --recursive"]);
  }

  #[tokio::test]
  async fn skip_stdlib_does_not_require_stdlib_sources() {
    let temp = TempDir::new().unwrap();
    n8_source_tree(temp.path());
    std::fs::remove_dir_all(temp.path().join("std")).unwrap();
    let config = Config::default();
    let sources = SourceSet::discover(temp.path(), &config.sources).unwrap();
    let directives = Directives {
      skip_stdlib: true,
      ..Directives::default()
    };
    check_mandatory(&config, &sources, directives).unwrap();
    assert!(check_mandatory(&config, &sources, Directives::default()).is_err());
  }
}
