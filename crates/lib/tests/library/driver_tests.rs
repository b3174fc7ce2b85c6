//! Execution driver behaviour against a fake process runner.

use std::path::Path;
use std::sync::Arc;

use n8forge_lib::artifact::{Artifact, ArtifactGraph, ArtifactId, ArtifactKind};
use n8forge_lib::config::Config;
use n8forge_lib::discover::SourceSet;
use n8forge_lib::execute::{
  BuildContext, CancelFlag, ErrorKind, ExecuteError, ExecuteOptions, Invocation, SkipReason, StageOutcome, StagePlan,
  StagePlanner, ToolRunner, TransientFiles, execute,
};
use n8forge_lib::layout::Layout;
use n8forge_lib::probe::FeatureSet;
use n8forge_lib::profile::ToolchainProfile;
use tempfile::TempDir;

use super::common::{FakeRunner, linux};

/// Runs `cc-<id> -o <output>`, optionally leaving a scratch file behind.
#[derive(Debug, Default)]
struct CompilePlanner {
  scratch: Option<&'static str>,
}

impl StagePlanner for CompilePlanner {
  fn prepare(&self, artifact: &Artifact, ctx: &BuildContext, transient: &TransientFiles) -> Result<StagePlan, ExecuteError> {
    if let Some(name) = self.scratch {
      let path = ctx.layout.temp.join(name);
      transient.register(&path);
      std::fs::create_dir_all(&ctx.layout.temp)?;
      std::fs::write(&path, b"scratch")?;
    }
    Ok(StagePlan {
      steps: vec![
        Invocation::new(format!("cc-{}", artifact.id))
          .arg("-o")
          .arg(artifact.output.display().to_string()),
      ],
      outputs: vec![artifact.output.clone()],
    })
  }
}

/// Leaves `temp/<id>.scratch` behind, then compiles like [`CompilePlanner`].
#[derive(Debug)]
struct PerStageScratchPlanner;

impl StagePlanner for PerStageScratchPlanner {
  fn prepare(&self, artifact: &Artifact, ctx: &BuildContext, transient: &TransientFiles) -> Result<StagePlan, ExecuteError> {
    let path = ctx.layout.temp.join(format!("{}.scratch", artifact.id));
    transient.register(&path);
    std::fs::create_dir_all(&ctx.layout.temp)?;
    std::fs::write(&path, artifact.id.as_str())?;
    CompilePlanner::default().prepare(artifact, ctx, transient)
  }
}

/// Registers a scratch file, then trips the cancel flag as Ctrl-C would
/// while the stage is running.
#[derive(Debug)]
struct InterruptedPlanner {
  cancel: CancelFlag,
}

impl StagePlanner for InterruptedPlanner {
  fn prepare(&self, artifact: &Artifact, ctx: &BuildContext, transient: &TransientFiles) -> Result<StagePlan, ExecuteError> {
    let plan = PerStageScratchPlanner.prepare(artifact, ctx, transient)?;
    self.cancel.cancel();
    Ok(plan)
  }
}

/// Runs a tool that never writes the declared output.
#[derive(Debug)]
struct SilentPlanner;

impl StagePlanner for SilentPlanner {
  fn prepare(&self, _: &Artifact, _: &BuildContext, _: &TransientFiles) -> Result<StagePlan, ExecuteError> {
    Ok(StagePlan {
      steps: vec![Invocation::new("true")],
      outputs: Vec::new(),
    })
  }
}

fn context(root: &Path) -> BuildContext {
  let config = Config::default();
  let profile = ToolchainProfile::select(linux(), &FeatureSet::empty(linux().arch)).unwrap();
  let layout = Layout::new(root, &config);
  BuildContext::new(config, profile, layout, SourceSet::default())
}

fn artifact(root: &Path, id: &str, kind: ArtifactKind, deps: &[&str]) -> Artifact {
  artifact_with(root, id, kind, deps, CompilePlanner::default())
}

fn artifact_with(root: &Path, id: &str, kind: ArtifactKind, deps: &[&str], planner: impl StagePlanner + 'static) -> Artifact {
  Artifact::new(id, kind, root.join("out").join(id), Arc::new(planner)).depends_on(deps.iter().copied())
}

/// core -> stdlib -> installer, with an unrelated uninstaller.
fn installer_graph(root: &Path) -> ArtifactGraph {
  ArtifactGraph::new(vec![
    artifact(root, "core", ArtifactKind::StaticArchive, &[]),
    artifact(root, "stdlib", ArtifactKind::SharedLibrary, &["core"]),
    artifact(root, "uninstaller", ArtifactKind::Uninstaller, &[]),
    artifact(root, "installer", ArtifactKind::Installer, &["stdlib"]),
  ])
  .unwrap()
}

fn runner(fake: &Arc<FakeRunner>) -> Arc<dyn ToolRunner> {
  fake.clone()
}

#[tokio::test]
async fn failed_core_blocks_dependents_only() {
  let temp = TempDir::new().unwrap();
  let graph = installer_graph(temp.path());
  let fake = FakeRunner::failing_on("cc-core");

  let report = execute(
    &graph,
    context(temp.path()),
    runner(&fake),
    &ExecuteOptions::default(),
    &CancelFlag::new(),
  )
  .await;

  assert!(matches!(report.outcome("core"), Some(StageOutcome::Failed(ExecuteError::Tool(_)))));
  assert!(matches!(
    report.outcome("stdlib"),
    Some(StageOutcome::Skipped(SkipReason::DependencyFailed(dep))) if dep.as_str() == "core"
  ));
  assert!(matches!(
    report.outcome("installer"),
    Some(StageOutcome::Skipped(SkipReason::DependencySkipped(dep))) if dep.as_str() == "stdlib"
  ));
  assert!(matches!(report.outcome("uninstaller"), Some(StageOutcome::Succeeded { .. })));
  assert!(temp.path().join("out/uninstaller").is_file());

  assert!(!fake.ran("cc-stdlib"));
  assert!(!fake.ran("cc-installer"));
  assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn failure_message_names_the_tool() {
  let temp = TempDir::new().unwrap();
  let graph = installer_graph(temp.path());
  let fake = FakeRunner::failing_on("cc-core");

  let report = execute(
    &graph,
    context(temp.path()),
    runner(&fake),
    &ExecuteOptions::default(),
    &CancelFlag::new(),
  )
  .await;

  let failed: Vec<_> = report.failed().collect();
  assert_eq!(failed.len(), 1);
  let StageOutcome::Failed(err) = &failed[0].outcome else {
    panic!("expected failure");
  };
  assert_eq!(err.kind(), ErrorKind::ToolInvocation);
  assert!(err.to_string().contains("simulated failure in cc-core"));
}

#[tokio::test]
async fn successful_outputs_are_hashed() {
  let temp = TempDir::new().unwrap();
  let graph = installer_graph(temp.path());
  let fake = FakeRunner::new();

  let report = execute(
    &graph,
    context(temp.path()),
    runner(&fake),
    &ExecuteOptions { jobs: 2 },
    &CancelFlag::new(),
  )
  .await;

  assert!(report.is_success());
  assert_eq!(report.succeeded().count(), 4);
  let Some(StageOutcome::Succeeded { outputs, .. }) = report.outcome("stdlib") else {
    panic!("stdlib should succeed");
  };
  assert_eq!(outputs[0].path, temp.path().join("out/stdlib"));
  assert_eq!(outputs[0].size, "cc-stdlib".len() as u64);
  assert_eq!(outputs[0].sha256.to_string().len(), 64);

  let programs = fake.programs();
  let position = |p: &str| programs.iter().position(|x| x == p).unwrap();
  assert!(position("cc-core") < position("cc-stdlib"));
  assert!(position("cc-stdlib") < position("cc-installer"));
}

#[tokio::test]
async fn transient_files_of_a_failing_stage_are_removed() {
  let temp = TempDir::new().unwrap();
  let graph = ArtifactGraph::new(vec![artifact_with(
    temp.path(),
    "core",
    ArtifactKind::StaticArchive,
    &[],
    CompilePlanner {
      scratch: Some("scratch.o"),
    },
  )])
  .unwrap();
  let fake = FakeRunner::failing_on("cc-core");
  let ctx = context(temp.path());
  let scratch = ctx.layout.temp.join("scratch.o");

  let report = execute(&graph, ctx, runner(&fake), &ExecuteOptions::default(), &CancelFlag::new()).await;

  assert_eq!(report.failed().count(), 1);
  assert_eq!(report.cleaned, vec![scratch.clone()]);
  assert!(!scratch.exists());
}

#[tokio::test]
async fn cancel_before_dispatch_skips_everything() {
  let temp = TempDir::new().unwrap();
  let graph = installer_graph(temp.path());
  let fake = FakeRunner::new();
  let cancel = CancelFlag::new();
  cancel.cancel();

  let report = execute(&graph, context(temp.path()), runner(&fake), &ExecuteOptions::default(), &cancel).await;

  assert!(report.cancelled);
  assert_eq!(report.skipped().count(), 4);
  assert!(
    report
      .stages
      .iter()
      .all(|s| matches!(s.outcome, StageOutcome::Skipped(SkipReason::Cancelled)))
  );
  assert!(fake.calls().is_empty());
  assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn missing_output_fails_the_stage() {
  let temp = TempDir::new().unwrap();
  let graph = ArtifactGraph::new(vec![
    artifact_with(temp.path(), "core", ArtifactKind::StaticArchive, &[], SilentPlanner),
    artifact(temp.path(), "n8", ArtifactKind::Executable, &["core"]),
  ])
  .unwrap();
  let fake = FakeRunner::new();

  let report = execute(
    &graph,
    context(temp.path()),
    runner(&fake),
    &ExecuteOptions::default(),
    &CancelFlag::new(),
  )
  .await;

  let Some(StageOutcome::Failed(err)) = report.outcome("core") else {
    panic!("core should fail");
  };
  assert!(matches!(err, ExecuteError::MissingOutput { artifact, .. } if *artifact == ArtifactId::from("core")));
  assert_eq!(err.kind(), ErrorKind::ToolInvocation);
  assert!(matches!(report.outcome("n8"), Some(StageOutcome::Skipped(_))));
}

#[tokio::test]
async fn cancel_during_a_stage_fails_it_and_skips_the_rest() {
  let temp = TempDir::new().unwrap();
  let cancel = CancelFlag::new();
  let graph = ArtifactGraph::new(vec![
    artifact_with(
      temp.path(),
      "core",
      ArtifactKind::StaticArchive,
      &[],
      InterruptedPlanner { cancel: cancel.clone() },
    ),
    artifact(temp.path(), "n8", ArtifactKind::Executable, &["core"]),
    artifact(temp.path(), "stdlib", ArtifactKind::SharedLibrary, &["core"]),
  ])
  .unwrap();
  let fake = FakeRunner::new();
  let ctx = context(temp.path());
  let scratch = ctx.layout.temp.join("core.scratch");

  let report = execute(&graph, ctx, runner(&fake), &ExecuteOptions::default(), &cancel).await;

  assert!(report.cancelled);
  assert!(matches!(report.outcome("core"), Some(StageOutcome::Failed(ExecuteError::Cancelled))));
  for id in ["n8", "stdlib"] {
    assert!(matches!(
      report.outcome(id),
      Some(StageOutcome::Skipped(SkipReason::Cancelled))
    ));
  }
  assert!(fake.calls().is_empty());
  assert_eq!(report.cleaned, vec![scratch.clone()]);
  assert!(!scratch.exists());
  assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn parallel_siblings_keep_their_transient_files_apart() {
  let temp = TempDir::new().unwrap();
  let siblings = ["core", "uninstaller", "resources"];
  let graph = ArtifactGraph::new(
    siblings
      .iter()
      .map(|id| artifact_with(temp.path(), id, ArtifactKind::StaticArchive, &[], PerStageScratchPlanner))
      .collect(),
  )
  .unwrap();
  assert_eq!(graph.waves().len(), 1);
  let fake = FakeRunner::new();
  let ctx = context(temp.path());
  let temp_dir = ctx.layout.temp.clone();

  let report = execute(&graph, ctx, runner(&fake), &ExecuteOptions { jobs: 3 }, &CancelFlag::new()).await;

  assert!(report.is_success(), "{:?}", report.failed().collect::<Vec<_>>());
  let mut cleaned = report.cleaned.clone();
  cleaned.sort();
  cleaned.dedup();
  assert_eq!(cleaned.len(), siblings.len());
  for id in siblings {
    let scratch = temp_dir.join(format!("{}.scratch", id));
    assert!(cleaned.contains(&scratch), "{} missing from cleanup", scratch.display());
    assert!(!scratch.exists());
    assert!(temp.path().join("out").join(id).is_file());
  }
  assert_eq!(fake.calls().len(), siblings.len());
}
