//! Build execution.
//!
//! This module drives an [`ArtifactGraph`] to completion. It handles:
//! - Wave-by-wave dispatch in dependency order
//! - Parallel execution of independent stages, bounded by `jobs`
//! - Failure isolation: a failed stage only skips its dependents
//! - Cancellation and guaranteed removal of transient files

pub mod cleanup;
pub mod context;
pub mod runner;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::artifact::{Artifact, ArtifactGraph, ArtifactId};

pub use cleanup::{CancelFlag, CleanupGuard, TransientFiles};
pub use context::BuildContext;
pub use runner::{Invocation, SystemRunner, ToolError, ToolOutput, ToolRunner};
pub use types::{
  ArtifactState, BuildReport, ErrorKind, ExecuteError, ExecuteOptions, OutputRecord, SkipReason, StageOutcome,
  StagePlan, StagePlanner, StageReport,
};

/// Per-run bookkeeping of artifact states and outcomes.
struct Tracker {
  states: HashMap<ArtifactId, ArtifactState>,
  stages: Vec<StageReport>,
  index: HashMap<ArtifactId, usize>,
}

impl Tracker {
  fn new(graph: &ArtifactGraph) -> Self {
    Self {
      states: graph.iter().map(|a| (a.id.clone(), ArtifactState::Pending)).collect(),
      stages: Vec::with_capacity(graph.len()),
      index: HashMap::new(),
    }
  }

  fn transition(&mut self, id: &ArtifactId, next: ArtifactState) {
    let current = self.states.get(id).copied().unwrap_or(ArtifactState::Pending);
    debug_assert!(
      current.can_transition_to(next),
      "invalid transition for {}: {} -> {}",
      id,
      current,
      next
    );
    debug!(stage = %id, from = %current, to = %next, "stage state changed");
    self.states.insert(id.clone(), next);
  }

  fn finish(&mut self, artifact: &Artifact, outcome: StageOutcome) {
    self.transition(&artifact.id, outcome.state());
    self.index.insert(artifact.id.clone(), self.stages.len());
    self.stages.push(StageReport {
      id: artifact.id.clone(),
      kind: artifact.kind,
      outcome,
    });
  }

  fn outcome(&self, id: &ArtifactId) -> Option<&StageOutcome> {
    self.index.get(id).map(|&i| &self.stages[i].outcome)
  }

  /// The first dependency that keeps `artifact` from running.
  fn blocked_by(&self, graph: &ArtifactGraph, artifact: &Artifact) -> Option<SkipReason> {
    for dep in graph.dependencies(&artifact.id) {
      match self.outcome(&dep) {
        Some(StageOutcome::Failed(_)) => return Some(SkipReason::DependencyFailed(dep)),
        Some(outcome) if !outcome.satisfies_dependents() => return Some(SkipReason::DependencySkipped(dep)),
        _ => {}
      }
    }
    None
  }
}

/// Execute every artifact in `graph`.
///
/// Stages run on the blocking pool since each one waits on external
/// processes. Transient files registered by any stage are removed before
/// this returns, whatever the outcome.
pub async fn execute(
  graph: &ArtifactGraph,
  ctx: BuildContext,
  runner: Arc<dyn ToolRunner>,
  options: &ExecuteOptions,
  cancel: &CancelFlag,
) -> BuildReport {
  let started = Instant::now();
  let waves = graph.waves();
  info!(
    target = %ctx.target,
    artifacts = graph.len(),
    waves = waves.len(),
    jobs = options.jobs,
    "starting build execution"
  );

  let guard = CleanupGuard::new(TransientFiles::new());
  let semaphore = Arc::new(Semaphore::new(options.jobs.max(1)));
  let mut tracker = Tracker::new(graph);
  let mut ctx = ctx;

  for (wave_idx, wave) in waves.iter().enumerate() {
    debug!(wave = wave_idx, artifacts = wave.len(), "executing wave");

    let mut ready = Vec::new();
    for id in wave {
      let Some(artifact) = graph.get(id) else {
        continue;
      };

      if cancel.is_cancelled() {
        warn!(stage = %id, "skipping stage, build cancelled");
        tracker.finish(artifact, StageOutcome::Skipped(SkipReason::Cancelled));
        continue;
      }

      if let Some(reason) = tracker.blocked_by(graph, artifact) {
        warn!(stage = %id, reason = %reason, "skipping stage");
        tracker.finish(artifact, StageOutcome::Skipped(reason));
        continue;
      }

      if let Some(directive) = artifact.reused_by {
        info!(stage = %id, directive = %directive, output = ?artifact.output, "reusing previous output");
        ctx = ctx.with_completed(id.clone(), vec![artifact.output.clone()]);
        tracker.finish(artifact, StageOutcome::Skipped(SkipReason::Directive(directive)));
        continue;
      }

      tracker.transition(id, ArtifactState::Running);
      ready.push(artifact.clone());
    }

    if ready.is_empty() {
      continue;
    }

    let results = execute_wave(&ready, &ctx, runner.clone(), guard.files(), cancel, semaphore.clone()).await;

    for (artifact, outcome) in ready.iter().zip(results) {
      match &outcome {
        StageOutcome::Succeeded { outputs, duration } => {
          info!(stage = %artifact.id, duration_ms = duration.as_millis() as u64, "stage succeeded");
          ctx = ctx.with_completed(artifact.id.clone(), outputs.iter().map(|o| o.path.clone()).collect());
        }
        StageOutcome::Failed(e) => {
          error!(stage = %artifact.id, kind = %e.kind(), error = %e, "stage failed");
        }
        StageOutcome::Skipped(reason) => {
          warn!(stage = %artifact.id, reason = %reason, "stage skipped");
        }
      }
      tracker.finish(artifact, outcome);
    }

    ctx = ctx.with_transient(guard.files().snapshot());
  }

  let cleaned = guard.cleanup();
  let report = BuildReport {
    target: ctx.target,
    stages: tracker.stages,
    pruned: Vec::new(),
    cleaned,
    cancelled: cancel.is_cancelled(),
    duration: started.elapsed(),
  };

  info!(
    succeeded = report.succeeded().count(),
    failed = report.failed().count(),
    skipped = report.skipped().count(),
    cleaned = report.cleaned.len(),
    cancelled = report.cancelled,
    "build execution complete"
  );

  report
}

/// Run one wave, returning outcomes in the order of `artifacts`.
async fn execute_wave(
  artifacts: &[Artifact],
  ctx: &BuildContext,
  runner: Arc<dyn ToolRunner>,
  transient: &TransientFiles,
  cancel: &CancelFlag,
  semaphore: Arc<Semaphore>,
) -> Vec<StageOutcome> {
  let mut join_set = JoinSet::new();

  for (idx, artifact) in artifacts.iter().enumerate() {
    let artifact = artifact.clone();
    let ctx = ctx.clone();
    let runner = runner.clone();
    let transient = transient.clone();
    let cancel = cancel.clone();
    let semaphore = semaphore.clone();

    join_set.spawn(async move {
      // The semaphore is never closed.
      let _permit = semaphore.acquire_owned().await.ok();
      info!(stage = %artifact.id, kind = %artifact.kind, "stage running");

      let id = artifact.id.clone();
      let outcome =
        tokio::task::spawn_blocking(move || run_stage(&artifact, &ctx, runner.as_ref(), &transient, &cancel)).await;

      let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => StageOutcome::Failed(ExecuteError::Panicked {
          artifact: id,
          message: e.to_string(),
        }),
      };
      (idx, outcome)
    });
  }

  let mut results: Vec<Option<StageOutcome>> = artifacts.iter().map(|_| None).collect();
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((idx, outcome)) => results[idx] = Some(outcome),
      Err(e) => error!(error = %e, "stage task panicked"),
    }
  }

  artifacts
    .iter()
    .zip(results)
    .map(|(artifact, outcome)| {
      outcome.unwrap_or_else(|| {
        StageOutcome::Failed(ExecuteError::Panicked {
          artifact: artifact.id.clone(),
          message: "stage task did not complete".to_string(),
        })
      })
    })
    .collect()
}

/// Plan and run one artifact's steps, then verify its outputs.
fn run_stage(
  artifact: &Artifact,
  ctx: &BuildContext,
  runner: &dyn ToolRunner,
  transient: &TransientFiles,
  cancel: &CancelFlag,
) -> StageOutcome {
  let started = Instant::now();
  match build_artifact(artifact, ctx, runner, transient, cancel) {
    Ok(outputs) => StageOutcome::Succeeded {
      outputs,
      duration: started.elapsed(),
    },
    Err(e) => StageOutcome::Failed(e),
  }
}

fn build_artifact(
  artifact: &Artifact,
  ctx: &BuildContext,
  runner: &dyn ToolRunner,
  transient: &TransientFiles,
  cancel: &CancelFlag,
) -> Result<Vec<OutputRecord>, ExecuteError> {
  if cancel.is_cancelled() {
    return Err(ExecuteError::Cancelled);
  }

  let plan = artifact.planner.prepare(artifact, ctx, transient)?;
  let total = plan.steps.len();

  for (idx, step) in plan.steps.iter().enumerate() {
    if cancel.is_cancelled() {
      return Err(ExecuteError::Cancelled);
    }
    debug!(stage = %artifact.id, step = idx + 1, total, program = %step.program, "running step");
    runner.run(step)?;
  }

  let expected = if plan.outputs.is_empty() {
    vec![artifact.output.clone()]
  } else {
    plan.outputs
  };

  expected
    .iter()
    .map(|path| {
      if !path.exists() {
        return Err(ExecuteError::MissingOutput {
          artifact: artifact.id.clone(),
          path: path.clone(),
        });
      }
      Ok(OutputRecord::from_path(path)?)
    })
    .collect()
}
