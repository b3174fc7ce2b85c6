//! Implementation of the `n8forge plan` command.
//!
//! Resolves the target and prints the artifact waves a build would run.
//! No tool is invoked and nothing is written.

use anyhow::{Context, Result};

use n8forge_lib::pipeline::{preview, resolve};
use n8forge_lib::probe::host_source;

use super::target_from;
use crate::output::{planned_line, print_info, print_json, print_pruned, print_stat};
use crate::{DirectiveArgs, GlobalArgs, TargetArgs};

pub fn cmd_plan(global: &GlobalArgs, target: TargetArgs, directives: DirectiveArgs, json: bool) -> Result<()> {
  let target = target_from(target)?;
  let probe = host_source();
  let resolved = resolve(&global.project_dir, global.config.as_deref(), target, probe.as_ref())
    .context("Failed to resolve build target")?;
  let summary = preview(&resolved, directives.into()).context("Failed to plan build")?;

  if json {
    return print_json(&summary);
  }

  print_info(&format!("Target: {}", summary.target));
  for (idx, wave) in summary.waves.iter().enumerate() {
    println!();
    println!("Wave {}:", idx);
    for artifact in wave {
      println!(
        "{}",
        planned_line(&artifact.id, artifact.kind.as_str(), &artifact.output, artifact.reused_by)
      );
      if !artifact.deps.is_empty() {
        let deps: Vec<&str> = artifact.deps.iter().map(|d| d.as_str()).collect();
        println!("      after: {}", deps.join(", "));
      }
    }
  }

  if !summary.pruned.is_empty() {
    println!();
    println!("Pruned:");
    for pruned in &summary.pruned {
      print_pruned(&pruned.id, pruned.directive);
    }
  }

  println!();
  print_stat("Artifacts", &summary.artifact_count().to_string());
  print_stat("Waves", &summary.waves.len().to_string());
  Ok(())
}
