use anyhow::{Context, Result};

use n8forge_lib::pipeline::{Inspection, resolve};
use n8forge_lib::probe::host_source;

use super::target_from;
use crate::output::{print_json, print_stat, print_success};
use crate::{GlobalArgs, TargetArgs};

pub fn cmd_info(global: &GlobalArgs, target: TargetArgs, json: bool) -> Result<()> {
  let target = target_from(target)?;
  let probe = host_source();
  let resolved = resolve(&global.project_dir, global.config.as_deref(), target, probe.as_ref())
    .context("Failed to resolve build target")?;
  let inspection = Inspection::new(&resolved);

  if json {
    return print_json(&inspection);
  }

  let profile = &inspection.profile;
  print_success(&format!("n8forge v{}", env!("CARGO_PKG_VERSION")));
  print_stat("Target", &inspection.target.to_string());
  print_stat("Host", &inspection.host.to_string());
  print_stat("Compiler", &profile.compiler);
  print_stat("Archiver", &profile.archiver);
  print_stat("Accelerator", profile.accelerator.as_deref().unwrap_or("none"));
  print_stat("Flags", &profile.compile_flags().join(" "));
  print_stat("Stdlib flags", &profile.library_flags().join(" "));
  print_stat("Libraries", &profile.libraries.join(" "));
  let features = if inspection.features.is_empty() {
    "none".to_string()
  } else {
    inspection.features.join(" ")
  };
  print_stat("CPU features", &features);
  print_stat("Project", &resolved.project_dir.display().to_string());
  Ok(())
}
