//! Implementation of the `n8forge build` command.
//!
//! Runs the full pipeline for the host and prints one line per stage.
//! Ctrl-C stops dispatching new stages; transient files are still removed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use n8forge_lib::execute::{BuildReport, CancelFlag, StageOutcome, SystemRunner};
use n8forge_lib::pipeline::{BuildRequest, HostSetup, run};
use n8forge_lib::probe::host_source;

use crate::output::{
  format_duration, print_artifact_output, print_error, print_info, print_pruned, print_stat, print_success,
  print_warning,
};
use crate::{DirectiveArgs, GlobalArgs};

/// Returns the process exit code.
pub fn cmd_build(
  global: &GlobalArgs,
  directives: DirectiveArgs,
  jobs: usize,
  submodules: bool,
  install_prereqs: bool,
  msys2: Option<PathBuf>,
) -> Result<i32> {
  let request = BuildRequest {
    project_dir: global.project_dir.clone(),
    config_path: global.config.clone(),
    target: None,
    directives: directives.into(),
    jobs,
    host_setup: HostSetup {
      submodules,
      install_prereqs,
    },
    msys2_override: msys2,
    host_machine: None,
  };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(async {
    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupt received, finishing running stages");
        on_signal.cancel();
      }
    });

    let probe = host_source();
    run(request, probe.as_ref(), Arc::new(SystemRunner), cancel).await
  });

  let report = match report {
    Ok(report) => report,
    Err(e) => {
      let kind = e.kind();
      return Err(anyhow::Error::new(e).context(format!("{} error", kind)));
    }
  };

  print_report(&report);
  Ok(report.exit_code())
}

fn print_report(report: &BuildReport) {
  println!();
  print_info(&format!("Target: {}", report.target));

  for stage in &report.stages {
    match &stage.outcome {
      StageOutcome::Succeeded { outputs, duration } => {
        print_success(&format!("{} ({})", stage.id, format_duration(*duration)));
        for output in outputs {
          print_artifact_output(&output.path, output.size, &output.sha256.0);
        }
      }
      StageOutcome::Failed(e) => print_error(&format!("{}: {} error: {}", stage.id, e.kind(), e)),
      StageOutcome::Skipped(reason) => print_warning(&format!("{} skipped: {}", stage.id, reason)),
    }
  }

  for pruned in &report.pruned {
    print_pruned(&pruned.id, pruned.directive);
  }

  println!();
  if report.cancelled {
    print_warning("Build cancelled");
  } else if report.is_success() {
    print_success("Build complete!");
  } else {
    print_error("Build failed");
  }
  print_stat("Built", &report.succeeded().count().to_string());
  print_stat("Failed", &report.failed().count().to_string());
  print_stat("Skipped", &(report.skipped().count() + report.pruned.len()).to_string());
  print_stat("Cleaned", &report.cleaned.len().to_string());
  print_stat("Duration", &format_duration(report.duration));
}
