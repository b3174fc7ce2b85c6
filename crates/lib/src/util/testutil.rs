//! Test helpers for n8forge-lib unit tests.

use std::path::Path;
use std::sync::Arc;

use crate::artifact::Artifact;
use crate::execute::{BuildContext, ExecuteError, StagePlan, StagePlanner, TransientFiles};

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &[u8]) {
  let path = root.join(relative);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, content).unwrap();
}

/// Lay out a minimal N8 source tree under `root`.
pub fn n8_source_tree(root: &Path) {
  write_file(root, "src/N8.cpp", b"int main() { return 0; }\n");
  write_file(root, "src/core/runtime.cpp", b"\n");
  write_file(root, "src/parser/parser.cpp", b"\n");
  write_file(root, "std/n8std/io.cc", b"\n");
  write_file(root, "std/n8std/math.cc", b"\n");
  write_file(root, "lib/QuickDigest5/src/quickdigest5.cpp", b"\n");
  write_file(root, "lib/MyShell/src/myshell.cpp", b"\n");
  write_file(root, "lib/SHA/src/SHA.cpp", b"\n");
  write_file(root, "lib/SHA/src/example.cpp", b"\n");
  write_file(root, "modules/core@1.0.0/src/io.n8", b"use io;\n");
  write_file(root, "modules/core@1.0.0/config.sconf", b"name = core\n");
}

/// Planner with no steps, for graph tests that never execute.
#[derive(Debug)]
pub struct NoopPlanner;

impl StagePlanner for NoopPlanner {
  fn prepare(&self, _: &Artifact, _: &BuildContext, _: &TransientFiles) -> Result<StagePlan, ExecuteError> {
    Ok(StagePlan::default())
  }
}

pub fn noop_planner() -> Arc<dyn StagePlanner> {
  Arc::new(NoopPlanner)
}
