//! Shared helpers: a recording process runner and a synthetic N8 tree.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use n8forge_lib::execute::{Invocation, ToolError, ToolOutput, ToolRunner};
use n8forge_lib::platform::{Arch, BuildTarget, Os, Variant};

/// Records every invocation and fakes the outputs real tools would write.
///
/// Outputs are the argument after `-o`, the archive of `ar rcs` and the
/// last argument of `dpkg-deb`.
#[derive(Default)]
pub struct FakeRunner {
  calls: Mutex<Vec<Invocation>>,
  fail_on: Option<String>,
}

impl FakeRunner {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Fail every invocation whose command line contains `needle`.
  pub fn failing_on(needle: &str) -> Arc<Self> {
    Arc::new(Self {
      fail_on: Some(needle.to_string()),
      ..Self::default()
    })
  }

  pub fn calls(&self) -> Vec<Invocation> {
    self.calls.lock().unwrap().clone()
  }

  pub fn programs(&self) -> Vec<String> {
    self.calls().into_iter().map(|c| c.program).collect()
  }

  /// True when any recorded command line contains `needle`.
  pub fn ran(&self, needle: &str) -> bool {
    self.calls().iter().any(|c| c.to_string().contains(needle))
  }

  fn outputs(invocation: &Invocation) -> Vec<PathBuf> {
    let args = &invocation.args;
    let mut outputs: Vec<PathBuf> = args
      .windows(2)
      .filter(|pair| pair[0] == "-o")
      .map(|pair| PathBuf::from(&pair[1]))
      .collect();
    if args.first().map(String::as_str) == Some("rcs") {
      outputs.extend(args.get(1).map(PathBuf::from));
    }
    if invocation.program == "dpkg-deb" {
      outputs.extend(args.last().map(PathBuf::from));
    }
    outputs
  }
}

impl ToolRunner for FakeRunner {
  fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
    self.calls.lock().unwrap().push(invocation.clone());

    if let Some(needle) = &self.fail_on {
      if invocation.to_string().contains(needle.as_str()) {
        return Err(ToolError::Failed {
          program: invocation.program.clone(),
          code: Some(1),
          stderr: format!("error: simulated failure in {}", needle),
        });
      }
    }

    for output in Self::outputs(invocation) {
      if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).unwrap();
      }
      std::fs::write(&output, invocation.program.as_bytes()).unwrap();
    }
    Ok(ToolOutput::default())
  }
}

pub fn write_file(root: &Path, relative: &str, content: &[u8]) {
  let path = root.join(relative);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, content).unwrap();
}

/// A project with interpreter, stdlib, vendor and module sources.
pub fn n8_project(root: &Path) {
  write_file(root, "src/N8.cpp", b"int main() {}\n");
  write_file(root, "src/core/runtime.cpp", b"\n");
  write_file(root, "std/n8std/io.cc", b"\n");
  write_file(root, "lib/QuickDigest5/src/quickdigest5.cpp", b"\n");
  write_file(root, "lib/SHA/src/SHA.cpp", b"\n");
  write_file(root, "modules/core@1.0.0/src/io.n8", b"use io;\n");
}

pub fn linux() -> BuildTarget {
  BuildTarget::new(Os::Linux, Arch::X86_64, Variant::Standard)
}

pub fn windows() -> BuildTarget {
  BuildTarget::new(Os::Windows, Arch::X86_64, Variant::Standard)
}
