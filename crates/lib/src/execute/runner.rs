//! External process invocation.
//!
//! Every collaborator (compilers, `ar`, `windres`, `nvcc`, `git`, `apt`,
//! `dpkg-deb`) is driven the same way: build an argument vector, run it,
//! interpret the exit status. Stages only ever see the [`ToolRunner`] trait
//! so tests can substitute a recording fake.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ToolError {
  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("{program} exited with code {code:?}: {stderr}")]
  Failed {
    program: String,
    code: Option<i32>,
    stderr: String,
  },
}

/// One process to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
  /// Working directory; inherits the caller's when unset.
  pub cwd: Option<PathBuf>,
}

impl Invocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }
}

impl fmt::Display for Invocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.program)?;
    for arg in &self.args {
      if arg.contains(' ') {
        write!(f, " \"{}\"", arg)?;
      } else {
        write!(f, " {}", arg)?;
      }
    }
    Ok(())
  }
}

/// Captured output of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
  pub stdout: String,
  pub stderr: String,
}

/// Runs external tools. Calls block until the process exits.
pub trait ToolRunner: Send + Sync {
  fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError>;
}

/// Runs tools as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
  fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
    info!(program = %invocation.program, "running tool");
    debug!(command = %invocation, "full command line");

    let mut command = Command::new(&invocation.program);
    command.args(&invocation.args);
    if let Some(cwd) = &invocation.cwd {
      command.current_dir(cwd);
    }

    let output = command.output().map_err(|source| ToolError::Spawn {
      program: invocation.program.clone(),
      source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
      if !stdout.is_empty() {
        debug!(stdout = %stdout, "tool stdout");
      }
      return Err(ToolError::Failed {
        program: invocation.program.clone(),
        code: output.status.code(),
        stderr,
      });
    }

    if !stderr.is_empty() {
      debug!(stderr = %stderr, "tool stderr");
    }
    Ok(ToolOutput { stdout, stderr })
  }
}
