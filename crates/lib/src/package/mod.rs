//! Debian package assembly.
//!
//! The package is built from a staging tree that mirrors the installed
//! filesystem. This module owns the manifest and control file; hook
//! scripts live in [`hooks`] and the tree itself in [`staging`].

pub mod hooks;
pub mod staging;

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::platform::Arch;

pub use hooks::HookScripts;
pub use staging::{StagedPackage, archive_invocation, stage};

#[derive(Debug, Error)]
pub enum PackageError {
  #[error("install tree {0} does not exist")]
  MissingInstallTree(PathBuf),

  #[error("failed to {action} {path}: {source}")]
  Io {
    action: &'static str,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Debian architecture names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageArch {
  Amd64,
  Arm64,
  Armhf,
  I386,
  /// Fallback for machines not in the table.
  All,
}

impl PackageArch {
  /// Map a `uname -m` machine string.
  pub fn from_machine(machine: &str) -> Self {
    match machine {
      "x86_64" => Self::Amd64,
      "aarch64" => Self::Arm64,
      "armv7l" => Self::Armhf,
      "i686" | "i386" => Self::I386,
      _ => Self::All,
    }
  }

  pub fn from_arch(arch: Arch) -> Self {
    match arch {
      Arch::X86_64 => Self::Amd64,
      Arch::Aarch64 => Self::Arm64,
      Arch::Arm => Self::Armhf,
      Arch::X86 => Self::I386,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Amd64 => "amd64",
      Self::Arm64 => "arm64",
      Self::Armhf => "armhf",
      Self::I386 => "i386",
      Self::All => "all",
    }
  }
}

impl fmt::Display for PackageArch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Everything written into `DEBIAN/` plus the installed file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
  pub name: String,
  pub version: String,
  pub architecture: PackageArch,
  pub maintainer: String,
  pub description: String,
  pub priority: String,
  pub section: String,
  /// Files under the staged install prefix, relative to the staging root.
  pub files: Vec<PathBuf>,
  pub hooks: HookScripts,
}

impl PackageManifest {
  pub fn from_config(config: &Config, architecture: PackageArch) -> Self {
    Self {
      name: config.project.name.clone(),
      version: config.project.version.clone(),
      architecture,
      maintainer: config.project.maintainer.clone(),
      description: config.project.description.clone(),
      priority: config.package.priority.clone(),
      section: config.package.section.clone(),
      files: Vec::new(),
      hooks: HookScripts::render(config),
    }
  }

  /// `DEBIAN/control` contents. Key order is fixed.
  pub fn control(&self) -> String {
    format!(
      "Package: {}\nVersion: {}\nArchitecture: {}\nMaintainer: {}\nDescription: {}\nPriority: {}\nSection: {}\n",
      self.name, self.version, self.architecture, self.maintainer, self.description, self.priority, self.section
    )
  }

  /// `<name>_<version>_<arch>.deb`
  pub fn file_name(&self) -> String {
    format!("{}_{}_{}.deb", self.name, self.version, self.architecture)
  }
}
