//! Host platform detection.
//!
//! A [`BuildTarget`] is computed once per invocation and identifies which
//! toolchain profile, feature probe, and artifact set apply.

pub mod arch;
pub mod os;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::TERMUX_MARKER;

pub use arch::Arch;
pub use os::Os;

/// Errors raised while identifying the host.
#[derive(Debug, Error)]
pub enum PlatformError {
  #[error("unsupported operating system: {0}")]
  UnsupportedOs(String),

  #[error("unsupported architecture: {0}")]
  UnsupportedArch(String),

  #[error("unknown environment variant: {0}")]
  UnknownVariant(String),
}

/// Execution environment the toolchain is built for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
  #[default]
  Standard,
  /// Android userland provided by Termux.
  Termux,
}

impl Variant {
  /// Select the variant from the environment marker.
  pub fn from_env() -> Self {
    if std::env::var_os(TERMUX_MARKER).is_some() {
      Self::Termux
    } else {
      Self::Standard
    }
  }

  pub fn parse(name: &str) -> Result<Self, PlatformError> {
    match name.to_ascii_lowercase().as_str() {
      "standard" => Ok(Self::Standard),
      "termux" => Ok(Self::Termux),
      other => Err(PlatformError::UnknownVariant(other.to_string())),
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Standard => "standard",
      Self::Termux => "termux",
    }
  }
}

impl fmt::Display for Variant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// One build configuration: (OS, architecture, environment variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildTarget {
  pub os: Os,
  pub arch: Arch,
  pub variant: Variant,
}

impl BuildTarget {
  pub fn new(os: Os, arch: Arch, variant: Variant) -> Self {
    Self { os, arch, variant }
  }

  /// Detect the host target, reading the variant marker from the environment.
  pub fn current() -> Result<Self, PlatformError> {
    let os = Os::current().ok_or_else(|| PlatformError::UnsupportedOs(std::env::consts::OS.to_string()))?;
    let arch = Arch::current().ok_or_else(|| PlatformError::UnsupportedArch(std::env::consts::ARCH.to_string()))?;
    Ok(Self::new(os, arch, Variant::from_env()))
  }

  /// Returns the target triple string (e.g., "x86_64-linux-standard")
  pub fn triple(&self) -> String {
    format!("{}-{}-{}", self.arch, self.os, self.variant)
  }

  /// True when this target describes the machine we are running on.
  pub fn is_host(&self) -> bool {
    Os::current() == Some(self.os) && Arch::current() == Some(self.arch)
  }
}

impl fmt::Display for BuildTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

/// Machine string of the host, as `uname -m` prints it.
///
/// Read with the `uname` syscall; no process is spawned.
#[cfg(unix)]
pub fn host_machine() -> String {
  let uname = rustix::system::uname();
  let machine = uname.machine().to_string_lossy().trim().to_string();
  if machine.is_empty() {
    std::env::consts::ARCH.to_string()
  } else {
    machine
  }
}

/// Machine string of the host. Windows has no `uname`, so this is the
/// compile-time architecture name.
#[cfg(not(unix))]
pub fn host_machine() -> String {
  std::env::consts::ARCH.to_string()
}

#[cfg(test)]
mod tests {
  use serial_test::serial;

  use super::*;

  #[test]
  fn triple_format() {
    let target = BuildTarget::new(Os::Linux, Arch::Aarch64, Variant::Termux);
    assert_eq!(target.triple(), "aarch64-linux-termux");

    let target = BuildTarget::new(Os::Windows, Arch::X86_64, Variant::Standard);
    assert_eq!(target.to_string(), "x86_64-windows-standard");
  }

  #[test]
  #[serial]
  fn termux_marker_selects_variant() {
    temp_env::with_var(TERMUX_MARKER, Some("0.118.0"), || {
      assert_eq!(Variant::from_env(), Variant::Termux);
    });
    temp_env::with_var_unset(TERMUX_MARKER, || {
      assert_eq!(Variant::from_env(), Variant::Standard);
    });
  }

  #[test]
  fn unknown_variant_is_rejected() {
    assert!(matches!(Variant::parse("wasm"), Err(PlatformError::UnknownVariant(_))));
  }

  #[test]
  fn host_machine_is_not_empty() {
    assert!(!host_machine().is_empty());
  }
}
