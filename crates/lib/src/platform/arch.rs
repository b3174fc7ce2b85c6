use std::fmt;

use serde::{Deserialize, Serialize};

/// CPU architectures the toolchain can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
  X86,
  #[serde(rename = "x86_64")]
  X86_64,
  Arm,
  Aarch64,
}

impl Arch {
  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    Self::parse(std::env::consts::ARCH)
  }

  /// Parse an architecture name. Accepts Rust target names as well as the
  /// machine strings reported by `uname -m`.
  pub fn parse(name: &str) -> Option<Self> {
    match name.to_ascii_lowercase().as_str() {
      "x86" | "i386" | "i686" => Some(Self::X86),
      "x86_64" | "amd64" => Some(Self::X86_64),
      "arm" | "armv7l" | "armhf" => Some(Self::Arm),
      "aarch64" | "arm64" => Some(Self::Aarch64),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this architecture
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86 => "x86",
      Self::X86_64 => "x86_64",
      Self::Arm => "arm",
      Self::Aarch64 => "aarch64",
    }
  }

  /// True for the 32- and 64-bit x86 family.
  pub fn is_x86_family(&self) -> bool {
    matches!(self, Self::X86 | Self::X86_64)
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
