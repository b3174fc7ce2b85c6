use std::fmt;

use serde::{Deserialize, Serialize};

/// Operating systems the toolchain can be built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
  Linux,
  #[serde(rename = "darwin")]
  MacOs,
  Windows,
}

impl Os {
  /// Detect the current operating system at runtime.
  ///
  /// Android hosts (Termux) report as Linux; the constrained runtime is
  /// expressed through [`super::Variant`] instead.
  pub fn current() -> Option<Self> {
    Self::parse(std::env::consts::OS)
  }

  /// Parse an OS identifier as reported by `std::env::consts::OS` or as
  /// written on the command line.
  pub fn parse(name: &str) -> Option<Self> {
    match name.to_ascii_lowercase().as_str() {
      "linux" | "android" => Some(Self::Linux),
      "macos" | "darwin" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
      Self::Windows => "windows",
    }
  }

  /// Suffix appended to executables produced for this OS.
  pub fn exe_suffix(&self) -> &'static str {
    match self {
      Self::Windows => ".exe",
      Self::Linux | Self::MacOs => "",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
