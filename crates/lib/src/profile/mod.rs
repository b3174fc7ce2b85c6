//! Toolchain profile selection.
//!
//! A [`ToolchainProfile`] is the single place that knows which compiler,
//! flags and system libraries a [`BuildTarget`] needs. Selection is a pure
//! table lookup; the only input besides the target is the feature set the
//! probe confirmed for the host.

mod table;

use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::platform::{Arch, BuildTarget, Os, Variant};
use crate::probe::{FeatureSet, variant_exclusions};

use table::{CLANG_WARNINGS, GCC_WARNINGS, HOMEBREW_CLANG, TUNING, owned};

#[derive(Debug, Error)]
pub enum ProfileError {
  #[error("unsupported build target: {target}")]
  Unsupported { target: BuildTarget },

  #[error("no accelerator toolchain for {target}")]
  AcceleratorUnavailable { target: BuildTarget },
}

/// Resolved compiler, flags and libraries for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainProfile {
  pub target: BuildTarget,
  pub compiler: String,
  pub archiver: String,
  /// CUDA compiler, when the target supports the accelerated build.
  pub accelerator: Option<String>,
  /// Optimisation, language standard and defines.
  pub base_flags: Vec<String>,
  /// Strict warnings (`-Werror` included). Only the core archive and the
  /// executables are held to them; the stdlib is not.
  pub warning_flags: Vec<String>,
  /// `-m…` / `-march=…` flags for features the host confirmed.
  pub feature_flags: Vec<String>,
  pub tuning_flags: Vec<String>,
  /// Runtime linkage flags for final executables.
  pub link_flags: Vec<String>,
  pub shared_flags: Vec<String>,
  /// Objects going into the core archive are position independent.
  pub pic: bool,
  pub libraries: Vec<String>,
  pub shared_ext: String,
  pub exe_suffix: String,
  pub features: FeatureSet,
}

impl ToolchainProfile {
  /// Look up the profile row for `target`.
  ///
  /// `features` is filtered by the variant's exclusions before it is
  /// rendered into flags, so a feature reaches the command line only when
  /// the probe confirmed it and the variant allows it.
  pub fn select(target: BuildTarget, features: &FeatureSet) -> Result<Self, ProfileError> {
    let unsupported = || ProfileError::Unsupported { target };

    let features = if features.arch() == target.arch {
      features.without(variant_exclusions(target.variant))
    } else {
      debug!(target = %target, probed = %features.arch(), "probed features are for another architecture");
      FeatureSet::empty(target.arch)
    };

    let profile = match (target.os, target.arch, target.variant) {
      (Os::Windows, Arch::X86 | Arch::X86_64, Variant::Standard) => Self {
        target,
        compiler: "g++".to_string(),
        archiver: "ar".to_string(),
        accelerator: (target.arch == Arch::X86_64).then(|| "nvcc".to_string()),
        base_flags: gcc_base(&["-pipe", "-Ofast", "-s"], "c++17", &[]),
        warning_flags: gcc_warnings("-Wunsafe-loop-optimizations"),
        feature_flags: features.compiler_flags(),
        tuning_flags: tuning(target.arch),
        link_flags: owned(&["-static", "-static-libgcc", "-static-libstdc++"]),
        shared_flags: owned(&["-static", "-static-libgcc", "-shared"]),
        pic: false,
        libraries: owned(&["-lglfw3", "-lglfw3dll"]),
        shared_ext: "dll".to_string(),
        exe_suffix: ".exe".to_string(),
        features,
      },
      (Os::Linux, _, Variant::Standard) => Self {
        target,
        compiler: "g++".to_string(),
        archiver: "ar".to_string(),
        accelerator: matches!(target.arch, Arch::X86_64 | Arch::Aarch64).then(|| "nvcc".to_string()),
        base_flags: gcc_base(&["-pipe", "-O3", "-s"], "c++20", &[]),
        warning_flags: gcc_warnings("-Wunsafe-loop-optimizations"),
        feature_flags: features.compiler_flags(),
        tuning_flags: tuning(target.arch),
        link_flags: Vec::new(),
        shared_flags: owned(&["-fPIC", "-shared"]),
        pic: true,
        libraries: owned(&["-lglfw", "-lGL"]),
        shared_ext: "so".to_string(),
        exe_suffix: String::new(),
        features,
      },
      (Os::Linux, _, Variant::Termux) => Self {
        target,
        compiler: "g++".to_string(),
        archiver: "ar".to_string(),
        accelerator: None,
        base_flags: gcc_base(&["-pipe", "-O3", "-s"], "c++20", &["-D__TERMUX__"]),
        warning_flags: gcc_warnings("-Wno-header-guard"),
        feature_flags: features.compiler_flags(),
        tuning_flags: tuning(target.arch),
        link_flags: Vec::new(),
        shared_flags: owned(&["-fPIC", "-shared"]),
        pic: true,
        libraries: Vec::new(),
        shared_ext: "so".to_string(),
        exe_suffix: String::new(),
        features,
      },
      (Os::MacOs, Arch::X86_64 | Arch::Aarch64, Variant::Standard) => Self {
        target,
        compiler: HOMEBREW_CLANG.to_string(),
        archiver: "ar".to_string(),
        accelerator: None,
        base_flags: owned(&["-pipe", "-O3", "-flto=auto", "-std=c++17", "-fopenmp"]),
        warning_flags: owned(CLANG_WARNINGS),
        feature_flags: features.compiler_flags(),
        tuning_flags: tuning(target.arch),
        link_flags: Vec::new(),
        shared_flags: owned(&["-fPIC", "-shared"]),
        pic: true,
        libraries: Vec::new(),
        shared_ext: "dylib".to_string(),
        exe_suffix: String::new(),
        features,
      },
      _ => return Err(unsupported()),
    };

    debug!(
      target = %target,
      compiler = %profile.compiler,
      features = profile.feature_flags.len(),
      "selected toolchain profile"
    );
    Ok(profile)
  }

  /// Flags for the interpreter sources: base, warnings, features, tuning.
  pub fn compile_flags(&self) -> Vec<String> {
    let mut flags = self.base_flags.clone();
    flags.extend(self.warning_flags.iter().cloned());
    flags.extend(self.feature_flags.iter().cloned());
    flags.extend(self.tuning_flags.iter().cloned());
    flags
  }

  /// Flags for the stdlib sources. Same as [`Self::compile_flags`] minus
  /// the warnings, which the `.cc` modules were never written against.
  pub fn library_flags(&self) -> Vec<String> {
    let mut flags = self.base_flags.clone();
    flags.extend(self.feature_flags.iter().cloned());
    flags.extend(self.tuning_flags.iter().cloned());
    flags
  }

  /// [`Self::compile_flags`] plus `-fPIC` where archived objects end up in
  /// the shared stdlib.
  pub fn object_flags(&self) -> Vec<String> {
    let mut flags = self.compile_flags();
    if self.pic {
      flags.push("-fPIC".to_string());
    }
    flags
  }

  /// Link every member of `archive`, not just the referenced ones.
  pub fn whole_archive(&self, archive: &Path) -> Vec<String> {
    let archive = archive.display().to_string();
    match self.target.os {
      Os::MacOs => vec![format!("-Wl,-force_load,{}", archive)],
      Os::Linux | Os::Windows => vec!["-Wl,--whole-archive".to_string(), archive, "-Wl,--no-whole-archive".to_string()],
    }
  }

  pub fn executable_name(&self, base: &str) -> String {
    format!("{}{}", base, self.exe_suffix)
  }

  pub fn shared_library_name(&self, base: &str) -> String {
    format!("{}.{}", base, self.shared_ext)
  }

  /// The accelerator compiler, or an error when the target has none.
  pub fn require_accelerator(&self) -> Result<&str, ProfileError> {
    self
      .accelerator
      .as_deref()
      .ok_or(ProfileError::AcceleratorUnavailable { target: self.target })
  }

  /// Flags handed to the accelerator compiler. Everything is compiled as CUDA.
  pub fn accelerator_flags(&self) -> Vec<String> {
    owned(&["-x", "cu", "-std=c++17", "-O3"])
  }
}

fn gcc_base(optimization: &[&str], standard: &str, defines: &[&str]) -> Vec<String> {
  let mut flags = owned(optimization);
  flags.push(format!("-std={}", standard));
  flags.push("-fopenmp".to_string());
  flags.extend(owned(defines));
  flags
}

fn gcc_warnings(variant_warning: &str) -> Vec<String> {
  let mut flags = owned(GCC_WARNINGS);
  flags.push(variant_warning.to_string());
  flags
}

fn tuning(arch: Arch) -> Vec<String> {
  let mut flags = Vec::new();
  if arch.is_x86_family() {
    flags.push("-mfpmath=sse".to_string());
  }
  flags.extend(owned(TUNING));
  flags
}
