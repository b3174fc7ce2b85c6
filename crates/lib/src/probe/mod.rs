//! Host CPU feature probing.
//!
//! The probe asks a [`CpuFlagSource`] which capability flags the host
//! reports and maps the candidates it recognises onto compiler flags. A
//! feature is only ever emitted when the host confirmed it; if the host
//! cannot be introspected the result is empty and the build carries on
//! without extra flags.

mod source;

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::platform::{Arch, BuildTarget, Variant};

pub use source::{CpuFlagSource, HostFlags, ProcCpuInfo, StaticFlags, host_source};

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use source::CpuidSource;

/// Errors from CPU introspection. Never fatal: the probe degrades to an
/// empty feature set.
#[derive(Debug, Error)]
pub enum ProbeError {
  #[error("cpu introspection unavailable: {0}")]
  Unavailable(String),

  #[error("failed to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("no capability flags found in {0}")]
  NoFlags(String),
}

/// Instruction-set extensions the build knows how to enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuFeature {
  // x86 / amd64
  Abm,
  Adx,
  Aes,
  Avx,
  Avx2,
  Bmi,
  Clflushopt,
  Cx16,
  F16c,
  Fma,
  Fsgsbase,
  Fxsr,
  Mmx,
  Movbe,
  Rdrnd,
  Rdseed,
  Rtm,
  Sgx,
  Sse,
  Sse2,
  Sse3,
  Sse4,
  Sse4_1,
  Sse4_2,
  Vpclmulqdq,
  Xsave,
  Xsavec,
  Xsaveopt,
  // arm / aarch64
  Neon,
  Crc,
  Sha2,
  Fp16,
  DotProd,
  Lse,
}

/// Candidate list checked on x86 hosts.
pub const X86_CANDIDATES: &[CpuFeature] = &[
  CpuFeature::Abm,
  CpuFeature::Adx,
  CpuFeature::Aes,
  CpuFeature::Avx,
  CpuFeature::Avx2,
  CpuFeature::Bmi,
  CpuFeature::Clflushopt,
  CpuFeature::Cx16,
  CpuFeature::F16c,
  CpuFeature::Fma,
  CpuFeature::Fsgsbase,
  CpuFeature::Fxsr,
  CpuFeature::Mmx,
  CpuFeature::Movbe,
  CpuFeature::Rdrnd,
  CpuFeature::Rdseed,
  CpuFeature::Rtm,
  CpuFeature::Sgx,
  CpuFeature::Sse,
  CpuFeature::Sse2,
  CpuFeature::Sse3,
  CpuFeature::Sse4,
  CpuFeature::Sse4_1,
  CpuFeature::Sse4_2,
  CpuFeature::Vpclmulqdq,
  CpuFeature::Xsave,
  CpuFeature::Xsavec,
  CpuFeature::Xsaveopt,
];

/// Candidate list checked on 32-bit ARM hosts.
pub const ARM_CANDIDATES: &[CpuFeature] = &[CpuFeature::Neon];

/// Candidate list checked on aarch64 hosts.
pub const AARCH64_CANDIDATES: &[CpuFeature] = &[
  CpuFeature::Crc,
  CpuFeature::Aes,
  CpuFeature::Sha2,
  CpuFeature::Fp16,
  CpuFeature::DotProd,
  CpuFeature::Lse,
];

impl CpuFeature {
  /// Canonical lowercase name, as used in `-m<name>` flags.
  pub fn name(&self) -> &'static str {
    match self {
      Self::Abm => "abm",
      Self::Adx => "adx",
      Self::Aes => "aes",
      Self::Avx => "avx",
      Self::Avx2 => "avx2",
      Self::Bmi => "bmi",
      Self::Clflushopt => "clflushopt",
      Self::Cx16 => "cx16",
      Self::F16c => "f16c",
      Self::Fma => "fma",
      Self::Fsgsbase => "fsgsbase",
      Self::Fxsr => "fxsr",
      Self::Mmx => "mmx",
      Self::Movbe => "movbe",
      Self::Rdrnd => "rdrnd",
      Self::Rdseed => "rdseed",
      Self::Rtm => "rtm",
      Self::Sgx => "sgx",
      Self::Sse => "sse",
      Self::Sse2 => "sse2",
      Self::Sse3 => "sse3",
      Self::Sse4 => "sse4",
      Self::Sse4_1 => "sse4_1",
      Self::Sse4_2 => "sse4_2",
      Self::Vpclmulqdq => "vpclmulqdq",
      Self::Xsave => "xsave",
      Self::Xsavec => "xsavec",
      Self::Xsaveopt => "xsaveopt",
      Self::Neon => "neon",
      Self::Crc => "crc",
      Self::Sha2 => "sha2",
      Self::Fp16 => "fp16",
      Self::DotProd => "dotprod",
      Self::Lse => "lse",
    }
  }

  /// Flag names a host may report for this feature. Linux spells a few
  /// of them differently from the compiler (`pni` for SSE3, `asimddp` for
  /// the dot-product extension).
  pub fn host_names(&self) -> &'static [&'static str] {
    match self {
      Self::Abm => &["abm", "lzcnt"],
      Self::Adx => &["adx"],
      Self::Aes => &["aes"],
      Self::Avx => &["avx"],
      Self::Avx2 => &["avx2"],
      Self::Bmi => &["bmi", "bmi1"],
      Self::Clflushopt => &["clflushopt"],
      Self::Cx16 => &["cx16"],
      Self::F16c => &["f16c"],
      Self::Fma => &["fma"],
      Self::Fsgsbase => &["fsgsbase"],
      Self::Fxsr => &["fxsr"],
      Self::Mmx => &["mmx"],
      Self::Movbe => &["movbe"],
      Self::Rdrnd => &["rdrnd", "rdrand"],
      Self::Rdseed => &["rdseed"],
      Self::Rtm => &["rtm"],
      Self::Sgx => &["sgx"],
      Self::Sse => &["sse"],
      Self::Sse2 => &["sse2"],
      Self::Sse3 => &["sse3", "pni"],
      Self::Sse4 => &["sse4"],
      Self::Sse4_1 => &["sse4_1"],
      Self::Sse4_2 => &["sse4_2"],
      Self::Vpclmulqdq => &["vpclmulqdq"],
      Self::Xsave => &["xsave"],
      Self::Xsavec => &["xsavec"],
      Self::Xsaveopt => &["xsaveopt"],
      Self::Neon => &["neon", "asimd"],
      Self::Crc => &["crc32"],
      Self::Sha2 => &["sha2"],
      Self::Fp16 => &["fphp"],
      Self::DotProd => &["asimddp"],
      Self::Lse => &["atomics"],
    }
  }

  /// True when the host reports this feature.
  pub fn reported_by(&self, host: &HostFlags) -> bool {
    self.host_names().iter().any(|name| host.contains(name))
  }
}

impl fmt::Display for CpuFeature {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Candidate features for an architecture.
pub fn candidates(arch: Arch) -> &'static [CpuFeature] {
  match arch {
    Arch::X86 | Arch::X86_64 => X86_CANDIDATES,
    Arch::Arm => ARM_CANDIDATES,
    Arch::Aarch64 => AARCH64_CANDIDATES,
  }
}

/// Features a variant refuses even when the hardware reports them.
///
/// Termux drops AES. The reason is undocumented upstream (toolchain bug or
/// a real incompatibility); it needs confirmation on real hardware before
/// being generalised.
pub fn variant_exclusions(variant: Variant) -> &'static [CpuFeature] {
  match variant {
    Variant::Standard => &[],
    Variant::Termux => &[CpuFeature::Aes],
  }
}

/// Confirmed features for one architecture, rendered as compiler flags on
/// demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSet {
  arch: Arch,
  features: BTreeSet<CpuFeature>,
}

impl FeatureSet {
  pub fn empty(arch: Arch) -> Self {
    Self {
      arch,
      features: BTreeSet::new(),
    }
  }

  pub fn arch(&self) -> Arch {
    self.arch
  }

  pub fn contains(&self, feature: CpuFeature) -> bool {
    self.features.contains(&feature)
  }

  pub fn is_empty(&self) -> bool {
    self.features.is_empty()
  }

  pub fn len(&self) -> usize {
    self.features.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = CpuFeature> + '_ {
    self.features.iter().copied()
  }

  /// Return a copy without the given features.
  pub fn without(&self, excluded: &[CpuFeature]) -> Self {
    Self {
      arch: self.arch,
      features: self.features.iter().copied().filter(|f| !excluded.contains(f)).collect(),
    }
  }

  /// Compiler flags enabling every confirmed feature.
  pub fn compiler_flags(&self) -> Vec<String> {
    match self.arch {
      Arch::X86 | Arch::X86_64 => self
        .features
        .iter()
        .map(|f| format!("-m{}", f.name().replace('_', ".")))
        .collect(),
      Arch::Arm => self
        .features
        .iter()
        .filter(|f| **f == CpuFeature::Neon)
        .map(|_| "-mfpu=neon".to_string())
        .collect(),
      Arch::Aarch64 => {
        if self.features.is_empty() {
          return Vec::new();
        }
        let extensions: String = self.features.iter().map(|f| format!("+{}", f.name())).collect();
        vec![format!("-march=armv8-a{}", extensions)]
      }
    }
  }
}

/// Check `candidates` against what `source` reports for the host.
///
/// Introspection failures are absorbed: the result is simply empty.
pub fn detect(arch: Arch, candidates: &[CpuFeature], source: &dyn CpuFlagSource) -> FeatureSet {
  let host = match source.host_flags() {
    Ok(flags) => flags,
    Err(e) => {
      debug!(error = %e, "no cpu feature flags will be added");
      return FeatureSet::empty(arch);
    }
  };

  let mut set = FeatureSet::empty(arch);
  for feature in candidates {
    let supported = feature.reported_by(&host);
    debug!(feature = %feature, supported, "checked extended instruction support");
    if supported {
      set.features.insert(*feature);
    }
  }
  set
}

/// Probe the features usable for `target`.
///
/// Only the host can be introspected; any other target gets an empty set.
pub fn probe_target(target: &BuildTarget, source: &dyn CpuFlagSource) -> FeatureSet {
  if !target.is_host() {
    debug!(target = %target, "target is not the host, skipping cpu probe");
    return FeatureSet::empty(target.arch);
  }
  detect(target.arch, candidates(target.arch), source)
}
