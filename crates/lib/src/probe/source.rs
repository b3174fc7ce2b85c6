//! Where host CPU flags come from.

use std::collections::BTreeSet;
use std::path::PathBuf;

use super::ProbeError;

/// Normalised, lowercase set of capability flags reported by a host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostFlags(BTreeSet<String>);

impl HostFlags {
  pub fn new<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    Self(
      names
        .into_iter()
        .map(|n| n.as_ref().trim().to_ascii_lowercase())
        .filter(|n| !n.is_empty())
        .collect(),
    )
  }

  pub fn contains(&self, name: &str) -> bool {
    self.0.contains(name)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// Something that can report the host's CPU capability flags.
pub trait CpuFlagSource: Send + Sync {
  fn host_flags(&self) -> Result<HostFlags, ProbeError>;
}

/// Fixed flag list. Used by tests and for `info` on foreign targets.
#[derive(Debug, Clone, Default)]
pub struct StaticFlags(HostFlags);

impl StaticFlags {
  pub fn new<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    Self(HostFlags::new(names))
  }
}

impl CpuFlagSource for StaticFlags {
  fn host_flags(&self) -> Result<HostFlags, ProbeError> {
    Ok(self.0.clone())
  }
}

/// Reads the `flags` (x86) or `Features` (ARM) line of `/proc/cpuinfo`.
#[derive(Debug, Clone)]
pub struct ProcCpuInfo {
  path: PathBuf,
}

impl ProcCpuInfo {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  fn parse(content: &str) -> Option<HostFlags> {
    content.lines().find_map(|line| {
      let (key, value) = line.split_once(':')?;
      match key.trim() {
        "flags" | "Features" => Some(HostFlags::new(value.split_whitespace())),
        _ => None,
      }
    })
  }
}

impl Default for ProcCpuInfo {
  fn default() -> Self {
    Self::new("/proc/cpuinfo")
  }
}

impl CpuFlagSource for ProcCpuInfo {
  fn host_flags(&self) -> Result<HostFlags, ProbeError> {
    let content = std::fs::read_to_string(&self.path).map_err(|source| ProbeError::Read {
      path: self.path.display().to_string(),
      source,
    })?;
    Self::parse(&content).ok_or_else(|| ProbeError::NoFlags(self.path.display().to_string()))
  }
}

/// Queries the `cpuid` instruction directly; works on every x86 OS.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuidSource;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl CpuFlagSource for CpuidSource {
  fn host_flags(&self) -> Result<HostFlags, ProbeError> {
    use raw_cpuid::CpuId;

    let cpuid = CpuId::new();
    let mut names: Vec<&str> = Vec::new();

    let info = cpuid
      .get_feature_info()
      .ok_or_else(|| ProbeError::Unavailable("cpuid leaf 1 not supported".to_string()))?;
    let leaf1 = [
      (info.has_sse(), "sse"),
      (info.has_sse2(), "sse2"),
      (info.has_sse3(), "sse3"),
      (info.has_sse41(), "sse4_1"),
      (info.has_sse42(), "sse4_2"),
      (info.has_avx(), "avx"),
      (info.has_fma(), "fma"),
      (info.has_aesni(), "aes"),
      (info.has_f16c(), "f16c"),
      (info.has_rdrand(), "rdrand"),
      (info.has_movbe(), "movbe"),
      (info.has_mmx(), "mmx"),
      (info.has_fxsave_fxstor(), "fxsr"),
      (info.has_cmpxchg16b(), "cx16"),
      (info.has_xsave(), "xsave"),
    ];
    names.extend(leaf1.iter().filter(|(has, _)| *has).map(|(_, name)| *name));

    if let Some(ext) = cpuid.get_extended_feature_info() {
      let leaf7 = [
        (ext.has_avx2(), "avx2"),
        (ext.has_bmi1(), "bmi1"),
        (ext.has_adx(), "adx"),
        (ext.has_rdseed(), "rdseed"),
        (ext.has_rtm(), "rtm"),
        (ext.has_sgx(), "sgx"),
        (ext.has_clflushopt(), "clflushopt"),
        (ext.has_fsgsbase(), "fsgsbase"),
        (ext.has_vpclmulqdq(), "vpclmulqdq"),
      ];
      names.extend(leaf7.iter().filter(|(has, _)| *has).map(|(_, name)| *name));
    }

    if let Some(ext) = cpuid.get_extended_processor_and_feature_identifiers()
      && ext.has_lzcnt()
    {
      names.push("abm");
    }

    if let Some(state) = cpuid.get_extended_state_info() {
      if state.has_xsaveopt() {
        names.push("xsaveopt");
      }
      if state.has_xsavec() {
        names.push("xsavec");
      }
    }

    Ok(HostFlags::new(names))
  }
}

/// The best available flag source for this host.
pub fn host_source() -> Box<dyn CpuFlagSource> {
  #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
  {
    Box::new(CpuidSource)
  }

  #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
  {
    Box::new(ProcCpuInfo::default())
  }
}
