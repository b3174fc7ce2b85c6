//! Compilation unit discovery.
//!
//! Walks source roots and collects files by extension. Results are
//! ordered by path so that two runs over the same tree produce the same
//! compiler command lines.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::config::SourcesConfig;

#[derive(Debug, Error)]
pub enum DiscoveryError {
  #[error("failed to walk {root}: {message}")]
  Walk { root: PathBuf, message: String },

  #[error("no {kind} sources found for stage '{stage}' under {roots}")]
  NoUnits {
    stage: String,
    kind: String,
    roots: String,
  },
}

/// Source language of a compilation unit, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageKind {
  /// `.cpp`
  Cpp,
  /// `.cc`, the stdlib's convention.
  StdlibCpp,
  /// `.cu`
  Cuda,
  /// `.c`
  C,
}

impl LanguageKind {
  pub fn from_path(path: &Path) -> Option<Self> {
    match path.extension()?.to_str()? {
      "cpp" => Some(Self::Cpp),
      "cc" => Some(Self::StdlibCpp),
      "cu" => Some(Self::Cuda),
      "c" => Some(Self::C),
      _ => None,
    }
  }

  pub fn extension(&self) -> &'static str {
    match self {
      Self::Cpp => "cpp",
      Self::StdlibCpp => "cc",
      Self::Cuda => "cu",
      Self::C => "c",
    }
  }
}

/// One discovered source file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CompilationUnit {
  pub path: PathBuf,
  pub kind: LanguageKind,
}

/// Collect every file under `root` whose kind satisfies `accept`.
///
/// Files whose name ends with any `denylist` suffix are dropped. A missing
/// root yields an empty list.
pub fn discover(
  root: &Path,
  accept: impl Fn(LanguageKind) -> bool,
  denylist: &[String],
) -> Result<Vec<CompilationUnit>, DiscoveryError> {
  if !root.exists() {
    debug!(root = ?root, "source root does not exist");
    return Ok(Vec::new());
  }

  let mut units = Vec::new();
  for entry in WalkDir::new(root).follow_links(true) {
    let entry = entry.map_err(|e| DiscoveryError::Walk {
      root: root.to_path_buf(),
      message: e.to_string(),
    })?;
    if !entry.file_type().is_file() {
      continue;
    }

    let path = entry.path();
    let Some(kind) = LanguageKind::from_path(path) else {
      continue;
    };
    if !accept(kind) {
      continue;
    }

    let name = entry.file_name().to_string_lossy();
    if denylist.iter().any(|suffix| name.ends_with(suffix.as_str())) {
      trace!(path = ?path, "denylisted");
      continue;
    }

    units.push(CompilationUnit {
      path: path.to_path_buf(),
      kind,
    });
  }

  units.sort();
  debug!(root = ?root, count = units.len(), "discovered sources");
  Ok(units)
}

/// [`discover`] over several roots, merged into one ordered list.
pub fn discover_all(
  roots: &[PathBuf],
  accept: impl Fn(LanguageKind) -> bool + Copy,
  denylist: &[String],
) -> Result<Vec<CompilationUnit>, DiscoveryError> {
  let mut units = Vec::new();
  for root in roots {
    units.extend(discover(root, accept, denylist)?);
  }
  units.sort();
  units.dedup();
  Ok(units)
}

/// Fail when a mandatory stage has nothing to compile.
pub fn require_units<'a>(
  stage: &str,
  kind: LanguageKind,
  roots: &[PathBuf],
  units: &'a [CompilationUnit],
) -> Result<&'a [CompilationUnit], DiscoveryError> {
  if units.is_empty() {
    return Err(DiscoveryError::NoUnits {
      stage: stage.to_string(),
      kind: kind.extension().to_string(),
      roots: roots.iter().map(|r| r.display().to_string()).collect::<Vec<_>>().join(", "),
    });
  }
  Ok(units)
}

/// Every source list the build stages draw from, resolved against the
/// project root.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceSet {
  pub core: Vec<CompilationUnit>,
  pub vendor: Vec<CompilationUnit>,
  pub stdlib: Vec<CompilationUnit>,
  pub stdlib_vendor: Vec<CompilationUnit>,
  pub accelerated: Vec<CompilationUnit>,
}

impl SourceSet {
  pub fn discover(project_dir: &Path, sources: &SourcesConfig) -> Result<Self, DiscoveryError> {
    let resolve = |dirs: &[PathBuf]| dirs.iter().map(|d| project_dir.join(d)).collect::<Vec<_>>();
    let deny = &sources.denylist;

    Ok(Self {
      core: discover_all(&resolve(&sources.core), |k| k == LanguageKind::Cpp, deny)?,
      vendor: discover_all(&resolve(&sources.vendor), |k| k == LanguageKind::Cpp, deny)?,
      stdlib: discover_all(&resolve(&sources.stdlib), |k| k == LanguageKind::StdlibCpp, deny)?,
      stdlib_vendor: discover_all(&resolve(&sources.stdlib_vendor), |k| k == LanguageKind::Cpp, deny)?,
      accelerated: discover_all(&resolve(&sources.accelerated), |k| k == LanguageKind::Cuda, deny)?,
    })
  }
}
