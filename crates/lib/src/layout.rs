//! Working directories and the install tree.
//!
//! ```text
//! <root>/
//!   dist/
//!     n8lang/                       install tree
//!       bin/
//!       modules/core@<v>/lib/       stdlib shared library
//!     deb/                          package staging (transient)
//!   temp/
//!     obj/                          core objects
//!     libn8core.a
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::util::fs::{copy_tree, remove_if_exists};

#[derive(Debug, Error)]
pub enum LayoutError {
  #[error("failed to {action} {path}: {source}")]
  Io {
    action: &'static str,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

fn io_err<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> LayoutError + 'a {
  move |source| LayoutError::Io {
    action,
    path: path.to_path_buf(),
    source,
  }
}

/// Absolute paths every stage writes to, derived from the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
  pub root: PathBuf,
  pub dist: PathBuf,
  pub install: PathBuf,
  pub bin: PathBuf,
  pub stdlib_dir: PathBuf,
  /// Project module tree copied into the install tree.
  pub modules_src: PathBuf,
  pub temp: PathBuf,
  pub objects: PathBuf,
  pub staging: PathBuf,
  /// Generated installer resource sources.
  pub embed: PathBuf,
}

impl Layout {
  pub fn new(root: &Path, config: &Config) -> Self {
    let dist = root.join(&config.layout.dist_dir);
    let install = dist.join(&config.layout.install_dir);
    let temp = root.join(&config.layout.temp_dir);
    let stdlib_dir = install
      .join("modules")
      .join(format!("core@{}", config.project.core_version))
      .join("lib");

    Self {
      root: root.to_path_buf(),
      bin: install.join("bin"),
      stdlib_dir,
      modules_src: root.join(&config.layout.modules_dir),
      objects: temp.join("obj"),
      staging: dist.join("deb"),
      embed: root.join(&config.windows.embed_dir),
      dist,
      install,
      temp,
    }
  }

  /// Static archive holding the core objects.
  pub fn core_archive(&self) -> PathBuf {
    self.temp.join("libn8core.a")
  }

  /// Wipe and recreate the install tree and temp directory, then copy the
  /// project's modules into the install tree.
  pub fn prepare_full(&self) -> Result<(), LayoutError> {
    for dir in [&self.install, &self.temp] {
      remove_if_exists(dir).map_err(io_err("remove", dir))?;
      debug!(path = ?dir, "cleared directory");
    }
    std::fs::create_dir_all(&self.install).map_err(io_err("create", &self.install))?;

    if self.modules_src.is_dir() {
      let target = self.install.join("modules");
      let copied = copy_tree(&self.modules_src, &target).map_err(io_err("copy", &self.modules_src))?;
      info!(from = ?self.modules_src, files = copied.len(), "copied modules into install tree");
    } else {
      warn!(path = ?self.modules_src, "modules directory not found, install tree will have no modules");
    }

    self.prepare_partial()
  }

  /// Create missing directories without removing anything.
  pub fn prepare_partial(&self) -> Result<(), LayoutError> {
    for dir in [&self.bin, &self.stdlib_dir, &self.objects] {
      std::fs::create_dir_all(dir).map_err(io_err("create", dir))?;
    }
    Ok(())
  }

  /// Remove everything the build writes. Returns the paths that existed.
  pub fn clean(&self) -> Result<Vec<PathBuf>, LayoutError> {
    let mut removed = Vec::new();
    for dir in [&self.dist, &self.temp, &self.embed] {
      if dir.exists() {
        remove_if_exists(dir).map_err(io_err("remove", dir))?;
        removed.push(dir.clone());
      }
    }
    info!(removed = removed.len(), "cleaned build directories");
    Ok(removed)
  }
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;
  use crate::util::testutil::{n8_source_tree, write_file};

  #[test]
  fn default_paths() {
    let layout = Layout::new(Path::new("/work/n8"), &Config::default());
    assert_eq!(layout.install, PathBuf::from("/work/n8/dist/n8lang"));
    assert_eq!(layout.bin, PathBuf::from("/work/n8/dist/n8lang/bin"));
    assert_eq!(
      layout.stdlib_dir,
      PathBuf::from("/work/n8/dist/n8lang/modules/core@1.0.0/lib")
    );
    assert_eq!(layout.core_archive(), PathBuf::from("/work/n8/temp/libn8core.a"));
    assert_eq!(layout.staging, PathBuf::from("/work/n8/dist/deb"));
  }

  #[test]
  fn full_prepare_wipes_and_copies_modules() {
    let temp = TempDir::new().unwrap();
    n8_source_tree(temp.path());
    write_file(temp.path(), "dist/n8lang/bin/stale", b"old");
    write_file(temp.path(), "temp/obj/stale.o", b"old");
    let layout = Layout::new(temp.path(), &Config::default());

    layout.prepare_full().unwrap();

    assert!(!layout.bin.join("stale").exists());
    assert!(!layout.objects.join("stale.o").exists());
    assert!(layout.install.join("modules/core@1.0.0/src/io.n8").is_file());
    assert!(layout.stdlib_dir.is_dir());
    assert!(layout.objects.is_dir());
  }

  #[test]
  fn full_prepare_without_modules_still_creates_tree() {
    let temp = TempDir::new().unwrap();
    let layout = Layout::new(temp.path(), &Config::default());
    layout.prepare_full().unwrap();
    assert!(layout.bin.is_dir());
    assert!(layout.stdlib_dir.is_dir());
  }

  #[test]
  fn partial_prepare_keeps_previous_outputs() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "dist/n8lang/bin/n8", b"previous");
    write_file(temp.path(), "temp/libn8core.a", b"previous");
    let layout = Layout::new(temp.path(), &Config::default());

    layout.prepare_partial().unwrap();

    assert!(layout.bin.join("n8").is_file());
    assert!(layout.core_archive().is_file());
  }

  #[test]
  fn clean_removes_dist_and_temp() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "dist/n8lang/bin/n8", b"");
    write_file(temp.path(), "temp/libn8core.a", b"");
    write_file(temp.path(), "src/N8.cpp", b"");
    let layout = Layout::new(temp.path(), &Config::default());

    let removed = layout.clean().unwrap();

    assert_eq!(removed.len(), 2);
    assert!(!layout.dist.exists());
    assert!(!layout.temp.exists());
    assert!(temp.path().join("src/N8.cpp").exists());
  }
}
