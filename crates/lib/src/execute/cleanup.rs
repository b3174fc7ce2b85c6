//! Transient file tracking and cancellation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

/// Paths a stage generates only for its own use.
///
/// Stages register files here as soon as they decide to create them, so a
/// stage that fails halfway still gets its leftovers removed.
#[derive(Debug, Clone, Default)]
pub struct TransientFiles {
  paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl TransientFiles {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&self, path: impl Into<PathBuf>) {
    let path = path.into();
    debug!(path = ?path, "registered transient path");
    let mut paths = self.paths.lock().unwrap_or_else(|e| e.into_inner());
    if !paths.contains(&path) {
      paths.push(path);
    }
  }

  pub fn snapshot(&self) -> Vec<PathBuf> {
    self.paths.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }

  fn drain(&self) -> Vec<PathBuf> {
    std::mem::take(&mut *self.paths.lock().unwrap_or_else(|e| e.into_inner()))
  }
}

/// Removes every registered transient path when the run ends.
///
/// [`CleanupGuard::cleanup`] is called on the normal path; `Drop` covers
/// early returns and unwinding.
#[derive(Debug)]
pub struct CleanupGuard {
  files: TransientFiles,
}

impl CleanupGuard {
  pub fn new(files: TransientFiles) -> Self {
    Self { files }
  }

  pub fn files(&self) -> &TransientFiles {
    &self.files
  }

  /// Remove registered paths, returning those that existed and were removed.
  pub fn cleanup(&self) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    // Later registrations may live inside earlier directories.
    for path in self.files.drain().into_iter().rev() {
      let result = match std::fs::symlink_metadata(&path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&path),
        Ok(_) => std::fs::remove_file(&path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
        Err(e) => Err(e),
      };
      match result {
        Ok(()) => {
          debug!(path = ?path, "removed transient path");
          removed.push(path);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = ?path, error = %e, "failed to remove transient path"),
      }
    }
    removed.reverse();
    removed
  }
}

impl Drop for CleanupGuard {
  fn drop(&mut self) {
    self.cleanup();
  }
}

/// Shared cancellation flag set from the Ctrl-C handler.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}
