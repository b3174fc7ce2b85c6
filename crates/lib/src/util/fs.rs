use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Recursively copy `src` into `dst`, creating directories as needed.
///
/// Returns the copied files as paths relative to `src`, in walk order.
pub fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<Vec<PathBuf>> {
  let mut files = Vec::new();
  for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
    let entry = entry?;
    let Ok(relative) = entry.path().strip_prefix(src) else {
      continue;
    };
    let target = dst.join(relative);

    if entry.file_type().is_dir() {
      std::fs::create_dir_all(&target)?;
    } else {
      if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
      }
      std::fs::copy(entry.path(), &target)?;
      files.push(relative.to_path_buf());
    }
  }
  Ok(files)
}

/// Remove `path` if it exists, whether it is a file or a directory.
pub fn remove_if_exists(path: &Path) -> std::io::Result<()> {
  match std::fs::symlink_metadata(path) {
    Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
    Ok(_) => std::fs::remove_file(path),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}
