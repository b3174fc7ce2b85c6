//! Staging tree assembly.
//!
//! ```text
//! <staging>/
//!   DEBIAN/{control,postinst,postrm}
//!   opt/<name>/...            copy of the install tree
//!   etc/profile.d/<script>.sh
//!   etc/fish/conf.d/<script>.fish
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{PackageError, PackageManifest};
use crate::config::Config;
use crate::execute::Invocation;
use crate::util::fs::copy_tree;

/// A populated staging tree ready for `dpkg-deb`.
#[derive(Debug, Clone)]
pub struct StagedPackage {
  pub root: PathBuf,
  pub manifest: PackageManifest,
}

fn io_err<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> PackageError + 'a {
  move |source| PackageError::Io {
    action,
    path: path.to_path_buf(),
    source,
  }
}

fn set_mode(path: &Path, mode: u32) -> Result<(), PackageError> {
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(io_err("set permissions on", path))?;
  }
  #[cfg(not(unix))]
  let _ = (path, mode);
  Ok(())
}

fn create_dir(path: &Path) -> Result<(), PackageError> {
  fs::create_dir_all(path).map_err(io_err("create", path))?;
  set_mode(path, 0o755)
}

fn write_file(path: &Path, content: &str, mode: u32) -> Result<(), PackageError> {
  fs::write(path, content).map_err(io_err("write", path))?;
  set_mode(path, mode)
}

/// Build the staging tree for `manifest` from `install_tree`.
///
/// Any previous staging tree at `staging_root` is removed first.
pub fn stage(
  install_tree: &Path,
  staging_root: &Path,
  config: &Config,
  mut manifest: PackageManifest,
) -> Result<StagedPackage, PackageError> {
  if !install_tree.is_dir() {
    return Err(PackageError::MissingInstallTree(install_tree.to_path_buf()));
  }

  if staging_root.exists() {
    fs::remove_dir_all(staging_root).map_err(io_err("remove", staging_root))?;
  }

  let prefix = config.package.install_prefix.to_string_lossy().replace('\\', "/");
  let install_dir = staging_root.join(prefix.trim_start_matches('/')).join(&config.project.name);
  let debian = staging_root.join("DEBIAN");
  let profile_d = staging_root.join("etc/profile.d");
  let fish_d = staging_root.join("etc/fish/conf.d");

  for dir in [&debian, &install_dir, &profile_d, &fish_d] {
    create_dir(dir)?;
  }

  let relative_install = install_dir.strip_prefix(staging_root).unwrap_or(&install_dir).to_path_buf();
  manifest.files = copy_tree(install_tree, &install_dir)
    .map_err(io_err("copy", install_tree))?
    .into_iter()
    .map(|file| relative_install.join(file))
    .collect();
  debug!(files = manifest.files.len(), "copied install tree into staging");

  let script = &config.package.env_script;
  write_file(&profile_d.join(format!("{}.sh", script)), &manifest.hooks.profile_env, 0o755)?;
  write_file(&fish_d.join(format!("{}.fish", script)), &manifest.hooks.fish_env, 0o755)?;

  write_file(&debian.join("postinst"), &manifest.hooks.postinst, 0o755)?;
  write_file(&debian.join("postrm"), &manifest.hooks.postrm, 0o755)?;
  write_file(&debian.join("control"), &manifest.control(), 0o644)?;

  info!(root = ?staging_root, package = %manifest.file_name(), "staged package");
  Ok(StagedPackage {
    root: staging_root.to_path_buf(),
    manifest,
  })
}

/// `dpkg-deb -Z xz --build <staging> <output>`
pub fn archive_invocation(staging_root: &Path, output: &Path) -> Invocation {
  Invocation::new("dpkg-deb")
    .args(["-Z", "xz", "--build"])
    .arg(staging_root.display().to_string())
    .arg(output.display().to_string())
}
