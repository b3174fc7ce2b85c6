//! Project configuration (`n8forge.toml`).
//!
//! Every field has a default matching the stock N8 source tree, so a
//! project without a config file builds exactly like one with an empty
//! file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{CONFIG_FILE_NAME, EMBED_CONSTANTS_FILE, EMBED_TABLE_FILE};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {0}")]
  NotFound(PathBuf),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid config: {0}")]
  Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  pub project: ProjectConfig,
  pub layout: LayoutConfig,
  pub sources: SourcesConfig,
  pub package: PackageConfig,
  pub windows: WindowsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
  /// Distribution name, used for package and installer file names.
  pub name: String,
  pub version: String,
  /// Version of the bundled `core` module; selects `modules/core@<v>/`.
  pub core_version: String,
  pub maintainer: String,
  pub description: String,
  /// Base name of the interpreter executable.
  pub executable: String,
  /// Base name of the stdlib shared library.
  pub stdlib: String,
}

impl Default for ProjectConfig {
  fn default() -> Self {
    Self {
      name: "n8-lang".to_string(),
      version: "1.0.0".to_string(),
      core_version: "1.0.0".to_string(),
      maintainer: "Nathanne Isip <nathanneisip@gmail.com>".to_string(),
      description: "N8 programming language runtime and modules.".to_string(),
      executable: "n8".to_string(),
      stdlib: "n8-std".to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
  pub dist_dir: PathBuf,
  /// Install tree directory name below `dist_dir`.
  pub install_dir: String,
  pub temp_dir: PathBuf,
  /// Source module tree copied into the install tree.
  pub modules_dir: PathBuf,
}

impl Default for LayoutConfig {
  fn default() -> Self {
    Self {
      dist_dir: PathBuf::from("dist"),
      install_dir: "n8lang".to_string(),
      temp_dir: PathBuf::from("temp"),
      modules_dir: PathBuf::from("modules"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
  /// Interpreter sources (`.cpp`), archived into the core library.
  pub core: Vec<PathBuf>,
  /// Stdlib sources (`.cc`).
  pub stdlib: Vec<PathBuf>,
  /// Vendored libraries compiled into the core archive.
  pub vendor: Vec<PathBuf>,
  /// Vendored libraries only the stdlib links.
  pub stdlib_vendor: Vec<PathBuf>,
  /// CUDA sources for the accelerated executable.
  pub accelerated: Vec<PathBuf>,
  pub include_dirs: Vec<PathBuf>,
  pub stdlib_include_dirs: Vec<PathBuf>,
  /// File-name suffixes never compiled.
  pub denylist: Vec<String>,
}

impl Default for SourcesConfig {
  fn default() -> Self {
    Self {
      core: vec![PathBuf::from("src")],
      stdlib: vec![PathBuf::from("std")],
      vendor: vec![PathBuf::from("lib/QuickDigest5/src"), PathBuf::from("lib/MyShell/src")],
      stdlib_vendor: vec![PathBuf::from("lib/SHA/src")],
      accelerated: vec![PathBuf::from("src")],
      include_dirs: vec![
        PathBuf::from("include"),
        PathBuf::from("lib/glfw/include"),
        PathBuf::from("lib/QuickDigest5/include"),
        PathBuf::from("lib/MyShell/include"),
        PathBuf::from("lib/SHA/src"),
      ],
      stdlib_include_dirs: vec![PathBuf::from("std")],
      denylist: vec!["example.cpp".to_string()],
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
  pub priority: String,
  pub section: String,
  /// Base name of the `profile.d` / fish `conf.d` scripts.
  pub env_script: String,
  /// Directory the install tree lands in on the target system.
  pub install_prefix: PathBuf,
  pub bin_link_dir: PathBuf,
  /// Shell init files the registration line is appended to.
  pub init_files: Vec<PathBuf>,
}

impl Default for PackageConfig {
  fn default() -> Self {
    Self {
      priority: "optional".to_string(),
      section: "development".to_string(),
      env_script: "n8lang".to_string(),
      install_prefix: PathBuf::from("/opt"),
      bin_link_dir: PathBuf::from("/usr/local/bin"),
      init_files: vec![
        PathBuf::from("/etc/bash.bashrc"),
        PathBuf::from("/etc/zsh/zshenv"),
        PathBuf::from("/etc/profile"),
      ],
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowsConfig {
  /// MSYS2 mingw64 prefix providing the gtkmm stack for the uninstaller.
  pub msys2_prefix: PathBuf,
  pub resource_configs: Vec<PathBuf>,
  pub uninstaller_source: PathBuf,
  pub installer_source: PathBuf,
  pub installer_include: PathBuf,
  /// Directory the embedded-resource sources are generated into.
  pub embed_dir: PathBuf,
  /// File names `installer_source` includes for the generated constants
  /// and lookup table. `embed_dir` is on its include path.
  pub embed_constants: String,
  pub embed_table: String,
}

impl Default for WindowsConfig {
  fn default() -> Self {
    Self {
      msys2_prefix: PathBuf::from(r"D:\a\_temp\msys64\mingw64\"),
      resource_configs: vec![
        PathBuf::from("configs/n8-uninstaller-config.rc"),
        PathBuf::from("configs/n8-uninstaller-icon-config.rc"),
      ],
      uninstaller_source: PathBuf::from("tools/windows_uninstaller/uninstaller.cpp"),
      installer_source: PathBuf::from("tools/windows_installer/installer.cpp"),
      installer_include: PathBuf::from("tools/windows_installer/include"),
      embed_dir: PathBuf::from("temp/embed"),
      embed_constants: EMBED_CONSTANTS_FILE.to_string(),
      embed_table: EMBED_TABLE_FILE.to_string(),
    }
  }
}

impl Config {
  /// Load the project configuration.
  ///
  /// An explicit path must exist. Without one, `n8forge.toml` at the
  /// project root is used when present, otherwise the defaults apply.
  pub fn load(project_dir: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
    let path = match explicit {
      Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
      Some(path) => path.to_path_buf(),
      None => {
        let default = project_dir.join(CONFIG_FILE_NAME);
        if !default.exists() {
          debug!(path = ?default, "no config file, using defaults");
          return Ok(Self::default());
        }
        default
      }
    };

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
      path: path.clone(),
      source,
    })?;
    let config = Self::parse(&content).map_err(|source| ConfigError::Parse {
      path: path.clone(),
      source,
    })?;
    config.validate()?;
    debug!(path = ?path, "loaded config");
    Ok(config)
  }

  pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(content)
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if self.project.name.trim().is_empty() {
      return Err(ConfigError::Invalid("project.name must not be empty".to_string()));
    }
    if self.project.version.trim().is_empty() {
      return Err(ConfigError::Invalid("project.version must not be empty".to_string()));
    }
    if self.sources.core.is_empty() {
      return Err(ConfigError::Invalid("sources.core must list at least one directory".to_string()));
    }
    Ok(())
  }
}
