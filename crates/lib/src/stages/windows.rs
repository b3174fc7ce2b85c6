//! Windows installer and uninstaller stages.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use super::dependency_output;
use crate::artifact::{Artifact, ids};
use crate::config::Config;
use crate::embed::{EmbedOutputs, ResourceEntry, embed, symbol_for};
use crate::execute::{BuildContext, ExecuteError, Invocation, StagePlan, StagePlanner, TransientFiles};
use crate::package::PackageArch;
use crate::platform::BuildTarget;

/// gtkmm stack headers below the MSYS2 prefix.
const GTKMM_INCLUDES: &[&str] = &[
  "include",
  "include/gtkmm-3.0",
  "lib/gtkmm-3.0/include",
  "include/atkmm-1.6",
  "lib/atkmm-1.6/include",
  "include/gdkmm-3.0",
  "lib/gdkmm-3.0/include",
  "include/giomm-2.4",
  "lib/giomm-2.4/include",
  "include/gtk-3.0",
  "include/cairo",
  "include/atk-1.0",
  "include/pangomm-1.4",
  "lib/pangomm-1.4/include",
  "include/glibmm-2.4",
  "lib/glibmm-2.4/include",
  "include/cairomm-1.0",
  "lib/cairomm-1.0/include",
  "include/sigc++-2.0",
  "lib/sigc++-2.0/include",
  "include/pango-1.0",
  "include/pixman-1",
  "include/fribidi",
  "include/harfbuzz",
  "include/freetype2",
  "include/gdk-pixbuf-2.0",
  "include/libpng16",
  "include/webp",
  "include/glib-2.0",
  "lib/glib-2.0/include",
];

const GTKMM_LIBS: &[&str] = &[
  "-lgtkmm-3.0",
  "-latkmm-1.6",
  "-lgdkmm-3.0",
  "-lgdk-3",
  "-lz",
  "-lgdi32",
  "-limm32",
  "-lshell32",
  "-lole32",
  "-luuid",
  "-lwinmm",
  "-ldwmapi",
  "-lsetupapi",
  "-lhid",
  "-lwinspool",
  "-lcomctl32",
  "-lcomdlg32",
  "-lcairo-gobject",
  "-latk-1.0",
  "-lpangomm-1.4",
  "-lglibmm-2.4",
  "-lcairomm-1.0",
  "-lsigc-2.0",
  "-lpangocairo-1.0",
  "-lpangowin32-1.0",
  "-lpango-1.0",
  "-lcairo",
  "-lharfbuzz",
  "-lgdk_pixbuf-2.0",
  "-lgio-2.0",
  "-lgobject-2.0",
  "-lglib-2.0",
  "-lintl",
  "-lgiomm-2.4",
  "-lshlwapi",
  "-ladvapi32",
  "-luser32",
];

/// Join onto an MSYS2 prefix with backslashes, whatever the build host.
fn msys2_path(prefix: &Path, relative: &str) -> String {
  let prefix = prefix.to_string_lossy();
  format!("{}\\{}", prefix.trim_end_matches(['\\', '/']), relative.replace('/', "\\"))
}

/// `<name>_<version>_<arch>.exe`
pub fn installer_file_name(config: &Config, target: &BuildTarget) -> String {
  format!(
    "{}_{}_{}.exe",
    config.project.name,
    config.project.version,
    PackageArch::from_arch(target.arch)
  )
}

/// Compiles the resource scripts and links the GTK uninstaller.
#[derive(Debug, Default)]
pub struct UninstallerPlanner;

impl StagePlanner for UninstallerPlanner {
  fn prepare(
    &self,
    artifact: &Artifact,
    ctx: &BuildContext,
    transient: &TransientFiles,
  ) -> Result<StagePlan, ExecuteError> {
    let root = &ctx.layout.root;
    let windows = &ctx.config.windows;
    let mut steps = Vec::new();
    let mut resources = Vec::new();

    for rc in &windows.resource_configs {
      let stem = rc.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
      let res = ctx.layout.temp.join(format!("{}.res", stem));
      transient.register(&res);
      steps.push(
        Invocation::new("windres")
          .arg(root.join(rc).display().to_string())
          .args(["-O", "coff", "-o"])
          .arg(res.display().to_string()),
      );
      resources.push(res.display().to_string());
    }

    let prefix = &windows.msys2_prefix;
    let link = Invocation::new(&ctx.profile.compiler)
      .arg("-o")
      .arg(artifact.output.display().to_string())
      .args(["-DLIBDEFLATE_DLL", "-mwindows"])
      .arg(root.join(&windows.uninstaller_source).display().to_string())
      .args(resources)
      .args(GTKMM_INCLUDES.iter().map(|dir| format!("-I{}", msys2_path(prefix, dir))))
      .arg(format!("-L{}", msys2_path(prefix, "lib")))
      .arg(format!("-L{}", msys2_path(prefix, "bin")))
      .args(GTKMM_LIBS.iter().copied());
    steps.push(link);

    debug!(stage = %artifact.id, msys2 = ?prefix, "planned uninstaller");
    Ok(StagePlan {
      steps,
      outputs: vec![artifact.output.clone()],
    })
  }
}

/// Embeds the install tree into generated sources and compiles the
/// self-extracting installer.
#[derive(Debug, Default)]
pub struct InstallerPlanner;

impl InstallerPlanner {
  /// Every file the installer carries, with install-root-relative
  /// destinations using backslashes.
  fn resources(artifact: &Artifact, ctx: &BuildContext) -> Result<Vec<ResourceEntry>, ExecuteError> {
    let install = &ctx.layout.install;
    let mut sources: Vec<PathBuf> = vec![
      dependency_output(ctx, &artifact.id, ids::EXECUTABLE)?.to_path_buf(),
      dependency_output(ctx, &artifact.id, ids::UNINSTALLER)?.to_path_buf(),
    ];

    let modules = install.join("modules");
    for entry in WalkDir::new(&modules).sort_by_file_name() {
      let entry = entry.map_err(|e| ExecuteError::Io(e.into()))?;
      if entry.file_type().is_file() {
        sources.push(entry.into_path());
      }
    }
    sources.dedup();

    Ok(
      sources
        .into_iter()
        .map(|source| {
          let relative = source
            .strip_prefix(install)
            .unwrap_or(&source)
            .to_string_lossy()
            .replace('/', "\\");
          ResourceEntry::new(source.clone(), symbol_for(&relative), relative)
        })
        .collect(),
    )
  }
}

impl StagePlanner for InstallerPlanner {
  fn prepare(
    &self,
    artifact: &Artifact,
    ctx: &BuildContext,
    transient: &TransientFiles,
  ) -> Result<StagePlan, ExecuteError> {
    let windows = &ctx.config.windows;
    let root = &ctx.layout.root;

    let entries = Self::resources(artifact, ctx)?;
    let outputs = EmbedOutputs::named(&ctx.layout.embed, &windows.embed_constants, &windows.embed_table);
    for path in outputs.paths() {
      transient.register(path);
    }
    let embedded = embed(&entries, &outputs)?;
    info!(stage = %artifact.id, resources = embedded.len(), "embedded installer resources");

    let build = Invocation::new(&ctx.profile.compiler)
      .args(["-static", "-std=c++17"])
      .arg(format!("-I{}", root.join(&windows.installer_include).display()))
      .arg(format!("-I{}", ctx.layout.embed.display()))
      .arg("-o")
      .arg(artifact.output.display().to_string())
      .arg(root.join(&windows.installer_source).display().to_string())
      .args(["-lshlwapi", "-ladvapi32"]);

    Ok(StagePlan {
      steps: vec![build],
      outputs: vec![artifact.output.clone()],
    })
  }
}
