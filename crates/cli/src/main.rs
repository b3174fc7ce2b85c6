mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use n8forge_lib::platform::{Arch, Os, Variant};

use crate::cmd::{cmd_build, cmd_clean, cmd_info, cmd_plan};
use crate::output::print_error;

/// n8forge - build and package the N8 language toolchain
#[derive(Parser)]
#[command(name = "n8forge")]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(flatten)]
  global: GlobalArgs,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
  /// Project root containing the N8 sources
  #[arg(short = 'C', long = "project-dir", global = true, default_value = ".")]
  pub project_dir: PathBuf,

  /// Config file (default: <project-dir>/n8forge.toml when present)
  #[arg(short, long, global = true)]
  pub config: Option<PathBuf>,

  /// Enable debug logging
  #[arg(short, long, global = true)]
  pub verbose: bool,
}

/// Partial-rebuild and optional-artifact flags shared by `build` and `plan`.
#[derive(Args, Debug, Clone, Copy)]
pub struct DirectiveArgs {
  /// Reuse the core archive and executable from the previous build
  #[arg(long)]
  pub skip_core: bool,

  /// Leave out the stdlib and everything that depends on it
  #[arg(long)]
  pub skip_stdlib: bool,

  /// Also build the CUDA-accelerated executable
  #[arg(long)]
  pub accelerated: bool,
}

/// Target overrides; unset parts come from the host.
#[derive(Args, Debug, Clone, Copy)]
pub struct TargetArgs {
  #[arg(long, value_parser = parse_os)]
  pub os: Option<Os>,

  #[arg(long, value_parser = parse_arch)]
  pub arch: Option<Arch>,

  #[arg(long, value_parser = parse_variant)]
  pub variant: Option<Variant>,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every artifact for the host
  Build {
    #[command(flatten)]
    directives: DirectiveArgs,

    /// Maximum number of stages running at once
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,

    /// Do not run `git submodule update` first
    #[arg(long)]
    skip_submodules: bool,

    /// Install the system packages the runtime links against (linux)
    #[arg(long)]
    install_prereqs: bool,

    /// MSYS2 mingw64 prefix for the Windows uninstaller
    #[arg(long, value_name = "PATH")]
    msys2: Option<PathBuf>,
  },

  /// Show the artifact waves a build would run, without invoking tools
  Plan {
    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    directives: DirectiveArgs,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Show the target, toolchain profile and probed CPU features
  Info {
    #[command(flatten)]
    target: TargetArgs,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Remove the distribution and temp directories
  Clean,
}

fn parse_os(s: &str) -> Result<Os, String> {
  Os::parse(s).ok_or_else(|| format!("unknown os '{}' (expected linux, darwin or windows)", s))
}

fn parse_arch(s: &str) -> Result<Arch, String> {
  Arch::parse(s).ok_or_else(|| format!("unknown architecture '{}'", s))
}

fn parse_variant(s: &str) -> Result<Variant, String> {
  Variant::parse(s).map_err(|e| e.to_string())
}

fn init_tracing(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn run(cli: Cli) -> Result<i32> {
  let global = &cli.global;
  match cli.command {
    Commands::Build {
      directives,
      jobs,
      skip_submodules,
      install_prereqs,
      msys2,
    } => cmd_build(global, directives, jobs, !skip_submodules, install_prereqs, msys2),
    Commands::Plan {
      target,
      directives,
      json,
    } => cmd_plan(global, target, directives, json).map(|_| 0),
    Commands::Info { target, json } => cmd_info(global, target, json).map(|_| 0),
    Commands::Clean => cmd_clean(global).map(|_| 0),
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.global.verbose);

  match run(cli) {
    Ok(0) => ExitCode::SUCCESS,
    Ok(_) => ExitCode::FAILURE,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
