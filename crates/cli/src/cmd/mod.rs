mod build;
mod clean;
mod info;
mod plan;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use info::cmd_info;
pub use plan::cmd_plan;

use anyhow::{Context, Result};

use n8forge_lib::plan::Directives;
use n8forge_lib::platform::BuildTarget;

use crate::{DirectiveArgs, TargetArgs};

impl From<DirectiveArgs> for Directives {
  fn from(args: DirectiveArgs) -> Self {
    Self {
      skip_core: args.skip_core,
      skip_stdlib: args.skip_stdlib,
      accelerated: args.accelerated,
    }
  }
}

/// The host target with any overrides applied, or `None` for the plain host.
fn target_from(args: TargetArgs) -> Result<Option<BuildTarget>> {
  if args.os.is_none() && args.arch.is_none() && args.variant.is_none() {
    return Ok(None);
  }

  let host = BuildTarget::current().ok();
  let os = args
    .os
    .or(host.map(|h| h.os))
    .context("host OS is not supported, pass --os")?;
  let arch = args
    .arch
    .or(host.map(|h| h.arch))
    .context("host architecture is not supported, pass --arch")?;
  let variant = args.variant.or(host.map(|h| h.variant)).unwrap_or_default();
  Ok(Some(BuildTarget::new(os, arch, variant)))
}
