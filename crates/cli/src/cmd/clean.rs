use anyhow::{Context, Result};

use n8forge_lib::config::Config;
use n8forge_lib::layout::Layout;

use crate::GlobalArgs;
use crate::output::{print_info, print_removed, print_success};

pub fn cmd_clean(global: &GlobalArgs) -> Result<()> {
  let root = std::path::absolute(&global.project_dir).context("Failed to resolve project directory")?;
  let config = Config::load(&root, global.config.as_deref()).context("Failed to load config")?;
  let layout = Layout::new(&root, &config);

  let removed = layout.clean().context("Failed to clean build directories")?;
  if removed.is_empty() {
    print_info("Nothing to clean");
    return Ok(());
  }

  print_success("Cleaned build directories");
  for path in removed {
    print_removed(&path);
  }
  Ok(())
}
