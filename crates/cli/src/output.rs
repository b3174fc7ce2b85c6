//! CLI output formatting utilities.
//!
//! Status lines, stage report rows and byte/duration formatting shared by
//! the build, plan and clean commands.

use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};

mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const REMOVE: &str = "-";
}

/// Digests are shown with their first 12 hex characters.
const SHORT_DIGEST: usize = 12;

pub fn truncate_hash(hash: &str) -> &str {
  let len = hash.len().min(SHORT_DIGEST);
  &hash[..len]
}

pub fn format_bytes(bytes: u64) -> String {
  const KB: u64 = 1024;
  const MB: u64 = KB * 1024;
  const GB: u64 = MB * 1024;

  if bytes >= GB {
    format!("{:.1} GB", bytes as f64 / GB as f64)
  } else if bytes >= MB {
    format!("{:.1} MB", bytes as f64 / MB as f64)
  } else if bytes >= KB {
    format!("{:.1} KB", bytes as f64 / KB as f64)
  } else {
    format!("{} B", bytes)
  }
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    format!("{}m {}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// One produced file under a succeeded stage.
pub fn print_artifact_output(path: &Path, size: u64, sha256: &str) {
  println!("{}", artifact_output_line(path, size, sha256));
}

fn artifact_output_line(path: &Path, size: u64, sha256: &str) -> String {
  format!(
    "    {} {} {} sha256:{}",
    symbols::ARROW,
    path.display(),
    format_bytes(size),
    truncate_hash(sha256)
  )
}

/// A planned artifact row: id, kind and output, plus the directive reusing a prior output.
pub fn planned_line(id: impl Display, kind: &str, output: &Path, reused_by: Option<impl Display>) -> String {
  let mut line = format!("  {} {} ({}) {} {}", symbols::INFO, id, kind, symbols::ARROW, output.display());
  if let Some(directive) = reused_by {
    line.push_str(&format!(" [reused: {}]", directive));
  }
  line
}

/// An artifact dropped by a skip directive.
pub fn print_pruned(id: impl Display, directive: impl Display) {
  println!("  {} {} ({})", symbols::REMOVE, id, directive);
}

pub fn print_removed(path: &Path) {
  println!("  {} {}", symbols::REMOVE, path.display());
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
