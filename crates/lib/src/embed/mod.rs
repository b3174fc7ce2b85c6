//! Binary resource embedding for the Windows installer.
//!
//! Each input file becomes a `std::array<unsigned char, N>` constant sized
//! to the file, and a second generated source maps every constant to the
//! path it is installed at. The installer program includes both.
//!
//! Generation is all-or-nothing: symbols are validated before any file is
//! touched, stale outputs are removed, every input is read before either
//! output is written, and each output is renamed into place from a
//! temporary file in the same directory.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{APP_NAME, EMBED_BYTES_PER_LINE, EMBED_CONSTANTS_FILE, EMBED_TABLE_FILE};

#[derive(Debug, Error)]
pub enum EmbedError {
  #[error("no resources to embed")]
  Empty,

  #[error("invalid symbol '{symbol}': {reason}")]
  InvalidSymbol { symbol: String, reason: &'static str },

  #[error("duplicate symbol '{0}'")]
  DuplicateSymbol(String),

  #[error("failed to read resource {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// One file to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
  pub source: PathBuf,
  pub symbol: String,
  /// Install path relative to the installation root.
  pub destination: String,
}

impl ResourceEntry {
  pub fn new(source: impl Into<PathBuf>, symbol: impl Into<String>, destination: impl Into<String>) -> Self {
    Self {
      source: source.into(),
      symbol: symbol.into(),
      destination: destination.into(),
    }
  }
}

/// What was written for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddedResource {
  pub symbol: String,
  pub len: usize,
  pub destination: String,
}

/// Paths of the two generated sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedOutputs {
  /// Byte-array constants.
  pub constants: PathBuf,
  /// `FileMapping` lookup table.
  pub table: PathBuf,
}

impl EmbedOutputs {
  /// The stock names, as included by the bundled installer source.
  pub fn in_dir(dir: &Path) -> Self {
    Self::named(dir, EMBED_CONSTANTS_FILE, EMBED_TABLE_FILE)
  }

  pub fn named(dir: &Path, constants: &str, table: &str) -> Self {
    Self {
      constants: dir.join(constants),
      table: dir.join(table),
    }
  }

  pub fn paths(&self) -> [&Path; 2] {
    [&self.constants, &self.table]
  }
}

const CPP_KEYWORDS: &[&str] = &[
  "alignas",
  "alignof",
  "and",
  "and_eq",
  "asm",
  "auto",
  "bitand",
  "bitor",
  "bool",
  "break",
  "case",
  "catch",
  "char",
  "char8_t",
  "char16_t",
  "char32_t",
  "class",
  "compl",
  "concept",
  "const",
  "consteval",
  "constexpr",
  "constinit",
  "const_cast",
  "continue",
  "co_await",
  "co_return",
  "co_yield",
  "decltype",
  "default",
  "delete",
  "do",
  "double",
  "dynamic_cast",
  "else",
  "enum",
  "explicit",
  "export",
  "extern",
  "false",
  "float",
  "for",
  "friend",
  "goto",
  "if",
  "inline",
  "int",
  "long",
  "mutable",
  "namespace",
  "new",
  "noexcept",
  "not",
  "not_eq",
  "nullptr",
  "operator",
  "or",
  "or_eq",
  "private",
  "protected",
  "public",
  "register",
  "reinterpret_cast",
  "requires",
  "return",
  "short",
  "signed",
  "sizeof",
  "static",
  "static_assert",
  "static_cast",
  "struct",
  "switch",
  "template",
  "this",
  "thread_local",
  "throw",
  "true",
  "try",
  "typedef",
  "typeid",
  "typename",
  "union",
  "unsigned",
  "using",
  "virtual",
  "void",
  "volatile",
  "wchar_t",
  "while",
  "xor",
  "xor_eq",
  // The generated table itself.
  "files",
  "FileMapping",
];

fn check_symbol(symbol: &str) -> Result<(), EmbedError> {
  let invalid = |reason| EmbedError::InvalidSymbol {
    symbol: symbol.to_string(),
    reason,
  };

  let mut chars = symbol.chars();
  match chars.next() {
    None => return Err(invalid("empty")),
    Some(c) if !(c.is_ascii_alphabetic() || c == '_') => return Err(invalid("must start with a letter or '_'")),
    Some(_) => {}
  }
  if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
    return Err(invalid("only ASCII letters, digits and '_' are allowed"));
  }
  if CPP_KEYWORDS.contains(&symbol) {
    return Err(invalid("reserved word"));
  }
  Ok(())
}

/// Check that every symbol is a usable, unique C++ identifier.
pub fn validate_symbols(entries: &[ResourceEntry]) -> Result<(), EmbedError> {
  let mut seen = HashSet::new();
  for entry in entries {
    check_symbol(&entry.symbol)?;
    if !seen.insert(entry.symbol.as_str()) {
      return Err(EmbedError::DuplicateSymbol(entry.symbol.clone()));
    }
  }
  Ok(())
}

/// Derive a symbol from an install path: `bin/n8.exe` becomes `bin_n8_exe`.
pub fn symbol_for(relative_path: &str) -> String {
  let mut symbol: String = relative_path
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
    .collect();
  if symbol.is_empty() || symbol.starts_with(|c: char| c.is_ascii_digit()) {
    symbol.insert(0, '_');
  }
  if CPP_KEYWORDS.contains(&symbol.as_str()) {
    symbol.push('_');
  }
  symbol
}

/// Render one byte-array constant.
pub fn render_constant(symbol: &str, bytes: &[u8]) -> String {
  if bytes.is_empty() {
    return format!("static constexpr std::array<unsigned char, 0> {} = {{}};\n", symbol);
  }

  let mut out = format!("static constexpr std::array<unsigned char, {}> {} = {{\n", bytes.len(), symbol);
  let lines: Vec<String> = bytes
    .chunks(EMBED_BYTES_PER_LINE)
    .map(|chunk| {
      let hex: Vec<String> = chunk.iter().map(|b| format!("0x{:02X}", b)).collect();
      format!("    {}", hex.join(", "))
    })
    .collect();
  out.push_str(&lines.join(",\n"));
  out.push_str("\n};\n");
  out
}

fn wide_literal(value: &str) -> String {
  let mut out = String::with_capacity(value.len() + 3);
  out.push_str("L\"");
  for c in value.chars() {
    match c {
      '\\' => out.push_str("\\\\"),
      '"' => out.push_str("\\\""),
      _ => out.push(c),
    }
  }
  out.push('"');
  out
}

/// Render the `FileMapping` table.
pub fn render_table(resources: &[EmbeddedResource]) -> String {
  let mut out = format!("// Generated by {}. Do not edit.\n\nconst FileMapping files[] = {{\n", APP_NAME);
  let rows: Vec<String> = resources
    .iter()
    .map(|r| {
      format!(
        "    {{ \"{sym}\", {sym}.data(), {sym}.size(), {dest} }}",
        sym = r.symbol,
        dest = wide_literal(&r.destination)
      )
    })
    .collect();
  out.push_str(&rows.join(",\n"));
  out.push_str("\n};\n");
  out
}

fn render_constants(blobs: &[(&ResourceEntry, Vec<u8>)]) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "// Generated by {}. Do not edit.", APP_NAME);
  out.push_str("#ifndef N8_EMBEDDED_FILES_H\n#define N8_EMBEDDED_FILES_H\n\n#include <array>\n\n");
  for (entry, bytes) in blobs {
    out.push_str(&render_constant(&entry.symbol, bytes));
    out.push('\n');
  }
  out.push_str("#endif\n");
  out
}

fn remove_stale(path: &Path) -> Result<(), EmbedError> {
  match std::fs::remove_file(path) {
    Ok(()) => {
      debug!(path = ?path, "removed previous generated source");
      Ok(())
    }
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(source) => Err(EmbedError::Write {
      path: path.to_path_buf(),
      source,
    }),
  }
}

fn write_atomic(path: &Path, content: &str) -> Result<(), EmbedError> {
  let write_err = |source| EmbedError::Write {
    path: path.to_path_buf(),
    source,
  };

  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  std::fs::create_dir_all(dir).map_err(write_err)?;

  let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
  temp.write_all(content.as_bytes()).map_err(write_err)?;
  temp.as_file().sync_all().map_err(write_err)?;
  temp.persist(path).map_err(|e| write_err(e.error))?;
  Ok(())
}

/// Generate both sources for `entries`.
pub fn embed(entries: &[ResourceEntry], outputs: &EmbedOutputs) -> Result<Vec<EmbeddedResource>, EmbedError> {
  if entries.is_empty() {
    return Err(EmbedError::Empty);
  }
  validate_symbols(entries)?;

  for path in outputs.paths() {
    remove_stale(path)?;
  }

  let mut blobs = Vec::with_capacity(entries.len());
  for entry in entries {
    let bytes = std::fs::read(&entry.source).map_err(|source| EmbedError::Read {
      path: entry.source.clone(),
      source,
    })?;
    debug!(symbol = %entry.symbol, len = bytes.len(), "read resource");
    blobs.push((entry, bytes));
  }

  let resources: Vec<EmbeddedResource> = blobs
    .iter()
    .map(|(entry, bytes)| EmbeddedResource {
      symbol: entry.symbol.clone(),
      len: bytes.len(),
      destination: entry.destination.clone(),
    })
    .collect();

  write_atomic(&outputs.constants, &render_constants(&blobs))?;
  write_atomic(&outputs.table, &render_table(&resources))?;

  info!(
    count = resources.len(),
    bytes = resources.iter().map(|r| r.len).sum::<usize>(),
    "generated embedded resources"
  );
  Ok(resources)
}
