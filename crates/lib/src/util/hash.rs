//! Content digests for finished build outputs.
//!
//! Every artifact the driver completes is recorded in the build report
//! together with the SHA-256 of its output, so two runs can be compared
//! without keeping the binaries around.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A full 64-character SHA-256 digest.
///
/// # Format
///
/// Lowercase hexadecimal, e.g. `"e3b0c442...b855"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl ContentHash {
  /// First twelve characters, enough for terminal output.
  pub fn short(&self) -> &str {
    &self.0[..self.0.len().min(12)]
  }
}

/// Hash a file's contents, streaming in 64 KiB chunks.
pub fn hash_file(path: &Path) -> io::Result<ContentHash> {
  let mut file = File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buffer = vec![0u8; 64 * 1024];

  loop {
    let read = file.read(&mut buffer)?;
    if read == 0 {
      break;
    }
    hasher.update(&buffer[..read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  ContentHash(hex::encode(Sha256::digest(data)))
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  #[test]
  fn empty_input_has_known_digest() {
    assert_eq!(
      hash_bytes(b"").0,
      "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
  }

  #[test]
  fn file_hash_matches_byte_hash() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("n8");
    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, &data).unwrap();

    assert_eq!(hash_file(&path).unwrap(), hash_bytes(&data));
  }

  #[test]
  fn missing_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    assert!(hash_file(&temp.path().join("absent")).is_err());
  }

  #[test]
  fn short_form_is_prefix() {
    let hash = hash_bytes(b"n8");
    assert_eq!(hash.short().len(), 12);
    assert!(hash.0.starts_with(hash.short()));
  }
}
