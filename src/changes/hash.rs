// src/changes/hash.rs

//! Content fingerprints for change detection.

use std::fmt;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::fs::FileSystem;

/// Sentinel used in place of a hash for files that no longer exist.
pub const DELETED: &str = "deleted";

/// Content fingerprint of a single file.
///
/// Serialized as the bare hex hash, or as [`DELETED`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Fingerprint {
    Hash(String),
    Deleted,
}

impl Fingerprint {
    pub fn is_deleted(&self) -> bool {
        matches!(self, Fingerprint::Deleted)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        if s == DELETED {
            Fingerprint::Deleted
        } else {
            Fingerprint::Hash(s)
        }
    }
}

impl From<Fingerprint> for String {
    fn from(f: Fingerprint) -> Self {
        match f {
            Fingerprint::Hash(h) => h,
            Fingerprint::Deleted => DELETED.to_string(),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fingerprint::Hash(h) => f.write_str(h),
            Fingerprint::Deleted => f.write_str(DELETED),
        }
    }
}

/// Compute the blake3 hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut reader = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("reading file for hashing: {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Fingerprint of the file as it is now: its hash, or `Deleted` if it is
/// gone. Errors other than absence are returned.
pub fn live_fingerprint(fs: &dyn FileSystem, path: &Path) -> Result<Fingerprint> {
    if !fs.exists(path) {
        return Ok(Fingerprint::Deleted);
    }
    compute_file_hash(fs, path).map(Fingerprint::Hash)
}
