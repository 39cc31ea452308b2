//! Content fingerprints.
//!
//! The index treats a fingerprint as an opaque string. A [`Fingerprinter`]
//! produces it from file bytes and defines how far apart two of them are.

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Serialized fingerprint as stored in the index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes fingerprints and compares them.
///
/// Called from the blocking thread pool, so implementations may do CPU-heavy
/// work synchronously.
pub trait Fingerprinter: Send + Sync {
    fn fingerprint(&self, content: &[u8]) -> Result<Fingerprint>;

    /// Dissimilarity of two fingerprints; 0 means identical.
    fn distance(&self, a: &Fingerprint, b: &Fingerprint) -> Result<u32>;

    fn name(&self) -> &'static str;
}

/// blake3 digest, hex encoded. Distance is the number of differing bits.
///
/// Only distance 0 means anything: any content change flips about half the
/// bits, so this fingerprinter finds exact duplicates, not similar files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Fingerprinter;

impl Blake3Fingerprinter {
    fn parse(fingerprint: &Fingerprint) -> Result<blake3::Hash> {
        blake3::Hash::from_hex(fingerprint.as_str()).map_err(|e| {
            IndexError::Fingerprint(format!("not a blake3 digest '{}': {}", fingerprint, e))
        })
    }
}

impl Fingerprinter for Blake3Fingerprinter {
    fn fingerprint(&self, content: &[u8]) -> Result<Fingerprint> {
        Ok(Fingerprint(blake3::hash(content).to_hex().to_string()))
    }

    fn distance(&self, a: &Fingerprint, b: &Fingerprint) -> Result<u32> {
        let a = Self::parse(a)?;
        let b = Self::parse(b)?;
        Ok(a.as_bytes()
            .iter()
            .zip(b.as_bytes())
            .map(|(x, y)| (x ^ y).count_ones())
            .sum())
    }

    fn name(&self) -> &'static str {
        "blake3"
    }
}

/// Read a file and fingerprint it on the blocking pool.
pub async fn fingerprint_file(
    fingerprinter: Arc<dyn Fingerprinter>,
    path: &Path,
) -> Result<Fingerprint> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| IndexError::file_access(path, e))?;
    tokio::task::spawn_blocking(move || fingerprinter.fingerprint(&content)).await?
}
