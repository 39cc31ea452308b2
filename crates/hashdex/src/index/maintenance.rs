//! Purge, remap, delete, and import.

use super::FileIndex;
use crate::error::{IndexError, Result};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::str::FromStr;
use tracing::{debug, info};

/// A `from:to` directory rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapSpec {
    pub from: String,
    pub to: String,
}

impl RemapSpec {
    /// Parse `from:to`. Both sides must be non-empty and there must be
    /// exactly one `:`.
    pub fn parse(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.split(':').collect();
        match parts.as_slice() {
            [from, to] if !from.is_empty() && !to.is_empty() => Ok(Self {
                from: from.to_string(),
                to: to.to_string(),
            }),
            _ => Err(IndexError::invalid_argument(format!(
                "Invalid remap '{}', expected 'from:to'",
                spec
            ))),
        }
    }
}

impl FromStr for RemapSpec {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Options for [`FileIndex::import`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Rewrite the foreign separator to the host separator in every stored
    /// directory after the copy
    pub normalize_separators: bool,
}

/// Result of an import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub source: PathBuf,
    pub imported: u64,
    pub normalized: u64,
}

impl FileIndex {
    /// Delete records whose file no longer exists. Returns the number removed.
    pub async fn purge(&self) -> Result<u64> {
        let records = self.db.all_files().await?;
        let checked = records.len();

        let mut missing = Vec::new();
        for record in records {
            let path = record.path();
            // Only a definite "not there" counts; permission errors keep the record
            if let Ok(false) = tokio::fs::try_exists(&path).await {
                debug!(path = %path, "Missing, purging");
                missing.push(record.id);
            }
        }

        let removed = self.db.delete_files(&missing).await?;
        info!(checked, removed, "Purge complete");
        Ok(removed)
    }

    /// Move every record at or below `from` to the same place below `to`.
    pub async fn remap(&self, from: &str, to: &str) -> Result<u64> {
        let from = trim_separators(from);
        let to = trim_separators(to);
        if from.is_empty() || to.is_empty() {
            return Err(IndexError::invalid_argument("remap directories must not be empty"));
        }
        Ok(self.db.remap_dir(from, to, MAIN_SEPARATOR).await?)
    }

    /// Delete every record at or below `dir`.
    pub async fn delete_dir(&self, dir: &str) -> Result<u64> {
        let dir = trim_separators(dir);
        if dir.is_empty() {
            return Err(IndexError::invalid_argument("directory must not be empty"));
        }
        Ok(self.db.delete_dir(dir, MAIN_SEPARATOR).await?)
    }

    /// Merge another index file into this one as a single transaction.
    pub async fn import(&self, source: &Path, options: ImportOptions) -> Result<ImportSummary> {
        let failure = |reason: String| IndexError::ImportFailure {
            path: source.to_path_buf(),
            reason,
        };

        if !source.is_file() {
            return Err(failure("no such index file".to_string()));
        }

        let normalize = options
            .normalize_separators
            .then_some((foreign_separator(), MAIN_SEPARATOR));

        let counts = self
            .db
            .import_from(source, normalize)
            .await
            .map_err(|e| failure(e.to_string()))?;

        Ok(ImportSummary {
            source: source.to_path_buf(),
            imported: counts.imported,
            normalized: counts.normalized,
        })
    }
}

fn foreign_separator() -> char {
    if MAIN_SEPARATOR == '/' {
        '\\'
    } else {
        '/'
    }
}

/// Strip trailing separators, keeping a bare root intact.
fn trim_separators(dir: &str) -> &str {
    let trimmed = dir.trim_end_matches(['/', MAIN_SEPARATOR]);
    if trimmed.is_empty() && !dir.is_empty() {
        &dir[..1]
    } else {
        trimmed
    }
}
