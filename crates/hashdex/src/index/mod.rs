//! The file index: fingerprints keyed by `(directory, name)`.
//!
//! [`FileIndex`] wraps the store with the indexing pipeline, maintenance
//! operations (purge, remap, delete, import), and queries.

mod maintenance;
mod pipeline;
mod query;

pub use maintenance::{ImportOptions, ImportSummary, RemapSpec};
pub use query::{describe_differences, Difference, SimilarFile};

use crate::config::HashdexConfig;
use crate::error::Result;
use crate::fingerprint::{Blake3Fingerprinter, Fingerprint, Fingerprinter};
use hashdex_db::IndexDb;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options for one indexing run
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Reuse the fingerprint of a record with the same name, size, and
    /// modification time found in another directory
    pub move_detection: bool,
    /// Exclude rules, `!` prefix re-includes
    pub exclude: Vec<String>,
    /// Case-insensitive exclude matching
    pub case_insensitive: bool,
    /// Purge records of missing files after indexing
    pub purge: bool,
}

/// Progress update during indexing
#[derive(Debug, Clone)]
pub struct IndexProgress {
    /// Zero-based position of the file being processed
    pub position: usize,
    /// Number of candidate files
    pub total: usize,
    pub path: PathBuf,
}

/// How a file's fingerprint was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Unchanged since the last run; stored fingerprint reused
    Reused,
    /// Found under another directory; fingerprint carried over
    Moved,
    /// Read and fingerprinted
    Hashed,
}

/// One successfully indexed file
#[derive(Debug, Clone)]
pub struct IndexedFile {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    pub outcome: Outcome,
}

/// A file that was skipped
#[derive(Debug, Clone)]
pub struct IndexFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Result of an indexing run
#[derive(Debug, Clone, Default)]
pub struct IndexSummary {
    pub hashed: usize,
    pub moved: usize,
    pub reused: usize,
    pub purged: u64,
    /// Every file indexed, in processing order
    pub indexed: Vec<IndexedFile>,
    pub failures: Vec<IndexFailure>,
}

/// Persistent file index
pub struct FileIndex {
    db: IndexDb,
    fingerprinter: Arc<dyn Fingerprinter>,
    batch_size: usize,
    similar_limit: usize,
}

impl FileIndex {
    /// Wrap an open store with the default blake3 fingerprinter.
    pub fn new(db: IndexDb) -> Self {
        let defaults = HashdexConfig::default();
        Self {
            db,
            fingerprinter: Arc::new(Blake3Fingerprinter),
            batch_size: defaults.batch_size,
            similar_limit: defaults.similar_limit,
        }
    }

    /// Open or create the index file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(IndexDb::open(path).await?))
    }

    /// Open an index with the batch size and similarity limit from config.
    pub async fn open_with_config(path: impl AsRef<Path>, config: &HashdexConfig) -> Result<Self> {
        Ok(Self::open(path)
            .await?
            .with_batch_size(config.batch_size)
            .with_similar_limit(config.similar_limit))
    }

    pub fn with_fingerprinter(mut self, fingerprinter: Arc<dyn Fingerprinter>) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    /// Files per committed transaction (at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_similar_limit(mut self, limit: usize) -> Self {
        self.similar_limit = limit;
        self
    }

    pub fn db(&self) -> &IndexDb {
        &self.db
    }

    pub fn fingerprinter(&self) -> &Arc<dyn Fingerprinter> {
        &self.fingerprinter
    }

    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// Delete the index file at `path`. Returns `true` if it existed.
    pub fn reset(path: impl AsRef<Path>) -> Result<bool> {
        Ok(IndexDb::remove(path)?)
    }

    pub async fn close(self) {
        self.db.close().await;
    }
}
