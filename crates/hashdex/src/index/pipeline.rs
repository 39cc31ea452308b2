//! Directory walk to index update.
//!
//! Candidates are collected up front in a reproducible order, then processed
//! one at a time. Each file runs in its own savepoint inside a batch
//! transaction that commits every `batch_size` files, so an interrupted run
//! keeps everything up to the last commit and a rerun picks up from there.

use super::{FileIndex, IndexFailure, IndexOptions, IndexProgress, IndexSummary, IndexedFile, Outcome};
use crate::error::{IndexError, Result};
use crate::exclude::ExcludeRules;
use crate::fingerprint::{fingerprint_file, Fingerprint};
use hashdex_db::{IndexDb, NewFile, SqliteConnection};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

/// What the index needs to know about a file on disk
#[derive(Debug, Clone)]
struct FileStat {
    path: PathBuf,
    dir: String,
    name: String,
    size: i64,
    timestamp: i64,
}

impl FileIndex {
    /// Index every file below the given directories.
    ///
    /// Per-file problems (unreadable, vanished, not UTF-8, fingerprint
    /// failure) are logged and collected in [`IndexSummary::failures`]. Store
    /// errors abort the run; batches committed before the error stay.
    pub async fn index_files<P: AsRef<Path>>(
        &self,
        dirs: &[P],
        options: &IndexOptions,
        progress_tx: Option<mpsc::Sender<IndexProgress>>,
    ) -> Result<IndexSummary> {
        let start = Instant::now();
        let excluder = ExcludeRules::build(options.exclude.as_slice(), options.case_insensitive)?;

        let mut summary = IndexSummary::default();
        let candidates = collect_candidates(dirs, &excluder, &mut summary.failures);
        let total = candidates.len();
        info!(
            files = total,
            rules = excluder.len(),
            fingerprinter = self.fingerprinter.name(),
            "Indexing candidates collected"
        );

        let mut tx = self.db.begin().await?;
        let mut in_batch = 0;

        for (position, path) in candidates.into_iter().enumerate() {
            if let Some(ref sender) = progress_tx {
                let _ = sender.send(IndexProgress {
                    position,
                    total,
                    path: path.clone(),
                });
            }

            match self.index_one(&mut tx, &path, options.move_detection).await {
                Ok(indexed) => {
                    match indexed.outcome {
                        Outcome::Reused => summary.reused += 1,
                        Outcome::Moved => summary.moved += 1,
                        Outcome::Hashed => summary.hashed += 1,
                    }
                    summary.indexed.push(indexed);
                }
                Err(err) if err.is_per_file() => {
                    warn!(path = %path.display(), error = %err, "Skipping file");
                    summary.failures.push(IndexFailure {
                        path,
                        message: err.to_string(),
                    });
                }
                Err(err) => {
                    if let Err(rollback) = tx.rollback().await {
                        warn!(error = %rollback, "Failed to roll back batch");
                    }
                    return Err(err);
                }
            }

            in_batch += 1;
            if in_batch >= self.batch_size {
                tx.commit().await.map_err(hashdex_db::DbError::from)?;
                tx = self.db.begin().await?;
                trace!(position, "Committed batch");
                in_batch = 0;
            }
        }

        tx.commit().await.map_err(hashdex_db::DbError::from)?;

        if options.purge {
            summary.purged = self.purge().await?;
        }

        info!(
            hashed = summary.hashed,
            moved = summary.moved,
            reused = summary.reused,
            purged = summary.purged,
            failed = summary.failures.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Indexing complete"
        );

        Ok(summary)
    }

    /// Index a single file inside its own savepoint.
    async fn index_one(
        &self,
        conn: &mut SqliteConnection,
        path: &Path,
        move_detection: bool,
    ) -> Result<IndexedFile> {
        let stat = stat_file(path).await?;

        let mut savepoint = IndexDb::savepoint(conn).await?;
        match self.resolve(&mut savepoint, &stat, move_detection).await {
            Ok(indexed) => {
                savepoint.commit().await.map_err(hashdex_db::DbError::from)?;
                Ok(indexed)
            }
            Err(err) => {
                savepoint.rollback().await.map_err(hashdex_db::DbError::from)?;
                Err(err)
            }
        }
    }

    async fn resolve(
        &self,
        conn: &mut SqliteConnection,
        stat: &FileStat,
        move_detection: bool,
    ) -> Result<IndexedFile> {
        let existing =
            IndexDb::find_exact(conn, &stat.dir, &stat.name, stat.size, stat.timestamp).await?;
        if let Some(record) = existing {
            trace!(path = %stat.path.display(), "Unchanged");
            return Ok(IndexedFile {
                path: stat.path.clone(),
                fingerprint: Fingerprint::new(record.hash),
                outcome: Outcome::Reused,
            });
        }

        if move_detection {
            if let Some(record) = IndexDb::find_moved(conn, &stat.name, stat.size, stat.timestamp).await? {
                debug!(path = %stat.path.display(), from = %record.dir, "Detected move");
                IndexDb::upsert_file(conn, &stat.new_file(&record.hash)).await?;
                return Ok(IndexedFile {
                    path: stat.path.clone(),
                    fingerprint: Fingerprint::new(record.hash),
                    outcome: Outcome::Moved,
                });
            }
        }

        let fingerprint = fingerprint_file(self.fingerprinter.clone(), &stat.path).await?;
        IndexDb::upsert_file(conn, &stat.new_file(fingerprint.as_str())).await?;
        debug!(path = %stat.path.display(), "Fingerprinted");

        Ok(IndexedFile {
            path: stat.path.clone(),
            fingerprint,
            outcome: Outcome::Hashed,
        })
    }
}

impl FileStat {
    fn new_file<'a>(&'a self, hash: &'a str) -> NewFile<'a> {
        NewFile {
            dir: &self.dir,
            name: &self.name,
            size: self.size,
            timestamp: self.timestamp,
            hash,
        }
    }
}

/// Walk each directory (sorted by file name) and keep every non-directory
/// entry the excluder lets through. Walk errors are recorded and skipped.
fn collect_candidates<P: AsRef<Path>>(
    dirs: &[P],
    excluder: &ExcludeRules,
    failures: &mut Vec<IndexFailure>,
) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for dir in dirs {
        let dir = dir.as_ref();
        let root = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());

        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().unwrap_or(root.as_path()).to_path_buf();
                    warn!(path = %path.display(), error = %err, "Walk error");
                    failures.push(IndexFailure {
                        path,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.into_path();
            if excluder.is_excluded(&path.to_string_lossy()) {
                trace!(path = %path.display(), "Excluded");
                continue;
            }
            files.push(path);
        }
    }

    files
}

/// Resolve and stat a candidate. Anything other than a readable regular
/// file with a UTF-8 path is a per-file access error.
async fn stat_file(path: &Path) -> Result<FileStat> {
    let path = std::path::absolute(path).map_err(|e| IndexError::file_access(path, e))?;

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|e| IndexError::file_access(&path, e))?;
    if !metadata.is_file() {
        return Err(IndexError::file_access(
            &path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }

    let modified = metadata
        .modified()
        .map_err(|e| IndexError::file_access(&path, e))?;
    let timestamp = chrono::DateTime::<chrono::Utc>::from(modified).timestamp_millis();
    let size = i64::try_from(metadata.len()).unwrap_or(i64::MAX);

    let not_utf8 = || {
        IndexError::file_access(
            &path,
            io::Error::new(io::ErrorKind::InvalidData, "path is not valid UTF-8"),
        )
    };
    let dir = path
        .parent()
        .and_then(Path::to_str)
        .ok_or_else(not_utf8)?
        .to_string();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(not_utf8)?
        .to_string();

    Ok(FileStat {
        path,
        dir,
        name,
        size,
        timestamp,
    })
}
