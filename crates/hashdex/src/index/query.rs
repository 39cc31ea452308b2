//! Lookups over the index: glob, name, fingerprint, similarity, and
//! directory summaries.

use super::FileIndex;
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::glob::GlobPattern;
use hashdex_db::{DirectoryCount, FileRecord, IndexStats};
use std::fmt;
use std::path::MAIN_SEPARATOR;
use tracing::debug;

/// A record and its distance from the query fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarFile {
    pub record: FileRecord,
    pub distance: u32,
}

/// How one record differs from another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difference {
    Larger,
    Smaller,
    Newer,
    Older,
    DifferentContent,
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Difference::Larger => "larger",
            Difference::Smaller => "smaller",
            Difference::Newer => "newer",
            Difference::Older => "older",
            Difference::DifferentContent => "different content",
        };
        f.write_str(label)
    }
}

/// Ways `other` differs from `reference`, in a fixed order.
pub fn describe_differences(other: &FileRecord, reference: &FileRecord) -> Vec<Difference> {
    let mut diffs = Vec::new();
    if other.size > reference.size {
        diffs.push(Difference::Larger);
    }
    if other.size < reference.size {
        diffs.push(Difference::Smaller);
    }
    if other.timestamp > reference.timestamp {
        diffs.push(Difference::Newer);
    }
    if other.timestamp < reference.timestamp {
        diffs.push(Difference::Older);
    }
    if other.hash != reference.hash {
        diffs.push(Difference::DifferentContent);
    }
    diffs
}

impl FileIndex {
    /// Records whose full path matches the glob, in insertion order.
    pub async fn query(&self, pattern: &str, case_insensitive: bool) -> Result<Vec<FileRecord>> {
        let glob = GlobPattern::compile_with(pattern, case_insensitive)?;
        let matches: Vec<FileRecord> = self
            .db
            .all_files()
            .await?
            .into_iter()
            .filter(|record| glob.is_match(&record.path_with(MAIN_SEPARATOR)))
            .collect();
        debug!(pattern, found = matches.len(), "Glob query");
        Ok(matches)
    }

    pub async fn query_by_name(&self, name: &str) -> Result<Vec<FileRecord>> {
        Ok(self.db.files_by_name(name).await?)
    }

    pub async fn query_by_hash(&self, hash: &str) -> Result<Vec<FileRecord>> {
        Ok(self.db.files_by_hash(hash).await?)
    }

    /// The closest records to `fingerprint`, nearest first.
    ///
    /// Ties keep insertion order. Records the fingerprinter cannot compare
    /// (e.g. written by another algorithm) are skipped.
    pub async fn query_similar(&self, fingerprint: &Fingerprint) -> Result<Vec<SimilarFile>> {
        let records = self.db.all_files().await?;
        let fingerprinter = self.fingerprinter.clone();
        let target = fingerprint.clone();
        let limit = self.similar_limit;

        let ranked = tokio::task::spawn_blocking(move || {
            let mut scored: Vec<SimilarFile> = records
                .into_iter()
                .filter_map(|record| {
                    let stored = Fingerprint::new(record.hash.clone());
                    match fingerprinter.distance(&target, &stored) {
                        Ok(distance) => Some(SimilarFile { record, distance }),
                        Err(err) => {
                            debug!(id = record.id, error = %err, "Skipping incomparable record");
                            None
                        }
                    }
                })
                .collect();
            // Stable: equal distances stay in id order
            scored.sort_by_key(|s| s.distance);
            scored.truncate(limit);
            scored
        })
        .await?;

        Ok(ranked)
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(self.db.stats().await?)
    }

    /// File counts per directory, sorted by directory.
    ///
    /// With `collapse`, directories below another listed directory are
    /// folded into it and their counts added.
    pub async fn directories(&self, collapse: bool) -> Result<Vec<DirectoryCount>> {
        let rows = self.db.directories().await?;
        if collapse {
            Ok(collapse_directories(rows, MAIN_SEPARATOR))
        } else {
            Ok(rows)
        }
    }
}

fn is_within(dir: &str, root: &str, separator: char) -> bool {
    match dir.strip_prefix(root) {
        Some("") => true,
        Some(rest) => root.ends_with(separator) || rest.starts_with(separator),
        None => false,
    }
}

/// Fold sorted directory counts into their top-most listed ancestor.
fn collapse_directories(rows: Vec<DirectoryCount>, separator: char) -> Vec<DirectoryCount> {
    let mut roots: Vec<DirectoryCount> = Vec::new();
    for row in rows {
        // Ancestors sort before descendants, so they are already in `roots`
        match roots
            .iter_mut()
            .rev()
            .find(|root| is_within(&row.dir, &root.dir, separator))
        {
            Some(root) => root.file_count += row.file_count,
            None => roots.push(row),
        }
    }
    roots
}
