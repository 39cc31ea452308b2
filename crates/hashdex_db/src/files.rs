//! Record operations on the `files` table.
//!
//! Lookups and upserts used by the indexing loop take a bare connection so
//! they run inside whatever transaction or savepoint the caller holds. Bulk
//! maintenance operations own their transaction.

use crate::error::{DbError, Result};
use crate::types::{DirectoryCount, FileRecord, IndexStats, NewFile};
use crate::IndexDb;
use sqlx::{Connection, Sqlite, SqliteConnection, Transaction};
use std::path::Path;
use tracing::{debug, info, warn};

const SELECT_FILES: &str = "SELECT id, dir, name, size, timestamp, hash FROM files";

/// Row counts reported by [`IndexDb::import_from`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounts {
    /// Rows inserted or overwritten from the source index
    pub imported: u64,
    /// Rows whose directory had foreign separators rewritten
    pub normalized: u64,
}

// Per-file operations (run on the caller's connection/transaction)
impl IndexDb {
    /// Open a savepoint on a connection that is already inside a transaction.
    pub async fn savepoint(conn: &mut SqliteConnection) -> Result<Transaction<'_, Sqlite>> {
        Ok(Connection::begin(conn).await?)
    }

    /// Record at exactly this location whose size and timestamp are unchanged.
    pub async fn find_exact(
        conn: &mut SqliteConnection,
        dir: &str,
        name: &str,
        size: i64,
        timestamp: i64,
    ) -> Result<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(&format!(
            "{SELECT_FILES} WHERE dir = ? AND name = ? AND size = ? AND timestamp = ?"
        ))
        .bind(dir)
        .bind(name)
        .bind(size)
        .bind(timestamp)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(record)
    }

    /// Oldest record anywhere with the same move key `(name, size, timestamp)`.
    pub async fn find_moved(
        conn: &mut SqliteConnection,
        name: &str,
        size: i64,
        timestamp: i64,
    ) -> Result<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(&format!(
            "{SELECT_FILES} WHERE name = ? AND size = ? AND timestamp = ? ORDER BY id LIMIT 1"
        ))
        .bind(name)
        .bind(size)
        .bind(timestamp)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(record)
    }

    /// Insert a record, or update the existing one at `(dir, name)` in place.
    pub async fn upsert_file(conn: &mut SqliteConnection, file: &NewFile<'_>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO files (dir, name, size, timestamp, hash)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(dir, name) DO UPDATE SET
                size = excluded.size,
                timestamp = excluded.timestamp,
                hash = excluded.hash
            "#,
        )
        .bind(file.dir)
        .bind(file.name)
        .bind(file.size)
        .bind(file.timestamp)
        .bind(file.hash)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

// Lookups
impl IndexDb {
    /// Every record in insertion order.
    pub async fn all_files(&self) -> Result<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(&format!("{SELECT_FILES} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Records with this exact file name, in insertion order.
    pub async fn files_by_name(&self, name: &str) -> Result<Vec<FileRecord>> {
        let records =
            sqlx::query_as::<_, FileRecord>(&format!("{SELECT_FILES} WHERE name = ? ORDER BY id"))
                .bind(name)
                .fetch_all(&self.pool)
                .await?;
        Ok(records)
    }

    /// Records with this exact fingerprint, in insertion order.
    pub async fn files_by_hash(&self, hash: &str) -> Result<Vec<FileRecord>> {
        let records =
            sqlx::query_as::<_, FileRecord>(&format!("{SELECT_FILES} WHERE hash = ? ORDER BY id"))
                .bind(hash)
                .fetch_all(&self.pool)
                .await?;
        Ok(records)
    }

    /// Record count and distinct directory count.
    pub async fn stats(&self) -> Result<IndexStats> {
        let (files, directories): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(DISTINCT dir) FROM files")
                .fetch_one(&self.pool)
                .await?;
        Ok(IndexStats { files, directories })
    }

    /// Record count per directory, sorted by directory.
    pub async fn directories(&self) -> Result<Vec<DirectoryCount>> {
        let rows = sqlx::query_as::<_, DirectoryCount>(
            "SELECT dir, COUNT(*) AS file_count FROM files GROUP BY dir ORDER BY dir",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

// Bulk maintenance
impl IndexDb {
    /// Delete records by id in a single transaction.
    pub async fn delete_files(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;
        for id in ids {
            deleted += sqlx::query("DELETE FROM files WHERE id = ?")
                .bind(*id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        debug!(deleted, "Deleted file records");
        Ok(deleted)
    }

    /// Rewrite the directory of every record at or below `from` so it sits
    /// at or below `to` instead.
    ///
    /// `from` matches a directory only on a separator boundary, so
    /// `/data` does not touch `/database`. When a rewritten row lands on an
    /// existing `(dir, name)`, the rewritten row wins.
    pub async fn remap_dir(&self, from: &str, to: &str, separator: char) -> Result<u64> {
        let (prefix, prefix_len) = boundary_prefix(from, separator);
        // SUBSTR(dir, prefix_len) is the remainder with its leading separator;
        // a root target already ends in one
        let suffix_start = if to.ends_with(separator) {
            prefix_len + 1
        } else {
            prefix_len
        };

        let result = sqlx::query(
            r#"
            UPDATE OR REPLACE files
            SET dir = CASE WHEN dir = ? THEN ? ELSE ? || SUBSTR(dir, ?) END
            WHERE dir = ? OR SUBSTR(dir, 1, ?) = ?
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(to)
        .bind(suffix_start)
        .bind(from)
        .bind(prefix_len)
        .bind(&prefix)
        .execute(&self.pool)
        .await?;

        let changed = result.rows_affected();
        info!(from, to, changed, "Remapped directories");
        Ok(changed)
    }

    /// Delete every record at or below `dir` (same boundary rule as
    /// [`IndexDb::remap_dir`]).
    pub async fn delete_dir(&self, dir: &str, separator: char) -> Result<u64> {
        let (prefix, prefix_len) = boundary_prefix(dir, separator);

        let result = sqlx::query("DELETE FROM files WHERE dir = ? OR SUBSTR(dir, 1, ?) = ?")
            .bind(dir)
            .bind(prefix_len)
            .bind(&prefix)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        info!(dir, deleted, "Deleted directory records");
        Ok(deleted)
    }

    /// Merge every record of another index file into this one.
    ///
    /// Rows at an existing `(dir, name)` are overwritten by the imported row.
    /// With `normalize = Some((foreign, host))`, every stored directory has
    /// `foreign` separators rewritten to `host` in the same transaction. The
    /// copy commits or rolls back as a unit and the source is always detached.
    pub async fn import_from(
        &self,
        source: &Path,
        normalize: Option<(char, char)>,
    ) -> Result<ImportCounts> {
        if !source.is_file() {
            return Err(DbError::not_found(format!(
                "Index not found: {}",
                source.display()
            )));
        }

        let mut conn = self.pool.acquire().await?;

        // ATTACH is not allowed inside a transaction
        sqlx::query("ATTACH DATABASE ? AS other")
            .bind(source.to_string_lossy().into_owned())
            .execute(&mut *conn)
            .await?;

        let copied = Self::copy_attached(&mut conn, normalize).await;

        let detached = sqlx::query("DETACH DATABASE other").execute(&mut *conn).await;
        if let Err(err) = &detached {
            warn!(error = %err, "Failed to detach imported index");
        }

        let counts = copied?;
        detached?;

        info!(
            source = %source.display(),
            imported = counts.imported,
            normalized = counts.normalized,
            "Imported index"
        );
        Ok(counts)
    }

    async fn copy_attached(
        conn: &mut SqliteConnection,
        normalize: Option<(char, char)>,
    ) -> Result<ImportCounts> {
        let mut tx = conn.begin().await?;
        match Self::copy_rows(&mut tx, normalize).await {
            Ok(counts) => {
                tx.commit().await?;
                Ok(counts)
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err)
            }
        }
    }

    async fn copy_rows(
        conn: &mut SqliteConnection,
        normalize: Option<(char, char)>,
    ) -> Result<ImportCounts> {
        // Older indexes may hold fractional millisecond timestamps (stored as
        // REAL), so numeric columns are cast on the way in.
        // `WHERE true` keeps SQLite from reading ON CONFLICT as a join clause
        let imported = sqlx::query(
            r#"
            INSERT INTO files (dir, name, size, timestamp, hash)
            SELECT dir, name, CAST(size AS INTEGER), CAST(timestamp AS INTEGER), hash
            FROM other.files WHERE true
            ON CONFLICT(dir, name) DO UPDATE SET
                size = excluded.size,
                timestamp = excluded.timestamp,
                hash = excluded.hash
            "#,
        )
        .execute(&mut *conn)
        .await?
        .rows_affected();

        let mut normalized = 0;
        if let Some((foreign, host)) = normalize {
            let foreign = foreign.to_string();
            normalized = sqlx::query(
                "UPDATE OR REPLACE files SET dir = REPLACE(dir, ?, ?) WHERE INSTR(dir, ?) > 0",
            )
            .bind(&foreign)
            .bind(host.to_string())
            .bind(&foreign)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        }

        Ok(ImportCounts {
            imported,
            normalized,
        })
    }
}

/// `dir` plus a trailing separator, and its length in characters (SQLite
/// `SUBSTR` counts characters). A root that already ends in the separator is
/// used as is.
fn boundary_prefix(dir: &str, separator: char) -> (String, i64) {
    let prefix = if dir.ends_with(separator) {
        dir.to_string()
    } else {
        format!("{dir}{separator}")
    };
    let len = prefix.chars().count() as i64;
    (prefix, len)
}
