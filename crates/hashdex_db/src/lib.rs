//! SQLite store for the hashdex file index
//!
//! This crate owns every SQL statement the index runs. The `hashdex` crate
//! decides *what* to store; this crate decides *how*.
//!
//! # Usage
//!
//! ```rust,ignore
//! use hashdex_db::{IndexDb, NewFile};
//!
//! let db = IndexDb::open("/home/me/.hashdex.db").await?;
//!
//! let mut tx = db.begin().await?;
//! IndexDb::upsert_file(&mut tx, &NewFile { dir: "/photos", name: "a.jpg", size: 10, timestamp: 0, hash: "ff" }).await?;
//! tx.commit().await?;
//!
//! let same_name = db.files_by_name("a.jpg").await?;
//! ```

mod error;
mod files;
mod schema;
mod types;

pub use error::{DbError, Result};
pub use files::ImportCounts;
pub use schema::{Migration, MIGRATIONS};
pub use types::*;

pub use sqlx::{Sqlite, SqliteConnection, Transaction};

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name used when no explicit index path is given, or when the given
/// path is a directory.
pub const DEFAULT_DB_FILE_NAME: &str = ".hashdex.db";

/// The persistent file index.
///
/// Single writer, single process. Nothing here takes an external lock; two
/// processes writing the same file is unsupported.
#[derive(Clone, Debug)]
pub struct IndexDb {
    pool: SqlitePool,
    path: PathBuf,
}

impl IndexDb {
    /// Open or create an index at the given path.
    ///
    /// Applies any pending schema migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Self::connect(path, true).await?;
        db.ensure_schema().await?;

        info!(path = %path.display(), "Index opened");
        Ok(db)
    }

    /// Open an existing index (fails if it does not exist).
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(DbError::not_found(format!(
                "Index not found: {}",
                path.display()
            )));
        }

        let db = Self::connect(path, false).await?;
        db.ensure_schema().await?;
        Ok(db)
    }

    async fn connect(path: &Path, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Path of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the underlying connection pool (escape hatch for complex queries).
    ///
    /// Prefer using the typed methods instead.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a transaction. Nested `begin()` calls on it create savepoints.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Check out a single connection, for work that must stay on one
    /// connection (ATTACH is per connection).
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Delete an index file and its WAL/shared-memory siblings.
    ///
    /// Returns `true` if the main file existed.
    pub fn remove(path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        let existed = path.exists();
        if existed {
            std::fs::remove_file(path)?;
        }
        for suffix in ["-wal", "-shm"] {
            let mut sibling = path.as_os_str().to_owned();
            sibling.push(suffix);
            let sibling = PathBuf::from(sibling);
            if sibling.exists() {
                std::fs::remove_file(&sibling)?;
            }
        }
        debug!(path = %path.display(), existed, "Index removed");
        Ok(existed)
    }
}

// Timestamp utilities
impl IndexDb {
    /// Current time as milliseconds since Unix epoch.
    pub fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Convert milliseconds to DateTime.
    pub fn millis_to_datetime(millis: i64) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(millis).unwrap_or_else(chrono::Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_database() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("test.db");

        let db = IndexDb::open(&db_path).await.unwrap();
        assert!(db_path.exists());
        assert_eq!(db.path(), db_path.as_path());

        db.close().await;
    }

    #[tokio::test]
    async fn test_open_existing_fails_if_not_exists() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nonexistent.db");

        let result = IndexDb::open_existing(&db_path).await;
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_deletes_index_file() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("test.db");

        let db = IndexDb::open(&db_path).await.unwrap();
        db.close().await;

        assert!(IndexDb::remove(&db_path).unwrap());
        assert!(!db_path.exists());
        assert!(!IndexDb::remove(&db_path).unwrap());
    }

    #[test]
    fn test_millis_round_trip() {
        let dt = IndexDb::millis_to_datetime(1_737_187_200_123);
        assert_eq!(dt.timestamp_millis(), 1_737_187_200_123);
    }
}
