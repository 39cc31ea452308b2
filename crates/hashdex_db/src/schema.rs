//! Versioned schema for the index.
//!
//! All CREATE statements live here. Each migration runs once, inside its own
//! transaction, and is recorded in `schema_migrations`.

use crate::error::{DbError, Result};
use crate::IndexDb;
use sqlx::Row;
use std::collections::HashSet;
use tracing::{debug, info};

/// One ordered schema upgrade step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub statements: &'static [&'static str],
}

/// Upgrade steps in the order they must be applied.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_files",
        statements: &[
            r#"CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                dir TEXT NOT NULL,                 -- directory containing the file
                name TEXT NOT NULL,                -- file name only
                size INTEGER NOT NULL,             -- bytes
                timestamp INTEGER NOT NULL,        -- mtime, ms since epoch
                hash TEXT NOT NULL                 -- serialized fingerprint
            )"#,
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_files_dir_name ON files(dir, name)",
            "CREATE INDEX IF NOT EXISTS idx_files_name ON files(name)",
            "CREATE INDEX IF NOT EXISTS idx_files_hash ON files(hash)",
        ],
    },
    Migration {
        version: 2,
        name: "index_move_key",
        statements: &[
            "CREATE INDEX IF NOT EXISTS idx_files_move_key ON files(name, size, timestamp)",
        ],
    },
];

impl IndexDb {
    /// Apply every migration that has not been recorded yet.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        let applied = self.applied_migrations().await?;

        for migration in MIGRATIONS {
            if applied.contains(&migration.version) {
                continue;
            }
            self.apply_migration(migration).await?;
        }

        debug!(versions = MIGRATIONS.len(), "Index schema verified");
        Ok(())
    }

    /// Versions recorded in `schema_migrations`.
    pub async fn applied_migrations(&self) -> Result<HashSet<i64>> {
        let rows = sqlx::query("SELECT version FROM schema_migrations")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get::<i64, _>("version")).collect())
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<()> {
        let wrap = |source: sqlx::Error| DbError::Migration {
            version: migration.version,
            name: migration.name,
            source,
        };

        let mut tx = self.pool.begin().await.map_err(wrap)?;
        for statement in migration.statements {
            sqlx::query(*statement)
                .execute(&mut *tx)
                .await
                .map_err(wrap)?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .bind(Self::now_millis())
            .execute(&mut *tx)
            .await
            .map_err(wrap)?;
        tx.commit().await.map_err(wrap)?;

        info!(version = migration.version, name = migration.name, "Applied migration");
        Ok(())
    }
}
