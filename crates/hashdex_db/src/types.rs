//! Row types stored in the index.

use serde::{Deserialize, Serialize};

/// One indexed file: content identity `(dir, name)` plus its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FileRecord {
    /// Surrogate key; reflects insertion order
    pub id: i64,
    /// Directory containing the file (absolute, host separators)
    pub dir: String,
    /// File name without directory
    pub name: String,
    /// Size in bytes
    pub size: i64,
    /// Modification time in milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Opaque serialized fingerprint
    pub hash: String,
}

impl FileRecord {
    /// Full path of the file, joined with the given separator.
    pub fn path_with(&self, separator: char) -> String {
        let mut path = String::with_capacity(self.dir.len() + self.name.len() + 1);
        path.push_str(&self.dir);
        if !self.dir.ends_with(separator) {
            path.push(separator);
        }
        path.push_str(&self.name);
        path
    }

    /// Full path of the file using the host separator.
    pub fn path(&self) -> String {
        self.path_with(std::path::MAIN_SEPARATOR)
    }

    /// Modification time as a UTC datetime.
    pub fn modified(&self) -> chrono::DateTime<chrono::Utc> {
        crate::IndexDb::millis_to_datetime(self.timestamp)
    }
}

/// Values written by an upsert. `(dir, name)` decides which row is replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile<'a> {
    pub dir: &'a str,
    pub name: &'a str,
    pub size: i64,
    pub timestamp: i64,
    pub hash: &'a str,
}

/// Number of records stored under one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DirectoryCount {
    pub dir: String,
    pub file_count: i64,
}

/// Summary counts for the whole index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub files: i64,
    pub directories: i64,
}
