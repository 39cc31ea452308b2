//! Configuration for hashdex
//!
//! Read from `<hashdex home>/config.toml` when present. Every field has a
//! default, so a missing or partial file is fine.

use crate::error::{IndexError, Result};
use hashdex_db::DEFAULT_DB_FILE_NAME;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HashdexConfig {
    /// Index file to use when `--db` is not given
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Files processed per committed transaction while indexing
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum number of results from a similarity query
    #[serde(default = "default_similar_limit")]
    pub similar_limit: usize,

    /// Default case sensitivity for exclude and query globs
    #[serde(default = "default_case_insensitive")]
    pub case_insensitive: bool,

    /// Exclude rules applied before any given on the command line
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_batch_size() -> usize {
    10
}

fn default_similar_limit() -> usize {
    10
}

fn default_case_insensitive() -> bool {
    cfg!(windows)
}

impl Default for HashdexConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            batch_size: default_batch_size(),
            similar_limit: default_similar_limit(),
            case_insensitive: default_case_insensitive(),
            exclude: Vec::new(),
        }
    }
}

impl HashdexConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HashdexConfig =
            toml::from_str(&content).map_err(|e| IndexError::Config(e.to_string()))?;
        if config.batch_size == 0 {
            return Err(IndexError::Config("batch_size must be at least 1".into()));
        }
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Location of the config file: `<hashdex home>/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let home = hashdex_logging::hashdex_home().map_err(|e| IndexError::Config(e.to_string()))?;
        Ok(home.join("config.toml"))
    }

    /// Pick the index file: an explicit path wins over the configured one,
    /// which wins over `~/.hashdex.db`.
    ///
    /// A path naming an existing directory gets the default file name
    /// appended.
    pub fn resolve_db_path(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        let path = match explicit.or(self.database_path.as_deref()) {
            Some(path) => path.to_path_buf(),
            None => dirs::home_dir()
                .ok_or_else(|| IndexError::Config("Could not determine home directory".into()))?
                .join(DEFAULT_DB_FILE_NAME),
        };

        if path.is_dir() {
            Ok(path.join(DEFAULT_DB_FILE_NAME))
        } else {
            Ok(path)
        }
    }
}
