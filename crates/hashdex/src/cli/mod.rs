//! CLI module for hashdex
//!
//! Thin command layer over the library: argument structs, console output,
//! and error presentation.

pub mod error;
pub mod fingerprint;
pub mod index;
pub mod output;

use hashdex::HashdexConfig;
use std::path::PathBuf;

/// Settings resolved once from global flags and the config file
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config: HashdexConfig,
    pub db_path: PathBuf,
}
