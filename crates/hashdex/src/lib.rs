//! hashdex - persistent file fingerprint index
//!
//! Walks directories, fingerprints file contents, and keeps the results in
//! an SQLite index keyed by `(directory, name)`. Unchanged files are never
//! re-read, moved files can reuse their old fingerprint, and the index can be
//! queried by glob, name, content, or fingerprint similarity.

pub mod config;
pub mod error;
pub mod exclude;
pub mod fingerprint;
pub mod glob;
pub mod index;

pub use config::HashdexConfig;
pub use error::{IndexError, Result};
pub use exclude::ExcludeRules;
pub use fingerprint::{Blake3Fingerprinter, Fingerprint, Fingerprinter};
pub use glob::{glob_to_regex, GlobError, GlobPattern};
pub use hashdex_db::{DirectoryCount, FileRecord, IndexStats};
pub use index::{
    describe_differences, Difference, FileIndex, ImportOptions, ImportSummary, IndexFailure,
    IndexOptions, IndexProgress, IndexSummary, IndexedFile, Outcome, RemapSpec, SimilarFile,
};
