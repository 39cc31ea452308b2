//! `hashdex fingerprint`: fingerprint a file, compare two, or find similar
//! indexed files.

use super::error::HelpfulError;
use super::output::print_table;
use super::CliContext;
use anyhow::{Context, Result};
use hashdex::fingerprint::fingerprint_file;
use hashdex::{Blake3Fingerprinter, FileIndex, Fingerprinter};
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments for the fingerprint command
#[derive(Debug, clap::Args)]
pub struct FingerprintArgs {
    /// File to fingerprint
    pub file: PathBuf,

    /// Optional second file to compare against
    pub other: Option<PathBuf>,
}

pub async fn run(args: FingerprintArgs, ctx: &CliContext) -> Result<()> {
    if !args.file.is_file() {
        return Err(HelpfulError::file_not_found(&args.file).into());
    }

    let fingerprinter: Arc<dyn Fingerprinter> = Arc::new(Blake3Fingerprinter);

    let fingerprint = fingerprint_file(fingerprinter.clone(), &args.file)
        .await
        .map_err(HelpfulError::from)?;
    println!("{}: {}", fingerprinter.name(), fingerprint);

    match args.other {
        Some(other) => {
            let other_fingerprint = fingerprint_file(fingerprinter.clone(), &other)
                .await
                .map_err(HelpfulError::from)?;
            println!("{}: {}", fingerprinter.name(), other_fingerprint);
            let distance = fingerprinter.distance(&fingerprint, &other_fingerprint)?;
            println!("distance: {}", distance);
        }
        None => {
            let index = FileIndex::open_with_config(&ctx.db_path, &ctx.config)
                .await
                .with_context(|| format!("Failed to open index {}", ctx.db_path.display()))?
                .with_fingerprinter(fingerprinter);
            let similar = index.query_similar(&fingerprint).await?;
            let rows = similar
                .into_iter()
                .map(|s| [s.distance.to_string(), s.record.path()]);
            print_table(["DISTANCE", "PATH"], rows);
            index.close().await;
        }
    }

    Ok(())
}
