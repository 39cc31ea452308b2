//! `hashdex index`: build, maintain, and inspect the index.
//!
//! Actions run in a fixed order regardless of flag order: reset, open,
//! delete, import, remap, index (and purge), directory listings, stats,
//! queries.

use super::error::HelpfulError;
use super::output::{format_differences, format_size, format_timestamp, print_table};
use super::CliContext;
use anyhow::{Context, Result};
use hashdex::{
    describe_differences, FileIndex, FileRecord, ImportOptions, IndexOptions, IndexProgress,
    RemapSpec,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::mpsc;
use tracing::info;

/// Arguments for the index command
#[derive(Debug, clap::Args)]
pub struct IndexArgs {
    /// Directories to index
    pub dirs: Vec<PathBuf>,

    /// Reuse fingerprints of files that moved (same name, size, and time)
    #[arg(long = "move")]
    pub move_detection: bool,

    /// Remove records of files that no longer exist
    #[arg(long)]
    pub purge: bool,

    /// Merge records from another index file (repeatable)
    #[arg(long = "import", value_name = "INDEX")]
    pub imports: Vec<PathBuf>,

    /// Rewrite foreign path separators after importing
    #[arg(long)]
    pub normalize_separators: bool,

    /// Delete the index file before doing anything else
    #[arg(long)]
    pub reset: bool,

    /// Glob of files to skip; prefix with ! to re-include (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub excludes: Vec<String>,

    /// Move records from one directory to another (repeatable)
    #[arg(long = "remap", value_name = "FROM:TO")]
    pub remaps: Vec<String>,

    /// Delete records at or below a directory (repeatable)
    #[arg(long = "delete", value_name = "DIR")]
    pub deletes: Vec<String>,

    /// Show record and directory counts
    #[arg(long)]
    pub stat: bool,

    /// Show top-level indexed directories
    #[arg(long)]
    pub rootdirs: bool,

    /// Show every indexed directory
    #[arg(long = "dirs")]
    pub list_dirs: bool,

    /// Show indexed files matching a glob (repeatable)
    #[arg(long = "query", value_name = "GLOB")]
    pub queries: Vec<String>,

    /// Case-insensitive globs (default: true on Windows)
    #[arg(long, value_name = "BOOL", action = clap::ArgAction::Set)]
    pub icase: Option<bool>,
}

pub async fn run(args: IndexArgs, ctx: &CliContext) -> Result<()> {
    // Reject bad remaps before touching anything
    let remaps = args
        .remaps
        .iter()
        .map(|spec| RemapSpec::parse(spec).map_err(|_| HelpfulError::invalid_remap(spec)))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let case_insensitive = args.icase.unwrap_or(ctx.config.case_insensitive);

    if args.reset && FileIndex::reset(&ctx.db_path)? {
        println!("Deleted {}", ctx.db_path.display());
    }

    let index = FileIndex::open_with_config(&ctx.db_path, &ctx.config)
        .await
        .with_context(|| format!("Failed to open index {}", ctx.db_path.display()))?;

    for dir in &args.deletes {
        let deleted = index.delete_dir(dir).await.map_err(HelpfulError::from)?;
        println!("{} records deleted under {}", deleted, dir);
    }

    for source in &args.imports {
        println!("Importing {}...", source.display());
        let summary = index
            .import(
                source,
                ImportOptions {
                    normalize_separators: args.normalize_separators,
                },
            )
            .await
            .map_err(HelpfulError::from)?;
        println!("{} records imported", summary.imported);
    }

    for remap in &remaps {
        let changed = index.remap(&remap.from, &remap.to).await?;
        println!("{} records remapped from {} to {}", changed, remap.from, remap.to);
    }

    if !args.dirs.is_empty() {
        let mut exclude = ctx.config.exclude.clone();
        exclude.extend(args.excludes.iter().cloned());

        let options = IndexOptions {
            move_detection: args.move_detection,
            exclude,
            case_insensitive,
            purge: args.purge,
        };

        let (progress_tx, progress_rx) = mpsc::channel::<IndexProgress>();
        let bar_thread = std::thread::spawn(move || show_progress(progress_rx));

        let result = index
            .index_files(args.dirs.as_slice(), &options, Some(progress_tx))
            .await;
        // Sender is dropped with index_files; the bar thread ends on its own
        let _ = bar_thread.join();
        let summary = result.map_err(HelpfulError::from)?;

        if !summary.failures.is_empty() {
            eprintln!("{} files skipped:", summary.failures.len());
            for failure in &summary.failures {
                eprintln!("  {}: {}", failure.path.display(), failure.message);
            }
        }
        println!(
            "{} new, {} moved, {} removed.",
            summary.hashed, summary.moved, summary.purged
        );
    } else if args.purge {
        let removed = index.purge().await?;
        println!("{} removed.", removed);
    }

    if args.rootdirs {
        print_directories(&index, true).await?;
    }

    if args.list_dirs {
        print_directories(&index, false).await?;
    }

    if args.stat {
        let stats = index.stats().await?;
        println!("{}:", index.path().display());
        println!("        files: {}", stats.files);
        println!("  directories: {}", stats.directories);
    }

    if !args.queries.is_empty() {
        let mut total = 0;
        for pattern in &args.queries {
            let matches = index
                .query(pattern, case_insensitive)
                .await
                .map_err(HelpfulError::from)?;
            for record in &matches {
                print_match(&index, record).await?;
            }
            total += matches.len();
        }
        println!("{} files found", total);
    }

    info!(db = %ctx.db_path.display(), "Index command finished");
    index.close().await;
    Ok(())
}

fn show_progress(progress_rx: mpsc::Receiver<IndexProgress>) {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {wide_msg}") {
        bar.set_style(style);
    }

    for update in progress_rx {
        bar.set_length(update.total as u64);
        bar.set_position(update.position as u64 + 1);
        bar.set_message(update.path.display().to_string());
    }

    bar.finish_and_clear();
}

async fn print_directories(index: &FileIndex, collapse: bool) -> Result<()> {
    let rows = index
        .directories(collapse)
        .await?
        .into_iter()
        .map(|d| [d.file_count.to_string(), d.dir]);
    print_table(["FILES", "DIRECTORY"], rows);
    Ok(())
}

async fn print_match(index: &FileIndex, record: &FileRecord) -> Result<()> {
    println!("{}", record.path());
    println!("  - size: {} ({})", record.size, format_size(record.size.max(0) as u64));
    println!("  - time: {}", format_timestamp(record.modified()));
    println!("  - hash: {}", record.hash);

    let same_name: Vec<FileRecord> = index
        .query_by_name(&record.name)
        .await?
        .into_iter()
        .filter(|other| other.id != record.id)
        .collect();
    if !same_name.is_empty() {
        println!("  - files with same name:");
        for other in &same_name {
            let diffs = describe_differences(other, record);
            println!("    - {}{}", other.path(), format_differences(&diffs));
        }
    }

    let same_content: Vec<FileRecord> = index
        .query_by_hash(&record.hash)
        .await?
        .into_iter()
        .filter(|other| other.id != record.id)
        .collect();
    if !same_content.is_empty() {
        println!("  - files with same content:");
        for other in &same_content {
            let diffs = describe_differences(other, record);
            println!("    - {}{}", other.path(), format_differences(&diffs));
        }
    }

    Ok(())
}
