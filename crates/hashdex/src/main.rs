//! hashdex command-line entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hashdex::HashdexConfig;
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

use cli::error::HelpfulError;
use cli::CliContext;

#[derive(Parser, Debug)]
#[command(name = "hashdex", version, about = "Persistent file fingerprint index")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Index file to use (default: ~/.hashdex.db; a directory gets .hashdex.db appended)
    #[arg(long, global = true, env = "HASHDEX_DB")]
    db: Option<PathBuf>,

    /// Config file (default: <hashdex home>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Update, maintain, and query the index
    Index(cli::index::IndexArgs),

    /// Fingerprint a file and compare it with another or with the index
    Fingerprint(cli::fingerprint::FingerprintArgs),
}

fn load_context(cli: &Cli) -> Result<CliContext> {
    let config = match &cli.config {
        Some(path) => HashdexConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => HashdexConfig::load_or_default(&HashdexConfig::default_path()?)?,
    };
    let db_path = config.resolve_db_path(cli.db.as_deref())?;
    Ok(CliContext { config, db_path })
}

async fn run_command(cli: Cli) -> Result<()> {
    let ctx = load_context(&cli)?;
    match cli.command {
        Commands::Index(args) => cli::index::run(args, &ctx).await,
        Commands::Fingerprint(args) => cli::fingerprint::run(args, &ctx).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match hashdex_logging::init_logging(hashdex_logging::LogConfig {
        app_name: "hashdex",
        verbose: cli.verbose,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };

    match run_command(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<HelpfulError>() {
                Some(helpful) => eprint!("{}", helpful),
                None => eprintln!("{:?}", err),
            }
            ExitCode::from(1)
        }
    }
}
