//! # corpus-ingest CLI (`ingest`)
//!
//! The `ingest` binary runs the ingestion pipeline and its maintenance
//! passes against the configured MongoDB replica set.
//!
//! ## Usage
//!
//! ```bash
//! ingest --config ./config/ingest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ingest run` | Ingest the corpus, then validate and index |
//! | `ingest validate` | Run only the validation pass |
//! | `ingest indexes` | Create the text and embedding indexes |
//! | `ingest status` | Print server and replica-set information |
//!
//! ## Exit status
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Run completed (per-file failures included) |
//! | 1 | Configuration or other fatal error |
//! | 3 | Corpus directory missing |
//! | 4 | Document store unreachable |
//! | 5 | Embedding model unavailable |
//! | 130 | Interrupted (a second Ctrl-C aborts the file in flight) |

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use corpus_ingest::config::{self, Config};
use corpus_ingest::error::IngestError;
use corpus_ingest::indexes::{ensure_indexes, IndexOutcome};
use corpus_ingest::ingest::{run_ingest, watch_interrupts, RunOptions};
use corpus_ingest::progress::ProgressMode;
use corpus_ingest::store::mongo::MongoStore;
use corpus_ingest::store::{CountFilter, DocumentStore};
use corpus_ingest::telemetry;
use corpus_ingest::validate::validate_store;

const DEFAULT_CONFIG: &str = "./config/ingest.toml";

/// Idempotent corpus ingestion into a MongoDB replica set.
///
/// Every command accepts `--config`. Without it, `./config/ingest.toml` is
/// used when present and built-in defaults otherwise.
#[derive(Parser)]
#[command(name = "ingest", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest every corpus file, then run the validation and indexing passes.
    Run {
        /// Corpus directory; overrides `[corpus].root`.
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Maximum number of files to process.
        #[arg(long)]
        limit: Option<usize>,

        /// Decode and fingerprint only. No model, no database.
        #[arg(long)]
        dry_run: bool,

        /// Skip the validation pass.
        #[arg(long)]
        no_validate: bool,

        /// Skip the indexing pass.
        #[arg(long)]
        no_indexes: bool,

        /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Validate the stored collection without ingesting.
    Validate,

    /// Create the full-text and embedding indexes.
    Indexes,

    /// Show server version, replica-set members and document count.
    Status,
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => config::load_config(path),
        None => config::load_or_default(&PathBuf::from(DEFAULT_CONFIG)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Commands::Run {
        corpus: Some(corpus),
        ..
    } = &cli.command
    {
        cfg.corpus.root = corpus.clone();
    }

    let _log_guard = match telemetry::init(&cfg.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match execute(cli.command, &cfg).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    }
}

async fn execute(command: Commands, cfg: &Config) -> Result<ExitCode> {
    match command {
        Commands::Run {
            limit,
            dry_run,
            no_validate,
            no_indexes,
            progress,
            ..
        } => {
            let stop = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&stop);
            tokio::spawn(async move {
                watch_interrupts(tokio::signal::ctrl_c, flag).await;
                error!("second interrupt, aborting");
                std::process::exit(130);
            });

            let options = RunOptions {
                limit,
                dry_run,
                skip_validation: no_validate,
                skip_indexes: no_indexes,
            };
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();

            let report = run_ingest(cfg, &options, reporter, stop).await?;
            if report.interrupted {
                return Ok(ExitCode::from(130));
            }
        }
        Commands::Validate => {
            let store = MongoStore::connect(&cfg.store).await?;
            print!("{}", validate_store(&store).await);
            store.close().await;
        }
        Commands::Indexes => {
            let store = MongoStore::connect(&cfg.store).await?;
            let outcomes = ensure_indexes(&store).await;
            for outcome in &outcomes {
                println!("{}", outcome);
            }
            store.close().await;
            if !outcomes.iter().all(IndexOutcome::is_ok) {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Status => {
            let store = MongoStore::connect(&cfg.store).await?;
            println!("Connected: {}", store.describe());
            match store.count_documents(CountFilter::All).await {
                Ok(n) => println!("Documents: {}", n),
                Err(e) => println!("Documents: unknown ({})", e),
            }
            let status = store.replica_status().await?;
            if let Some(version) = &status.version {
                println!("Server:    {}", version);
            }
            match &status.set_name {
                Some(name) => {
                    println!("Replica set: {}", name);
                    for member in &status.members {
                        println!("  {:<24} {}", member.name, member.state);
                    }
                }
                None => println!("Replica set: none (standalone server)"),
            }
            store.close().await;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    err.downcast_ref::<IngestError>()
        .and_then(IngestError::exit_code)
        .map_or(ExitCode::FAILURE, ExitCode::from)
}
