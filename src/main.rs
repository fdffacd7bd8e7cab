use clap::Parser;
use kycflow::application::engine::VerificationEngine;
use kycflow::config::EngineConfig;
use kycflow::domain::ports::{BlobBackendBox, RecordStoreBox};
use kycflow::infrastructure::filesystem::FsBlobStore;
use kycflow::infrastructure::in_memory::{InMemoryBlobStore, InMemoryRecordStore};
#[cfg(feature = "storage-rocksdb")]
use kycflow::infrastructure::rocksdb::RocksDBStore;
use kycflow::infrastructure::simulated::SimulatedProvider;
use kycflow::interfaces::batch::BatchRunner;
use kycflow::interfaces::csv::command_reader::CommandReader;
use kycflow::interfaces::csv::status_writer::StatusWriter;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Engine configuration (TOML). Built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Directory for uploaded documents. Kept in memory when omitted.
    #[arg(long)]
    blob_dir: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

fn record_store(db_path: Option<PathBuf>) -> Result<RecordStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(Box::new(RocksDBStore::open(path).into_diagnostic()?)),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "Persistent storage requested via --db-path, but the 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
            );
            Ok(Box::new(InMemoryRecordStore::new()))
        }
        None => Ok(Box::new(InMemoryRecordStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path).into_diagnostic()?,
        None => EngineConfig::default(),
    };
    let records = record_store(cli.db_path)?;
    let blobs: BlobBackendBox = match cli.blob_dir {
        Some(dir) => Box::new(FsBlobStore::new(dir)),
        None => Box::new(InMemoryBlobStore::new()),
    };

    let engine = VerificationEngine::new(
        records,
        blobs,
        Arc::new(SimulatedProvider::new()),
        Arc::new(config),
    );

    // Process commands
    let file = File::open(&cli.input).into_diagnostic()?;
    let mut runner = BatchRunner::new(&engine);
    for (index, command) in CommandReader::new(file).commands().enumerate() {
        let number = index + 1;
        match command {
            Ok(command) => {
                if let Err(e) = runner.apply(&command).await {
                    if e.is_retryable() {
                        eprintln!("Error processing command {number}: {e} (safe to resubmit)");
                    } else {
                        eprintln!("Error processing command {number}: {e}");
                    }
                }
            }
            Err(e) => {
                eprintln!("Error reading command {number}: {e}");
            }
        }
    }

    // Output final state
    let rows = runner.summary().await.into_diagnostic()?;
    let stdout = io::stdout();
    StatusWriter::new(stdout.lock())
        .write_rows(&rows)
        .into_diagnostic()?;

    Ok(())
}
