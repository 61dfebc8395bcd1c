//! recordstore Inspect Binary
//!
//! Offline maintenance for a dataset: stats, compaction, listing and dumping.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use recordstore::{AppendCache, Config, RecordId, Storage};
use tracing_subscriber::{fmt, EnvFilter};

/// recordstore maintenance tool
#[derive(Parser, Debug)]
#[command(name = "recordstore-inspect")]
#[command(about = "Inspect and maintain a recordstore dataset")]
#[command(version)]
struct Args {
    /// Dataset base path (files are <path>.rindex and <path>.data)
    path: PathBuf,

    /// Do not compact while opening, even if the heap is over threshold
    #[arg(long)]
    no_compact_on_open: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print slot counts, heap size and waste
    Stats,

    /// Rewrite the heap without waste
    Compact,

    /// List live record ids with size and capacity
    Ids,

    /// Write a record's payload to stdout
    Dump {
        /// The record id
        id: u32,
    },
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,recordstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("recordstore-inspect v{}", recordstore::VERSION);
    tracing::info!("Dataset: {}", args.path.display());

    let config = Config::builder()
        .path(&args.path)
        .compact_on_open(!args.no_compact_on_open)
        .build();

    let storage = match Storage::open(config, AppendCache::default()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to open storage: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = run(&storage, args.command);
    let disposed = storage.dispose();

    match result.and(disposed) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(storage: &Storage, command: Commands) -> recordstore::Result<()> {
    match command {
        Commands::Stats => {
            let stats = storage.stats()?;
            println!("slots:        {}", stats.records);
            println!("live records: {}", stats.live_records);
            println!("heap bytes:   {}", stats.data_file_len);
            println!("waste bytes:  {}", stats.waste);
            println!("version:      {}", stats.version);
        }
        Commands::Compact => {
            let before = storage.stats()?;
            storage.compact()?;
            let after = storage.stats()?;
            println!(
                "heap {} -> {} bytes, waste {} -> {} bytes",
                before.data_file_len, after.data_file_len, before.waste, after.waste
            );
        }
        Commands::Ids => {
            for record in storage.live_record_ids()? {
                println!(
                    "{}\tsize={}\tcapacity={}",
                    record,
                    storage.size(record)?,
                    storage.capacity(record)?
                );
            }
        }
        Commands::Dump { id } => {
            let record = RecordId::try_from(id)?;
            storage.check_sanity(record)?;
            let bytes = storage.read_bytes(record)?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
