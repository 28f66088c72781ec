//! witnessctl - inspect and maintain precompute witness stores

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use precomputedb::PrecomputeDb;
use tracing::info;
use witnesscache::DEFAULT_CAPACITY;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Store directory
    #[arg(short, long, default_value = "./precompute")]
    data: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show record count and file size
    Info,

    /// Print the witness stored under a key
    Get {
        /// 64-character hex key
        key: String,
    },

    /// Store a hex-encoded witness under a key
    Put {
        /// 64-character hex key
        key: String,
        /// Hex-encoded witness bytes
        value: String,
    },

    /// Load every record through the write-back cache
    Warm {
        /// Hot tier capacity (number of entries)
        #[arg(short, long, default_value_t = DEFAULT_CAPACITY)]
        capacity: usize,

        /// Flush the cache back into the store afterwards
        #[arg(long)]
        flush: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Opening precompute store at {}", args.data);
    let mut db = PrecomputeDb::open(&args.data)
        .with_context(|| format!("Failed to open store at {}", args.data))?;

    match args.command {
        Command::Info => println!("{}", commands::info(&db)),
        Command::Get { key } => match commands::get(&db, &key)? {
            Some(value) => println!("{} bytes\n{}", value.len(), hex::encode(&value)),
            None => println!("(not found)"),
        },
        Command::Put { key, value } => commands::put(&db, &key, &value)?,
        Command::Warm { capacity, flush } => {
            println!("{}", commands::warm(&mut db, capacity, flush)?)
        }
    }

    db.close().context("Failed to close store")?;
    Ok(())
}
