//! tierkv CLI
//!
//! Opens a store in a data directory and runs one command against it.

use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tierkv::{Config, KvError, KvService, Metrics, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// tierkv CLI
#[derive(Parser, Debug)]
#[command(name = "tierkv")]
#[command(about = "RocksDB key-value cache with blob overflow and eviction")]
#[command(version)]
struct Args {
    /// Data directory (holds db/ and blobs/)
    #[arg(short, long, default_value = "./tierkv_data")]
    data_dir: String,

    /// Values larger than this many bytes are stored as blobs
    #[arg(short = 't', long, default_value = "1048576")]
    disk_threshold: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List entries under a prefix
    Scan {
        /// Key prefix (empty for all keys)
        #[arg(default_value = "")]
        prefix: String,

        /// Max entries to print
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Get several keys
    Mget {
        keys: Vec<String>,
    },

    /// Set several key=value pairs atomically
    Mset {
        pairs: Vec<String>,
    },

    /// Print the persisted configuration
    Config,

    /// Run one eviction sweep now, regardless of disk usage
    Evict {
        /// Max keys to evict
        #[arg(short, long, default_value = "100")]
        batch_size: usize,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,tierkv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // One-shot commands never need the background loop
    let mut config = Config::with_data_dir(&args.data_dir);
    config.disk_threshold = args.disk_threshold;
    config.eviction.enabled = false;

    let metrics = Arc::new(Metrics::new());
    let store = match Store::open(config, Arc::clone(&metrics)) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let service = KvService::new(Arc::clone(&store), metrics);

    let outcome = run(&service, &store, args.command);

    drop(service);
    if let Ok(store) = Arc::try_unwrap(store) {
        if let Err(e) = store.close() {
            tracing::warn!("Failed to close store cleanly: {}", e);
        }
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(service: &KvService, store: &Store, command: Commands) -> Result<(), KvError> {
    match command {
        Commands::Get { key } => {
            let value = service.get(&key)?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Commands::Set { key, value } => {
            service.set(&key, value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            service.delete(&key)?;
            println!("OK");
        }
        Commands::Scan { prefix, limit } => {
            for (key, value) in service.scan(&prefix, limit)? {
                println!("{}\t{}", key, String::from_utf8_lossy(&value));
            }
        }
        Commands::Mget { keys } => {
            let found = service.mget(&keys)?;
            for key in &keys {
                match found.get(key) {
                    Some(value) => println!("{}\t{}", key, String::from_utf8_lossy(value)),
                    None => println!("{}\t(nil)", key),
                }
            }
        }
        Commands::Mset { pairs } => {
            let mut entries = HashMap::new();
            for pair in pairs {
                let (key, value) = pair.split_once('=').ok_or_else(|| {
                    KvError::Config(format!("expected key=value, got {:?}", pair))
                })?;
                entries.insert(key.to_string(), value.as_bytes().to_vec());
            }
            service.mset(&entries)?;
            println!("OK");
        }
        Commands::Config => {
            let config = service.get_config()?;
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        Commands::Evict { batch_size } => {
            let report = store.evict_now(batch_size)?;
            println!(
                "scanned={} evicted={} failed={}",
                report.scanned, report.evicted, report.failed
            );
        }
    }

    Ok(())
}
