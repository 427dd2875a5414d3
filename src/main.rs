//! Daemon client CLI
//!
//! A command-line interface for querying a node and working with portable
//! storage payloads.

use clap::{Parser, Subcommand};
use daemon_client::cli;
use daemon_client::core::NetworkType;
use daemon_client::daemon::RpcDaemon;
use daemon_client::provider::{self, NativeProvider};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "daemon-client")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Client for Monero-style daemons", long_about = None)]
struct Cli {
    /// Node RPC URL (overrides the config file)
    #[arg(short, long)]
    url: Option<String>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a portable storage file as JSON
    Decode {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Encode a JSON file as portable storage
    Encode {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check an address for a network
    ValidateAddress {
        #[arg(short, long)]
        address: String,

        /// mainnet, testnet or stagenet
        #[arg(short, long, default_value = "mainnet")]
        network: NetworkType,
    },

    /// Show the chain height
    Height,

    /// Show a block header (the tip by default)
    Header {
        #[arg(long)]
        height: Option<u64>,
    },

    /// Fetch a range of blocks
    Blocks {
        #[arg(short, long)]
        start: Option<u64>,

        #[arg(short, long)]
        end: Option<u64>,
    },

    /// List pool transactions
    Pool {
        /// Transaction filter as JSON
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Show a transaction
    Tx {
        #[arg(long)]
        hash: String,

        #[arg(long)]
        prune: bool,
    },

    /// Show node status
    Status,

    /// Print new blocks as they arrive
    Watch,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let handle = provider::global();
    handle.install(Arc::new(NativeProvider))?;

    // Offline commands don't need a node
    match &cli.command {
        Commands::Decode { input } => return cli::cmd_decode(&handle, input),
        Commands::Encode { input, output } => return cli::cmd_encode(&handle, input, output),
        Commands::ValidateAddress { address, network } => {
            return cli::cmd_validate_address(&handle, address, *network)
        }
        _ => {}
    }

    let config = cli::load_config(cli.config.as_deref(), cli.url.as_deref())?;
    let daemon = RpcDaemon::with_provider(config, Arc::clone(&handle))?;
    let rt = tokio::runtime::Runtime::new()?;

    let result = rt.block_on(async {
        match cli.command {
            Commands::Decode { .. } | Commands::Encode { .. } | Commands::ValidateAddress { .. } => {
                unreachable!()
            }
            Commands::Height => cli::cmd_height(&daemon).await,
            Commands::Header { height } => cli::cmd_header(&daemon, height).await,
            Commands::Blocks { start, end } => cli::cmd_blocks(&daemon, start, end).await,
            Commands::Pool { filter } => cli::cmd_pool(&daemon, filter.as_deref()).await,
            Commands::Tx { hash, prune } => cli::cmd_tx(&daemon, &hash, prune).await,
            Commands::Status => cli::cmd_status(&daemon).await,
            Commands::Watch => cli::cmd_watch(&daemon).await,
        }
    });

    handle.shutdown();
    result
}
