#![forbid(unsafe_code)]
//! Standalone miner: fetches jobs from a node over HTTP and submits proofs.

use clap::Parser;
use powchain::config::{load_config, DEFAULT_CONFIG_PATH};
use powchain::miner::{HttpTransport, Miner, MinerExit, MinerSettings};
use powchain::node::init_tracing;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Overrides `miner.node_host`
    #[arg(long)]
    host: Option<String>,
    /// Overrides `miner.node_port`
    #[arg(long)]
    port: Option<u16>,
    /// Overrides `miner.address` (40 hex digits)
    #[arg(long)]
    address: Option<String>,
    /// Stop after the first submission
    #[arg(long)]
    once: bool,
}

// The search is CPU-bound and runs inline, so a single-threaded runtime is
// all the miner needs.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let mut config = match load_config(&cli.config) {
        Ok(config) => config.miner,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(host) = cli.host {
        config.node_host = host;
    }
    if let Some(port) = cli.port {
        config.node_port = port;
    }
    if let Some(address) = cli.address {
        config.address = address;
    }
    config.mine_once |= cli.once;

    let transport = HttpTransport::new(config.node_url(), config.request_timeout());
    let mut miner = match Miner::new(transport, MinerSettings::from_config(&config)) {
        Ok(miner) => miner,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match miner.run().await.exit {
        MinerExit::Completed => ExitCode::SUCCESS,
        MinerExit::Unreachable(_) => ExitCode::FAILURE,
    }
}
