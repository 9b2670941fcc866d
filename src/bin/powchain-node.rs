#![forbid(unsafe_code)]
//! Runs a powchain node serving the mining and query API.

use clap::Parser;
use powchain::config::{load_config, DEFAULT_CONFIG_PATH};
use powchain::node::{init_tracing, Node};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Overrides `node.host`
    #[arg(long)]
    host: Option<String>,
    /// Overrides `node.port`
    #[arg(long)]
    port: Option<u16>,
    /// Overrides `ledger.initial_difficulty`
    #[arg(long)]
    difficulty: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = load_config(&cli.config)?;
    if let Some(host) = cli.host {
        config.node.host = host;
    }
    if let Some(port) = cli.port {
        config.node.port = port;
    }
    if let Some(difficulty) = cli.difficulty {
        config.ledger.initial_difficulty = difficulty;
    }

    let node = Arc::new(Node::init(config)?);
    node.start().await?;
    Ok(())
}
