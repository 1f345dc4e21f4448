//! Budget ledger node
//!
//! Opens the ledger over a sled database and serves it over JSON-RPC.
//! Usage: `ledger-node [config.toml]`

use std::sync::Arc;

use budget_ledger::config::load_config;
use budget_ledger::node::{Ledger, SystemClock};
use budget_ledger::rpc::{start_rpc_server, RpcState};
use budget_ledger::storage::SledStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&config_path)?;
    info!("Loaded configuration from {}", config_path);

    let store = SledStore::open(&config.data_dir)?;
    let ledger = Ledger::open(Arc::new(store), Arc::new(SystemClock), config.ledger.clone());

    let stats = ledger.get_stats();
    info!(
        "Ledger ready: {} blocks, difficulty {}, {} mode, {} wallets",
        stats.block_count, stats.current_difficulty, stats.mining_mode, stats.active_wallets
    );

    let shutdown_ledger = ledger.clone();
    let shutdown = async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received. Stopping node...");
        }
        shutdown_ledger.cancel_mining();
    };

    start_rpc_server(RpcState { ledger }, config.rpc_port, shutdown).await?;
    Ok(())
}
