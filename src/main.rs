//! flipmaker: two-sided flip-order quoting on a pegged stablecoin DEX
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod chain;
mod config;
mod engine;

use chain::RpcChainClient;
use config::Config;
use engine::{QuoteEngine, StateStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("flipmaker=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("FLIPMAKER_CONFIG").ok())
        .unwrap_or_else(|| "flipmaker.toml".to_string());
    let cfg = Config::load(&PathBuf::from(&config_path))
        .with_context(|| format!("loading {}", config_path))?;

    info!("═══ flipmaker ═══");
    info!(
        "[INIT] {} pair(s) | {} bps spread | {} tx/day | maker {}",
        cfg.pairs.len(),
        cfg.engine.spread_bps,
        cfg.engine.max_tx_per_day,
        cfg.chain.maker
    );

    let chain = Arc::new(RpcChainClient::new(&cfg.chain.rpc_url, &cfg.chain.exchange)?);
    let store = StateStore::new(cfg.engine.state_path.clone());

    let stop = Arc::new(AtomicBool::new(false));
    let stop_signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("[STOP] shutdown requested, finishing the current pair");
            stop_signal.store(true, Ordering::SeqCst);
        }
    });

    let mut eng = QuoteEngine::new(cfg, chain, store, stop)?;
    eng.run().await
}
