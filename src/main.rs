// =============================================================================
// Meridian Chain Pilot — Main Entry Point
// =============================================================================
//
// The engine always boots Stopped for safety. An operator must explicitly
// start it via the dashboard or API.
//
// Gateway selection:
//   - No MERIDIAN_RPC_URL      → pure paper mode: simulated chain, a demo
//                                stepper advances one block per second.
//   - MERIDIAN_RPC_URL set     → shadow mode: live prices, heights, and gas
//                                from the chain; wallet and fills simulated.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod collaborators;
mod decision;
mod error;
mod indicators;
mod portfolio;
mod risk;
mod runtime_config;
mod scheduler;
mod signals;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::collaborators::{ChainRpcClient, PaperMarket, ShadowGateway};
use crate::runtime_config::{RuntimeConfig, CONFIG_PATH};
use crate::scheduler::Scheduler;

/// How often the scheduler polls for a new block.
const POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default seed prices for pure paper mode, USD.
const PAPER_SEED_PRICES: &[(&str, f64)] = &[
    ("WETH", 2500.0),
    ("WBTC", 65000.0),
    ("POL", 0.45),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Meridian Chain Pilot — Starting Up               ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Override the tracked asset universe from env if available.
    if let Ok(assets) = std::env::var("MERIDIAN_ASSETS") {
        config.tracked_assets = assets
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if config.tracked_assets.is_empty() {
        config.tracked_assets = vec!["WETH".into(), "WBTC".into()];
    }

    info!(assets = ?config.tracked_assets, base = %config.base_asset, "Configured asset universe");

    // ── 2. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(config));
    info!(mode = %state.current_mode(), "Engine booted in SAFE mode (Stopped)");

    // ── 3. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr =
        std::env::var("MERIDIAN_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .expect("Failed to bind API server");
        info!(addr = %bind_addr, "API server listening");
        axum::serve(listener, app).await.expect("API server failed");
    });

    // ── 4. Build the gateway and run the scheduler ───────────────────────
    //
    // The scheduler is generic over the gateway, so each branch constructs
    // its own concrete instance and drives the loop on this task. Shutdown
    // is Ctrl-C in both branches.
    let wallet = PaperMarket::new(&*state.runtime_config.read());

    match std::env::var("MERIDIAN_RPC_URL") {
        Ok(rpc_url) if !rpc_url.trim().is_empty() => {
            let price_url = std::env::var("MERIDIAN_PRICE_URL")
                .unwrap_or_else(|_| "https://api.meridian.example/price".into());
            info!(rpc = %rpc_url, prices = %price_url, "Shadow mode: live chain, paper wallet");

            let gateway = ShadowGateway::new(ChainRpcClient::new(rpc_url, price_url), wallet);
            let scheduler = Scheduler::new(state.clone(), gateway, POLL_INTERVAL);

            tokio::select! {
                _ = scheduler.run() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received — shutting down");
                }
            }
        }
        _ => {
            info!("Paper mode: fully simulated chain");
            for (asset, price) in PAPER_SEED_PRICES {
                wallet.set_price(asset, *price);
            }

            // Demo stepper: one block per second with drifting prices.
            let stepper = wallet.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(1));
                loop {
                    interval.tick().await;
                    stepper.step();
                }
            });

            let scheduler = Scheduler::new(state.clone(), wallet, POLL_INTERVAL);

            tokio::select! {
                _ = scheduler.run() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received — shutting down");
                }
            }
        }
    }

    // ── 5. Persist config on the way out ─────────────────────────────────
    let config = state.runtime_config.read().clone();
    if let Err(e) = config.save(CONFIG_PATH) {
        warn!(error = %e, "Failed to persist runtime config on shutdown");
    }
    info!("Shutdown complete");

    Ok(())
}
