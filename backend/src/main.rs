use std::sync::Arc;

use commodities_backend::{
    api::{AppState, create_router},
    cache::CachedSnapshotFetcher,
    clock::SystemClock,
    config::Config,
    price_simulator::MarketSimulator,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging (RUST_LOG, defaults to info)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 Starting Commodities Backend Service...");

    let config = Config::from_env()?;

    let simulator = match config.simulation_seed {
        Some(seed) => {
            info!("🎲 Market simulator seeded with {}", seed);
            MarketSimulator::seeded(seed)
        }
        None => MarketSimulator::from_entropy(),
    };

    let fetcher = CachedSnapshotFetcher::new(Arc::new(simulator), Arc::new(SystemClock))
        .with_freshness(config.cache_config.freshness_window());
    info!(
        "💾 Snapshot cache ready (freshness: {}s)",
        config.cache_config.freshness_seconds
    );

    let app = create_router(AppState {
        fetcher: Arc::new(fetcher),
        cache_control_max_age: config.cache_config.cache_control_max_age,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!("🌐 Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
