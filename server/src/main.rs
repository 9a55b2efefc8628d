use clap::Parser;
use log::{info, warn};
use server::config::ServerConfig;
use server::network::{router, AppState};
use server::utils::SystemClock;
use std::net::SocketAddr;
use std::sync::Arc;

/// Main-method of the application.
/// Parses configuration, wires the store-backed service and serves HTTP until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Hint: set RUST_LOG=info to see session and submission logs");
    }
    env_logger::init();

    let config = ServerConfig::parse();

    let state = AppState::from_config(&config, Arc::new(SystemClock)).await?;
    if !state.is_configured() {
        warn!("No store configured; leaderboard endpoints will answer 500");
    }

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Leaderboard server listening on {}", address);

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C, shutting down gracefully...");
    }
}
