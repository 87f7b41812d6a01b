//! Repsync API Server
//!
//! Run with: cargo run --bin repsync-server
//!
//! # Configuration
//!
//! Read from `REPSYNC_CONFIG` when set, else the default locations
//! (see `repsync config`). Environment variables override the file:
//! - `REPSYNC_SERVER_HOST`: Host to bind to (default: 0.0.0.0)
//! - `REPSYNC_SERVER_PORT`: Port to listen on (default: 8080)
//! - `REPSYNC_LOG_LEVEL` / `REPSYNC_LOG_FORMAT`: Logging (default: info, pretty)
//! - `RUST_LOG`: Full filter, wins over the level above

use std::path::PathBuf;

use repsync::api::{serve, AppState};
use repsync::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os("REPSYNC_CONFIG").map(PathBuf::from);
    let config = Config::load_or_default(config_path.as_deref())?;

    repsync::logging::init(&config.logging);

    tracing::info!("Starting repsync server v{}", env!("CARGO_PKG_VERSION"));

    let api_config = config.server.to_api_config();
    let hub_config = config.hub.to_hub_config();
    tracing::info!("Max WebSocket connections: {}", hub_config.max_connections);

    let state = AppState::with_ws_config(api_config.clone(), hub_config);

    tracing::info!("Starting server on {}", api_config.addr());
    serve(state, &api_config).await?;

    tracing::info!("Repsync server stopped");
    Ok(())
}
