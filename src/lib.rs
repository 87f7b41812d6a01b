//! # Repsync
//!
//! Workout tracking with live sync: an HTTP/WebSocket server and the client
//! layer that keeps a per-user view of workouts up to date.
//!
//! ## Features
//!
//! - **REST API**: users, the workout → exercise → set → subset tree,
//!   profile settings and body measurements
//! - **Push notifications**: every change is pushed over WebSocket to the
//!   resources it touches
//! - **Sync client**: typed REST wrappers plus a subscription client that
//!   multiplexes many callbacks over one socket
//!
//! ## Modules
//!
//! - [`models`]: DTOs shared by server and client
//! - [`store`]: the server's in-memory state
//! - [`api`]: REST API server with Axum
//! - [`websocket`]: frame types and the server-side connection hub
//! - [`client`]: REST and WebSocket sync client
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use repsync::client::{ApiClient, WsClient};
//! use repsync::models::{UserCreate, WorkoutCreate};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = ApiClient::new("http://localhost:8080")?;
//!     let user = api.users().create_user(&UserCreate::new("Test User")).await?;
//!
//!     let ws = WsClient::from_base_url("http://localhost:8080")?;
//!     ws.connect().await?;
//!     let subscription = ws
//!         .subscribe_to_user(user.id, |push| println!("{}", push.event.kind()))
//!         .await?;
//!
//!     api.workouts().create_workout(&WorkoutCreate::new(user.id)).await?;
//!
//!     subscription.unsubscribe();
//!     ws.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod logging;
pub mod models;
pub mod store;
pub mod websocket;

pub use api::{build_router, serve, serve_on, ApiConfig, AppState};

pub use client::{ApiClient, ConnectionState, Subscription, WsClient, WsError};

pub use store::{Lineage, Store, StoreError, StoreResult};

pub use websocket::{
    websocket_handler, ClientMessage, ConnectionHub, Event, HubConfig, HubError, PushMessage,
    ServerMessage,
};

pub use config::{Config, ConfigError, LoggingConfig};
