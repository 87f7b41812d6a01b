//! WebSocket Real-Time Sync
//!
//! Pushes data changes to sync clients over WebSocket.
//!
//! ## Architecture
//!
//! - **ConnectionHub**: Manages all active connections and subscriptions
//! - **Handler**: Handles WebSocket upgrade and message processing
//! - **Messages**: Frame formats shared with the sync client
//!
//! ## Resources
//!
//! Clients connect to `/ws` and subscribe to resources:
//! - `users` - user creation
//! - `users:{id}` - anything changing under a user (workouts, settings, measurements)
//! - `workouts:{id}`, `exercises:{id}`, `sets:{id}` - changes within that subtree
//! - `subsets:{id}` - the subset itself
//!
//! ## Example
//!
//! ```json
//! > {"type": "subscribe", "resource": "users:1"}
//! < {"type": "subscribed", "resource": "users:1"}
//! < {"type": "workout_created", "resource": "users:1", "data": {"id": 1, ...}}
//! ```

mod handler;
mod hub;
pub mod messages;

pub use handler::websocket_handler;
pub use hub::{ConnectionHub, ConnectionId, HubConfig, HubError};
pub use messages::{
    resource, ClientMessage, Event, FrameError, InboundFrame, PushMessage, ServerMessage,
};
