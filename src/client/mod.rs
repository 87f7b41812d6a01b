//! Repsync sync client
//!
//! - **http**: envelope-aware transport; `users`, `workouts` and `profile`
//!   wrap one endpoint per method
//! - **ws**: WebSocket subscription client, dispatching pushes through the
//!   **registry**
//!
//! # Example
//!
//! ```rust,no_run
//! use repsync::client::{ApiClient, WsClient};
//! use repsync::models::{SubsetCreate, SubsetData};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = ApiClient::new("http://localhost:8080")?;
//!     let ws = WsClient::from_base_url("http://localhost:8080")?;
//!     ws.connect().await?;
//!
//!     let _sub = ws
//!         .subscribe_to_user(1, |push| println!("{} on {}", push.event.kind(), push.resource))
//!         .await?;
//!
//!     api.workouts()
//!         .create_subset(&SubsetCreate {
//!             set_id: 1,
//!             subset: SubsetData { subset_number: 1, reps: 5, weight: 100.0 },
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod http;
pub mod profile;
pub mod registry;
pub mod users;
pub mod workouts;
pub mod ws;

pub use error::{ApiError, ApiResult, DEFAULT_ERROR_STATUS};
pub use http::{HttpClient, DEFAULT_TIMEOUT};
pub use profile::{DownloadedImage, ProfileApi};
pub use registry::{Callback, SubscriberRegistry, SubscriptionId};
pub use users::UsersApi;
pub use workouts::WorkoutsApi;
pub use ws::{ws_url_from_base, ConnectionState, Subscription, WsClient, WsError};

use std::time::Duration;

/// REST client for a repsync server
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: HttpClient,
}

impl ApiClient {
    /// Client for the server at `server_url`; requests go to `{server_url}/api`
    pub fn new(server_url: &str) -> ApiResult<Self> {
        Self::with_timeout(server_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(server_url: &str, timeout: Duration) -> ApiResult<Self> {
        let http = HttpClient::with_timeout(&http::join_url(server_url, "api"), timeout)?;
        Ok(Self { http })
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn users(&self) -> UsersApi<'_> {
        UsersApi::new(&self.http)
    }

    pub fn workouts(&self) -> WorkoutsApi<'_> {
        WorkoutsApi::new(&self.http)
    }

    /// Profile operations acting as `user_id`
    pub fn profile(&self, user_id: i64) -> ProfileApi<'_> {
        ProfileApi::new(&self.http, user_id)
    }
}
