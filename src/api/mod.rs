//! Repsync REST API
//!
//! HTTP API layer for the repsync server, built with Axum. Every response
//! body is a JSON envelope: `{success: true, data, message?}` on success and
//! `{success: false, error, message}` on failure.
//!
//! # Endpoints
//!
//! ## Users
//! - `GET /api/users` - List users
//! - `GET /api/users/:id` - Get a user with settings and latest measurements
//! - `POST /api/users` - Create a user
//!
//! ## Workouts
//! - `GET /api/workouts[?user_id=]` - List workouts
//! - `GET /api/workouts/:id` - Get a workout
//! - `POST /api/workouts` - Create a workout
//! - `GET /api/exercises/:id`, `POST /api/exercises`
//! - `GET /api/sets/:id`, `POST /api/sets`, `POST /api/sets/:id/subsets`
//! - `GET /api/subsets/:id`, `POST /api/subsets`
//!
//! ## Profile (user named by `X-User-Id`)
//! - `PATCH /api/profile/name`, `PATCH /api/profile/bio`
//! - `POST /api/profile/image` - Multipart upload, at most 5 MB
//! - `GET /api/profile/image`, `GET /api/profile/image/metadata`
//! - `DELETE /api/profile/image`
//! - `PATCH /api/profile/settings`
//! - `GET /api/profile/measurements`
//! - `GET /api/profile/measurements/:kind/history`
//! - `POST /api/profile/measurements/:kind`
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health` - Full health status
//!
//! ## WebSocket
//! - `GET /ws` - Push notifications, see [`crate::websocket`]
//!
//! # Example
//!
//! ```rust,no_run
//! use repsync::api::{serve, ApiConfig, AppState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApiConfig::default();
//!     let state = AppState::new(config.clone());
//!     serve(state, &config).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::models::MAX_PROFILE_IMAGE_BYTES;
use crate::websocket::websocket_handler;

/// Room for multipart framing around the largest accepted image
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_size;

    let api_routes = Router::new()
        // User routes
        .route("/users", get(routes::users::list_users).post(routes::users::create_user))
        .route("/users/:id", get(routes::users::get_user))
        // Workout tree routes
        .route(
            "/workouts",
            get(routes::workouts::list_workouts).post(routes::workouts::create_workout),
        )
        .route("/workouts/:id", get(routes::workouts::get_workout))
        .route("/exercises", post(routes::workouts::create_exercise))
        .route("/exercises/:id", get(routes::workouts::get_exercise))
        .route("/sets", post(routes::workouts::create_set))
        .route("/sets/:id", get(routes::workouts::get_set))
        .route(
            "/sets/:id/subsets",
            post(routes::workouts::create_subset_for_set),
        )
        .route("/subsets", post(routes::workouts::create_subset))
        .route("/subsets/:id", get(routes::workouts::get_subset))
        // Profile routes
        .route("/profile/name", patch(routes::profile::update_name))
        .route("/profile/bio", patch(routes::profile::update_bio))
        .route(
            "/profile/image",
            post(routes::profile::upload_image)
                .layer(DefaultBodyLimit::max(
                    MAX_PROFILE_IMAGE_BYTES + MULTIPART_OVERHEAD,
                ))
                .get(routes::profile::get_image)
                .delete(routes::profile::delete_image),
        )
        .route(
            "/profile/image/metadata",
            get(routes::profile::image_metadata),
        )
        .route("/profile/settings", patch(routes::profile::update_settings))
        .route(
            "/profile/measurements",
            get(routes::profile::latest_measurements),
        )
        .route(
            "/profile/measurements/:kind",
            post(routes::profile::add_measurement),
        )
        .route(
            "/profile/measurements/:kind/history",
            get(routes::profile::measurement_history),
        )
        .layer(DefaultBodyLimit::max(body_limit));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api", api_routes)
        .nest("/health", health_routes)
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server, stopping on Ctrl+C or SIGTERM
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let listener = TcpListener::bind(config.addr()).await?;
    serve_on(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve_on<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = listener.local_addr()?;
    let router = build_router(state);

    tracing::info!("Repsync API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Repsync API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        build_router(AppState::new(ApiConfig::default()))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .header("X-User-Id", "1")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_live() {
        let app = create_test_app();
        let (status, _) = send(&app, get("/health/live")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let app = create_test_app();
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["users"], 0);
    }

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let app = create_test_app();

        let (status, body) = send(
            &app,
            json_request("POST", "/api/users", json!({"name": "Test User"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["id"], 1);
        assert_eq!(body["data"]["name"], "Test User");

        let (status, body) = send(&app, get("/api/users/1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["settings"]["language"], "en");
        assert_eq!(body["data"]["has_profile_image"], false);
    }

    #[tokio::test]
    async fn test_missing_user_is_404_envelope() {
        let app = create_test_app();
        let (status, body) = send(&app, get("/api/users/99")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Not Found");
        assert_eq!(body["message"], "User not found: 99");
    }

    #[tokio::test]
    async fn test_invalid_json_is_400_envelope() {
        let app = create_test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/users")
            .header("Content-Type", "application/json")
            .body(Body::from("not json"))
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_workout_tree_endpoints() {
        let app = create_test_app();
        send(&app, json_request("POST", "/api/users", json!({"name": "A"}))).await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/workouts",
                json!({
                    "user_id": 1,
                    "type": "Push",
                    "exercises": [{
                        "exercise_number": 1,
                        "sets": [{"exercise_name": "Bench Press", "set_number": 1, "subsets": []}]
                    }]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["user_id"], 1);
        assert_eq!(body["data"]["type"], "Push");
        assert_eq!(body["data"]["exercises"][0]["name"], "Bench Press");

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/sets/1/subsets",
                json!({"subset_number": 1, "reps": 8, "weight": 60.0}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["set_id"], 1);

        let (_, body) = send(&app, get("/api/workouts?user_id=1")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        let (_, body) = send(&app, get("/api/workouts?user_id=2")).await;
        assert!(body["data"].as_array().unwrap().is_empty());

        let (status, _) = send(&app, get("/api/subsets/1")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_workout_for_unknown_user() {
        let app = create_test_app();
        let (status, _) = send(
            &app,
            json_request("POST", "/api/workouts", json!({"user_id": 5, "exercises": []})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_profile_requires_user_header() {
        let app = create_test_app();
        let request = Request::builder()
            .method("PATCH")
            .uri("/api/profile/settings")
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"settings": {"darkMode": true}}"#))
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_profile_settings_and_measurements() {
        let app = create_test_app();
        send(&app, json_request("POST", "/api/users", json!({"name": "A"}))).await;

        let (status, body) = send(
            &app,
            json_request(
                "PATCH",
                "/api/profile/settings",
                json!({"settings": {"darkMode": true}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["darkMode"], true);

        let (status, _) = send(
            &app,
            json_request("POST", "/api/profile/measurements/weight", json!({"value": 81.2})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(
            &app,
            json_request("POST", "/api/profile/measurements/bmi", json!({"value": 20.0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let request = Request::builder()
            .uri("/api/profile/measurements")
            .header("X-User-Id", "1")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["weight"]["value"], 81.2);
        assert!(body["data"]["bodyFat"].is_null());
    }

    const BOUNDARY: &str = "repsync-boundary";

    fn image_upload(mime_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"me.png\"\r\nContent-Type: {m}\r\n\r\n",
            b = BOUNDARY,
            m = mime_type
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/profile/image")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header("X-User-Id", "1")
            .body(Body::from(body))
            .unwrap()
    }

    fn profile_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("X-User-Id", "1")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_profile_name_and_bio() {
        let app = create_test_app();
        send(&app, json_request("POST", "/api/users", json!({"name": "A"}))).await;

        let (status, body) = send(
            &app,
            json_request("PATCH", "/api/profile/name", json!({"name": "  Renamed  "})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Renamed");

        let (status, body) = send(
            &app,
            json_request("PATCH", "/api/profile/bio", json!({"bio": "Lifts things"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["bio"], "Lifts things");

        let (status, _) = send(
            &app,
            json_request("PATCH", "/api/profile/name", json!({"name": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_profile_image_routes() {
        let app = create_test_app();
        send(&app, json_request("POST", "/api/users", json!({"name": "A"}))).await;
        let png = [0x89, b'P', b'N', b'G', 1, 2, 3];

        let (status, body) = send(&app, image_upload("image/png", &png)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["filename"], "me.png");
        assert_eq!(body["data"]["mimeType"], "image/png");
        assert_eq!(body["data"]["size"], png.len());

        let response = app
            .clone()
            .oneshot(profile_request("GET", "/api/profile/image"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], &png[..]);

        let (status, body) = send(&app, profile_request("GET", "/api/profile/image/metadata")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["filename"], "me.png");

        let (_, body) = send(&app, get("/api/users/1")).await;
        assert_eq!(body["data"]["has_profile_image"], true);

        let (status, body) = send(&app, profile_request("DELETE", "/api/profile/image")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Profile image deleted");

        let (status, body) = send(&app, profile_request("GET", "/api/profile/image")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);

        let (_, body) = send(&app, profile_request("DELETE", "/api/profile/image")).await;
        assert_eq!(body["message"], "Profile image already deleted");
    }

    #[tokio::test]
    async fn test_profile_image_rejects_non_images() {
        let app = create_test_app();
        send(&app, json_request("POST", "/api/users", json!({"name": "A"}))).await;

        let (status, body) = send(&app, image_upload("text/plain", b"hello")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_profile_image_over_limit_is_413() {
        let app = create_test_app();
        send(&app, json_request("POST", "/api/users", json!({"name": "A"}))).await;

        let data = vec![0u8; MAX_PROFILE_IMAGE_BYTES + 1];
        let (status, _) = send(&app, image_upload("image/png", &data)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
