//! User Routes
//!
//! - GET /api/users - List all users
//! - GET /api/users/:id - Get a user with settings and latest measurements
//! - POST /api/users - Create a user

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::ApiResponse;
use crate::api::error::ApiResult;
use crate::api::extract::{ApiJson, ApiPath};
use crate::api::state::AppState;
use crate::models::{User, UserCreate, UserFull};
use crate::websocket::{resource, Event};

/// GET /api/users
pub async fn list_users(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<User>>> {
    Json(ApiResponse::ok(state.store.list_users().await))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ApiResponse<UserFull>>> {
    let user = state.store.get_user(id).await?;
    Ok(Json(ApiResponse::ok(user)))
}

/// POST /api/users
///
/// Broadcasts `user_created` to the `users` resource.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<UserCreate>,
) -> ApiResult<(StatusCode, Json<ApiResponse<User>>)> {
    let user = state.store.create_user(&req).await?;

    state
        .notify(Event::UserCreated(user.clone()), &[resource::USERS.to_string()])
        .await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(user, "User created successfully")),
    ))
}
