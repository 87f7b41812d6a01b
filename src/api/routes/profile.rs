//! Profile Routes
//!
//! Name, bio, profile image, settings and body measurements of the user
//! named by the `X-User-Id` header. Changes are pushed to `users:{id}`.
//!
//! - PATCH /api/profile/name - Rename
//! - PATCH /api/profile/bio - Replace the bio, empty clears it
//! - POST /api/profile/image - Upload (multipart field `image`)
//! - GET /api/profile/image - Raw image bytes
//! - GET /api/profile/image/metadata - Image metadata
//! - DELETE /api/profile/image - Remove the image
//! - PATCH /api/profile/settings - Update settings (partial)
//! - GET /api/profile/measurements - Latest value of each kind
//! - GET /api/profile/measurements/:kind/history[?limit=] - Newest first
//! - POST /api/profile/measurements/:kind - Record a measurement

use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{ApiResponse, HistoryQuery};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::api::state::AppState;
use crate::models::{
    MeasurementEntry, MeasurementKind, NewMeasurement, ProfileImage, SimpleMeasurements,
    UpdateBioRequest, UpdateNameRequest, UpdateSettingsRequest, UserFull, UserSettings,
    MAX_PROFILE_IMAGE_BYTES,
};
use crate::websocket::{resource, Event};

/// Upper bound for `limit` on history requests
pub const MAX_HISTORY_LIMIT: usize = 1000;

/// Multipart field carrying the uploaded image
pub const IMAGE_FIELD: &str = "image";

fn parse_kind(raw: &str) -> ApiResult<MeasurementKind> {
    raw.parse().map_err(ApiError::Validation)
}

/// PATCH /api/profile/name
pub async fn update_name(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(req): ApiJson<UpdateNameRequest>,
) -> ApiResult<Json<ApiResponse<UserFull>>> {
    let user = state.store.update_name(user_id, &req.name).await?;
    state
        .notify(
            Event::UserUpdated(user.clone()),
            &[resource::user(user_id), resource::USERS.to_string()],
        )
        .await;

    Ok(Json(ApiResponse::with_message(
        user,
        "Name updated successfully",
    )))
}

/// PATCH /api/profile/bio
pub async fn update_bio(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(req): ApiJson<UpdateBioRequest>,
) -> ApiResult<Json<ApiResponse<UserFull>>> {
    let user = state.store.update_bio(user_id, &req.bio).await?;
    state
        .notify(Event::UserUpdated(user.clone()), &[resource::user(user_id)])
        .await;

    Ok(Json(ApiResponse::with_message(
        user,
        "Bio updated successfully",
    )))
}

/// POST /api/profile/image
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ProfileImage>>)> {
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("profile-image").to_string();
        let mime_type = field
            .content_type()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Validation("Image content type is required".to_string()))?;
        let data = field.bytes().await?;
        if data.len() > MAX_PROFILE_IMAGE_BYTES {
            return Err(ApiError::PayloadTooLarge(format!(
                "Profile image must be at most {} bytes",
                MAX_PROFILE_IMAGE_BYTES
            )));
        }

        let image = state
            .store
            .set_profile_image(user_id, &filename, &mime_type, data.to_vec())
            .await?;
        let user = state.store.get_user(user_id).await?;
        state
            .notify(Event::UserUpdated(user), &[resource::user(user_id)])
            .await;

        return Ok((
            StatusCode::CREATED,
            Json(ApiResponse::with_message(
                image,
                "Profile image uploaded successfully",
            )),
        ));
    }

    Err(ApiError::Validation(format!(
        "Missing multipart field '{}'",
        IMAGE_FIELD
    )))
}

/// GET /api/profile/image
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Response> {
    let (image, data) = state.store.profile_image(user_id).await?;
    let headers = [
        (header::CONTENT_TYPE, image.mime_type),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", image.filename.replace('"', "")),
        ),
    ];
    Ok((headers, data).into_response())
}

/// GET /api/profile/image/metadata
pub async fn image_metadata(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<ApiResponse<ProfileImage>>> {
    let image = state.store.profile_image_metadata(user_id).await?;
    Ok(Json(ApiResponse::ok(image)))
}

/// DELETE /api/profile/image
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<ApiResponse<()>>> {
    if !state.store.delete_profile_image(user_id).await? {
        return Ok(Json(ApiResponse::with_message(
            (),
            "Profile image already deleted",
        )));
    }

    let user = state.store.get_user(user_id).await?;
    state
        .notify(Event::UserUpdated(user), &[resource::user(user_id)])
        .await;

    Ok(Json(ApiResponse::with_message((), "Profile image deleted")))
}

/// PATCH /api/profile/settings
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(req): ApiJson<UpdateSettingsRequest>,
) -> ApiResult<Json<ApiResponse<UserSettings>>> {
    if req.settings.is_empty() {
        return Err(ApiError::Validation("No settings provided".to_string()));
    }

    let settings = state.store.update_settings(user_id, &req.settings).await?;
    state
        .notify(
            Event::SettingsUpdated(settings.clone()),
            &[resource::user(user_id)],
        )
        .await;

    Ok(Json(ApiResponse::with_message(
        settings,
        "Settings updated successfully",
    )))
}

/// GET /api/profile/measurements
pub async fn latest_measurements(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<ApiResponse<SimpleMeasurements>>> {
    let measurements = state.store.measurements(user_id).await?;
    Ok(Json(ApiResponse::ok(measurements.latest())))
}

/// GET /api/profile/measurements/:kind/history
pub async fn measurement_history(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiPath(kind): ApiPath<String>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> ApiResult<Json<ApiResponse<Vec<MeasurementEntry>>>> {
    let kind = parse_kind(&kind)?;
    if query.limit == 0 || query.limit > MAX_HISTORY_LIMIT {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_HISTORY_LIMIT
        )));
    }

    let history = state
        .store
        .measurement_history(user_id, kind, query.limit)
        .await?;
    Ok(Json(ApiResponse::ok(history)))
}

/// POST /api/profile/measurements/:kind
pub async fn add_measurement(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiPath(kind): ApiPath<String>,
    ApiJson(req): ApiJson<NewMeasurement>,
) -> ApiResult<(StatusCode, Json<ApiResponse<MeasurementEntry>>)> {
    let kind = parse_kind(&kind)?;
    let entry = state
        .store
        .add_measurement(user_id, kind, req.value, req.date)
        .await?;

    state
        .notify(
            Event::MeasurementAdded(entry.clone()),
            &[resource::user(user_id)],
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            entry,
            format!("{} updated successfully", kind),
        )),
    ))
}
