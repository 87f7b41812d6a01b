//! Workout Routes
//!
//! Reads and creates for each level of the workout tree. Every create
//! broadcasts one push per affected resource, from the new entity up to its
//! user, before responding.
//!
//! - GET /api/workouts[?user_id=] - List workouts
//! - GET /api/workouts/:id - Get a workout with its full tree
//! - POST /api/workouts - Create a workout (optionally with nested exercises)
//! - GET /api/exercises/:id, POST /api/exercises
//! - GET /api/sets/:id, POST /api/sets
//! - POST /api/sets/:id/subsets - Create a subset under a set
//! - GET /api/subsets/:id, POST /api/subsets

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{ApiResponse, WorkoutsQuery};
use crate::api::error::ApiResult;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::state::AppState;
use crate::models::{
    Exercise, ExerciseCreate, Set, SetCreate, Subset, SubsetCreate, SubsetData, Workout,
    WorkoutCreate,
};
use crate::websocket::Event;

type Created<T> = ApiResult<(StatusCode, Json<ApiResponse<T>>)>;

fn created<T>(data: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(data))))
}

// ============================================
// WORKOUTS
// ============================================

/// GET /api/workouts
pub async fn list_workouts(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<WorkoutsQuery>,
) -> Json<ApiResponse<Vec<Workout>>> {
    Json(ApiResponse::ok(state.store.list_workouts(query.user_id).await))
}

/// GET /api/workouts/:id
pub async fn get_workout(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ApiResponse<Workout>>> {
    Ok(Json(ApiResponse::ok(state.store.get_workout(id).await?)))
}

/// POST /api/workouts
pub async fn create_workout(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<WorkoutCreate>,
) -> Created<Workout> {
    let (workout, lineage) = state.store.create_workout(&req).await?;
    state
        .notify(Event::WorkoutCreated(workout.clone()), &lineage.resources())
        .await;
    created(workout)
}

// ============================================
// EXERCISES
// ============================================

/// GET /api/exercises/:id
pub async fn get_exercise(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ApiResponse<Exercise>>> {
    Ok(Json(ApiResponse::ok(state.store.get_exercise(id).await?)))
}

/// POST /api/exercises
pub async fn create_exercise(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ExerciseCreate>,
) -> Created<Exercise> {
    let (exercise, lineage) = state.store.create_exercise(&req).await?;
    state
        .notify(Event::ExerciseCreated(exercise.clone()), &lineage.resources())
        .await;
    created(exercise)
}

// ============================================
// SETS
// ============================================

/// GET /api/sets/:id
pub async fn get_set(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ApiResponse<Set>>> {
    Ok(Json(ApiResponse::ok(state.store.get_set(id).await?)))
}

/// POST /api/sets
pub async fn create_set(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SetCreate>,
) -> Created<Set> {
    let (set, lineage) = state.store.create_set(&req).await?;
    state
        .notify(Event::SetCreated(set.clone()), &lineage.resources())
        .await;
    created(set)
}

// ============================================
// SUBSETS
// ============================================

/// GET /api/subsets/:id
pub async fn get_subset(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ApiResponse<Subset>>> {
    Ok(Json(ApiResponse::ok(state.store.get_subset(id).await?)))
}

/// POST /api/sets/:id/subsets
pub async fn create_subset_for_set(
    State(state): State<Arc<AppState>>,
    ApiPath(set_id): ApiPath<i64>,
    ApiJson(data): ApiJson<SubsetData>,
) -> Created<Subset> {
    insert_subset(&state, set_id, &data).await
}

/// POST /api/subsets
pub async fn create_subset(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SubsetCreate>,
) -> Created<Subset> {
    insert_subset(&state, req.set_id, &req.subset).await
}

async fn insert_subset(state: &AppState, set_id: i64, data: &SubsetData) -> Created<Subset> {
    let (subset, lineage) = state.store.create_subset(set_id, data).await?;
    state
        .notify(Event::SubsetCreated(subset.clone()), &lineage.resources())
        .await;
    created(subset)
}
