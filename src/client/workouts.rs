//! Workout tree endpoints.

use super::error::ApiResult;
use super::http::HttpClient;
use crate::models::{
    Exercise, ExerciseCreate, Set, SetCreate, Subset, SubsetCreate, Workout, WorkoutCreate,
};

/// Workout, exercise, set and subset operations
pub struct WorkoutsApi<'a> {
    http: &'a HttpClient,
}

impl<'a> WorkoutsApi<'a> {
    pub(crate) fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// `GET /workouts`
    pub async fn get_workouts(&self) -> ApiResult<Vec<Workout>> {
        self.http.get("workouts").await
    }

    /// `GET /workouts?user_id=`
    pub async fn get_workouts_for_user(&self, user_id: i64) -> ApiResult<Vec<Workout>> {
        self.http
            .get(&format!("workouts?user_id={}", user_id))
            .await
    }

    /// `GET /workouts/:id`
    pub async fn get_workout(&self, id: i64) -> ApiResult<Workout> {
        self.http.get(&format!("workouts/{}", id)).await
    }

    /// `POST /workouts`
    pub async fn create_workout(&self, workout: &WorkoutCreate) -> ApiResult<Workout> {
        self.http.post("workouts", workout).await
    }

    /// `GET /exercises/:id`
    pub async fn get_exercise(&self, id: i64) -> ApiResult<Exercise> {
        self.http.get(&format!("exercises/{}", id)).await
    }

    /// `POST /exercises`
    pub async fn create_exercise(&self, exercise: &ExerciseCreate) -> ApiResult<Exercise> {
        self.http.post("exercises", exercise).await
    }

    /// `GET /sets/:id`
    pub async fn get_set(&self, id: i64) -> ApiResult<Set> {
        self.http.get(&format!("sets/{}", id)).await
    }

    /// `POST /sets`
    pub async fn create_set(&self, set: &SetCreate) -> ApiResult<Set> {
        self.http.post("sets", set).await
    }

    /// `GET /subsets/:id`
    pub async fn get_subset(&self, id: i64) -> ApiResult<Subset> {
        self.http.get(&format!("subsets/{}", id)).await
    }

    /// `POST /sets/:set_id/subsets`
    ///
    /// The parent id travels in the path; the body is the subset itself.
    pub async fn create_subset(&self, subset: &SubsetCreate) -> ApiResult<Subset> {
        self.http
            .post(&format!("sets/{}/subsets", subset.set_id), &subset.subset)
            .await
    }
}
