//! User endpoints.

use tracing::debug;

use super::error::ApiResult;
use super::http::HttpClient;
use crate::models::{User, UserCreate, UserFull};

/// User operations, borrowed from an [`ApiClient`](super::ApiClient)
pub struct UsersApi<'a> {
    http: &'a HttpClient,
}

impl<'a> UsersApi<'a> {
    pub(crate) fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// `GET /users`
    pub async fn get_users(&self) -> ApiResult<Vec<User>> {
        self.http.get("users").await
    }

    /// `GET /users/:id`
    pub async fn get_user(&self, id: i64) -> ApiResult<UserFull> {
        self.http.get(&format!("users/{}", id)).await
    }

    /// `POST /users`
    pub async fn create_user(&self, user: &UserCreate) -> ApiResult<User> {
        let created: User = self.http.post("users", user).await?;
        debug!(user_id = created.id, "Created user");
        Ok(created)
    }
}
