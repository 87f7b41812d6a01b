//! Profile endpoints, scoped to one user via the `X-User-Id` header.

use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{ApiError, ApiResult};
use super::http::HttpClient;
use crate::models::{
    MeasurementEntry, MeasurementKind, NewMeasurement, ProfileImage, SettingsUpdate,
    SimpleMeasurements, UpdateBioRequest, UpdateNameRequest, UpdateSettingsRequest, UserFull,
    UserSettings,
};

/// Header carrying the acting user id
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Profile image bytes as served by `GET /profile/image`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

pub struct ProfileApi<'a> {
    http: &'a HttpClient,
    user_id: i64,
}

impl<'a> ProfileApi<'a> {
    pub(crate) fn new(http: &'a HttpClient, user_id: i64) -> Self {
        Self { http, user_id }
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, path)
            .header(USER_ID_HEADER, self.user_id.to_string())
    }

    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<T> {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.http.send(request).await
    }

    /// `PATCH /profile/name`
    pub async fn update_name(&self, name: &str) -> ApiResult<UserFull> {
        let body = UpdateNameRequest {
            name: name.to_string(),
        };
        self.call(Method::PATCH, "profile/name", Some(&body)).await
    }

    /// `PATCH /profile/bio`; an empty bio clears it
    pub async fn update_bio(&self, bio: &str) -> ApiResult<UserFull> {
        let body = UpdateBioRequest {
            bio: bio.to_string(),
        };
        self.call(Method::PATCH, "profile/bio", Some(&body)).await
    }

    /// `POST /profile/image` as multipart field `image`
    pub async fn upload_profile_image(
        &self,
        filename: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> ApiResult<ProfileImage> {
        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(ApiError::Network)?;
        let form = Form::new().part("image", part);

        self.http
            .send(self.request(Method::POST, "profile/image").multipart(form))
            .await
    }

    /// `GET /profile/image`
    pub async fn get_profile_image(&self) -> ApiResult<DownloadedImage> {
        let (content_type, data) = self
            .http
            .send_raw(self.request(Method::GET, "profile/image"))
            .await?;
        Ok(DownloadedImage {
            mime_type: content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
            data,
        })
    }

    /// `GET /profile/image/metadata`
    pub async fn get_profile_image_metadata(&self) -> ApiResult<ProfileImage> {
        self.call::<(), _>(Method::GET, "profile/image/metadata", None)
            .await
    }

    /// `DELETE /profile/image`; succeeds when there is no image
    pub async fn delete_profile_image(&self) -> ApiResult<()> {
        self.call::<(), _>(Method::DELETE, "profile/image", None)
            .await
    }

    /// `PATCH /profile/settings`
    pub async fn update_settings(&self, settings: &SettingsUpdate) -> ApiResult<UserSettings> {
        let body = UpdateSettingsRequest {
            settings: settings.clone(),
        };
        self.call(Method::PATCH, "profile/settings", Some(&body))
            .await
    }

    /// `GET /profile/measurements`
    pub async fn get_latest_measurements(&self) -> ApiResult<SimpleMeasurements> {
        self.call::<(), _>(Method::GET, "profile/measurements", None)
            .await
    }

    /// `GET /profile/measurements/:kind/history?limit=`
    pub async fn get_measurement_history(
        &self,
        kind: MeasurementKind,
        limit: usize,
    ) -> ApiResult<Vec<MeasurementEntry>> {
        let path = format!("profile/measurements/{}/history?limit={}", kind, limit);
        self.call::<(), _>(Method::GET, &path, None).await
    }

    /// `POST /profile/measurements/:kind`
    pub async fn add_measurement(
        &self,
        kind: MeasurementKind,
        value: f64,
        date: Option<DateTime<Utc>>,
    ) -> ApiResult<MeasurementEntry> {
        let body = NewMeasurement { value, date };
        self.call(
            Method::POST,
            &format!("profile/measurements/{}", kind),
            Some(&body),
        )
        .await
    }
}
