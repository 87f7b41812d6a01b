//! Envelope-aware HTTP transport shared by the resource APIs.
//!
//! Every call is one round-trip: no retries, no caching. Responses are
//! decoded from `{success, data|error, message?}` into the caller's type or
//! into an [`ApiError`].

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::error::{ApiError, ApiResult, DEFAULT_ERROR_STATUS};

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Join a base URL and a path with exactly one slash between them
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}

/// HTTP client bound to the API base URL (for example `http://host:8080/api`)
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let base_url = base_url.trim();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ApiError::InvalidUrl(format!(
                "{} must start with http:// or https://",
                base_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(format!("repsync/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Start a request to a path under the base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.send(self.request(Method::PATCH, path).json(body)).await
    }

    /// Send a prepared request and decode the envelope
    pub async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let (status, _, body) = self.execute(request).await?;
        decode_envelope(status, &body)
    }

    /// Send a prepared request whose success body is not an envelope.
    ///
    /// Returns the content type and the raw body; failures still carry the
    /// error envelope and decode like [`HttpClient::send`].
    pub async fn send_raw(&self, request: RequestBuilder) -> ApiResult<(Option<String>, Vec<u8>)> {
        let (status, content_type, body) = self.execute(request).await?;
        if !status.is_success() {
            return Err(decode_error(status, &body));
        }
        Ok((content_type, body))
    }

    async fn execute(
        &self,
        request: RequestBuilder,
    ) -> ApiResult<(StatusCode, Option<String>, Vec<u8>)> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Network(e)
            }
        })?;

        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "API response");

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(ApiError::Network)?;
        Ok((status, content_type, body.to_vec()))
    }
}

/// Error for a non-2xx response, from its envelope when it has one
fn decode_error(status: StatusCode, body: &[u8]) -> ApiError {
    let parsed: ErrorEnvelope = match serde_json::from_slice(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            return ApiError::Malformed {
                status: Some(status.as_u16()),
                reason: format!("Invalid error body: {}", e),
            }
        }
    };

    let error = parsed
        .error
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Error").to_string());
    ApiError::Status {
        status: status.as_u16(),
        message: parsed.message.unwrap_or_else(|| error.clone()),
        error,
    }
}

fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> ApiResult<T> {
    if !status.is_success() {
        return Err(decode_error(status, body));
    }

    let envelope: Envelope = serde_json::from_slice(body).map_err(|e| ApiError::Malformed {
        status: Some(status.as_u16()),
        reason: format!("Invalid response body: {}", e),
    })?;

    if !envelope.success {
        let error = envelope.error.unwrap_or_else(|| "Request failed".to_string());
        return Err(ApiError::Status {
            status: DEFAULT_ERROR_STATUS,
            message: envelope.message.unwrap_or_else(|| error.clone()),
            error,
        });
    }

    serde_json::from_value(envelope.data).map_err(|e| ApiError::Malformed {
        status: Some(status.as_u16()),
        reason: format!("Unexpected data: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_trims_slashes() {
        assert_eq!(join_url("http://h/api/", "/users"), "http://h/api/users");
        assert_eq!(join_url("http://h/api", "users/1"), "http://h/api/users/1");
        assert_eq!(join_url("http://h/api//", "//sets/2/subsets"), "http://h/api/sets/2/subsets");
        assert_eq!(join_url("http://h", ""), "http://h");
    }

    #[test]
    fn test_rejects_non_http_base() {
        assert!(matches!(
            HttpClient::new("localhost:8080"),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(HttpClient::new("http://localhost:8080/api/").is_ok());
    }

    #[test]
    fn test_decode_success() {
        let body = br#"{"success":true,"data":{"id":1}}"#;
        let value: Value = decode_envelope(StatusCode::OK, body).unwrap();
        assert_eq!(value["id"], 1);
    }

    #[test]
    fn test_decode_malformed_json_is_500() {
        let err = decode_envelope::<Value>(StatusCode::OK, b"<html>").unwrap_err();
        assert!(matches!(err, ApiError::Malformed { .. }));
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_decode_error_body() {
        let body = br#"{"success":false,"error":"Not Found","message":"Workout not found: 4"}"#;
        let err = decode_envelope::<Value>(StatusCode::NOT_FOUND, body).unwrap_err();
        assert_eq!(err.status(), 404);
        assert_eq!(err.message(), "Workout not found: 4");
    }

    #[test]
    fn test_decode_unsuccessful_200() {
        let body = br#"{"success":false,"error":"Unauthorized"}"#;
        let err = decode_envelope::<Value>(StatusCode::OK, body).unwrap_err();
        assert_eq!(err.status(), 500);
        assert_eq!(err.message(), "Unauthorized");
    }
}
