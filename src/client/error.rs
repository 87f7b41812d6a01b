//! Error types for the sync client's REST layer.

use thiserror::Error;

/// Status reported when the server never answered with an error status
pub const DEFAULT_ERROR_STATUS: u16 = 500;

/// Errors returned by REST calls
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request never got a response
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request exceeded the client timeout
    #[error("Request timed out")]
    Timeout,

    /// Server rejected the request
    #[error("{error} ({status}): {message}")]
    Status {
        status: u16,
        error: String,
        message: String,
    },

    /// Response body could not be decoded
    #[error("Malformed response: {reason}")]
    Malformed { status: Option<u16>, reason: String },

    /// Base URL is unusable
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// HTTP status of the failure, [`DEFAULT_ERROR_STATUS`] when the server
    /// did not answer with an error status
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Status { status, .. } => *status,
            ApiError::Malformed {
                status: Some(status),
                ..
            } if *status >= 400 => *status,
            _ => DEFAULT_ERROR_STATUS,
        }
    }

    /// Server-provided message, or a description of the local failure
    pub fn message(&self) -> String {
        match self {
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Malformed { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == 404
    }
}

/// Result type for REST calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_defaults_to_500() {
        let err = ApiError::Malformed {
            status: Some(200),
            reason: "expected value at line 1 column 1".to_string(),
        };
        assert_eq!(err.status(), 500);

        let err = ApiError::Malformed {
            status: None,
            reason: "empty body".to_string(),
        };
        assert_eq!(err.status(), 500);
        assert_eq!(err.message(), "empty body");
    }

    #[test]
    fn test_status_from_server() {
        let err = ApiError::Status {
            status: 404,
            error: "Not Found".to_string(),
            message: "User not found: 9".to_string(),
        };
        assert_eq!(err.status(), 404);
        assert!(err.is_not_found());
        assert_eq!(err.message(), "User not found: 9");
        assert_eq!(err.to_string(), "Not Found (404): User not found: 9");

        let err = ApiError::Malformed {
            status: Some(502),
            reason: "not json".to_string(),
        };
        assert_eq!(err.status(), 502);
    }
}
