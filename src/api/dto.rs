//! Data Transfer Objects
//!
//! Response envelopes and query parameters for the API endpoints. Entity
//! bodies live in [`crate::models`] and are shared with the sync client.

use serde::{Deserialize, Serialize};

// ============================================
// ENVELOPES
// ============================================

/// Success envelope: `{success: true, data, message?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }
}

/// Error envelope: `{success: false, error, message}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Short error summary
    pub error: String,
    /// Human-readable detail
    pub message: String,
}

// ============================================
// QUERY PARAMETERS
// ============================================

/// `GET /workouts?user_id=`
#[derive(Debug, Default, Deserialize)]
pub struct WorkoutsQuery {
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// `GET /profile/measurements/:kind/history?limit=`
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    30
}

// ============================================
// HEALTH DTOs
// ============================================

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
    /// Open WebSocket connections
    pub connections: usize,
    pub users: usize,
    pub workouts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_omits_empty_message() {
        let json = serde_json::to_value(ApiResponse::ok(5)).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": 5}));

        let json = serde_json::to_value(ApiResponse::with_message(1, "Created")).unwrap();
        assert_eq!(json["message"], "Created");
    }

    #[test]
    fn test_history_query_default_limit() {
        let query: HistoryQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 30);
    }
}
