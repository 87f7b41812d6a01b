//! Store error types
//!
//! Defines all errors that can occur in the store layer.

use thiserror::Error;

/// Errors that can occur in the store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Requested entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Input failed validation
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::not_found("Workout", 7);
        assert_eq!(err.to_string(), "Workout not found: 7");

        let err = StoreError::invalid("name", "must not be empty");
        assert_eq!(err.to_string(), "Invalid name: must not be empty");
    }
}
