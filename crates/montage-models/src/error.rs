//! Validation errors raised while parsing documents and requests.
//!
//! Every variant here is detected synchronously, before a task is created.

use thiserror::Error;

/// Result type for model validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Errors produced when a caller-submitted document or request is rejected.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid JSON document: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid {field} resolution {width}x{height}: dimensions must be positive")]
    InvalidResolution {
        field: &'static str,
        width: i64,
        height: i64,
    },

    #[error("Unknown layer type '{0}'")]
    UnknownLayerKind(String),

    #[error("Clip {clip} on layer {layer} has no resourceId")]
    MissingResourceId { layer: usize, clip: usize },

    #[error("Text clip {clip} on layer {layer} has no text content")]
    MissingText { layer: usize, clip: usize },

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Unknown transition type '{0}'")]
    UnknownTransition(String),

    #[error("Unsupported direction '{direction}' for {kind} transition")]
    UnsupportedDirection { kind: String, direction: String },

    #[error("Unknown easing '{0}'")]
    UnknownEasing(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ValidationError {
    /// Create an invalid time range error.
    pub fn invalid_time_range(message: impl Into<String>) -> Self {
        Self::InvalidTimeRange(message.into())
    }

    /// Create an invalid value error for a named field.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported direction error.
    pub fn unsupported_direction(kind: impl Into<String>, direction: impl Into<String>) -> Self {
        Self::UnsupportedDirection {
            kind: kind.into(),
            direction: direction.into(),
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}
