//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

use montage_models::ValidationError;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while resolving, compositing or encoding.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Resource not found: {0}")]
    MissingResource(String),

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Unsupported direction '{direction}' for {kind} transition")]
    UnsupportedDirection { kind: String, direction: String },

    #[error("Timeline has no renderable content")]
    EmptyTimeline,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Resource locked: {path} ({reason})")]
    ResourceLocked { path: PathBuf, reason: String },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for MediaError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidTimeRange(message) => Self::InvalidTimeRange(message),
            ValidationError::UnsupportedDirection { kind, direction } => {
                Self::UnsupportedDirection { kind, direction }
            }
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a missing resource error.
    pub fn missing_resource(resource_id: impl Into<String>) -> Self {
        Self::MissingResource(resource_id.into())
    }

    /// Create an invalid time range error.
    pub fn invalid_time_range(message: impl Into<String>) -> Self {
        Self::InvalidTimeRange(message.into())
    }

    /// Create a resource locked error.
    pub fn resource_locked(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ResourceLocked {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short stable label, used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            MediaError::FfmpegNotFound | MediaError::FfprobeNotFound => "tool_missing",
            MediaError::FfmpegFailed { .. } => "encoder_failure",
            MediaError::FfprobeFailed { .. } => "probe_failure",
            MediaError::MissingResource(_) => "missing_resource",
            MediaError::InvalidTimeRange(_) => "invalid_time_range",
            MediaError::UnsupportedDirection { .. } => "unsupported_direction",
            MediaError::EmptyTimeline => "empty_timeline",
            MediaError::InvalidRequest(_) => "invalid_request",
            MediaError::ResourceLocked { .. } => "resource_locked",
            MediaError::FileNotFound(_) => "file_not_found",
            MediaError::InvalidMedia(_) => "invalid_media",
            MediaError::Timeout(_) => "timeout",
            MediaError::Io(_) => "io",
            MediaError::JsonParse(_) => "json",
            MediaError::Internal(_) => "internal",
        }
    }

    /// Transient errors that may succeed when retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, MediaError::ResourceLocked { .. })
    }

    /// Message for the task status, including encoder diagnostics when present.
    pub fn status_message(&self) -> String {
        match self {
            MediaError::FfmpegFailed {
                message,
                stderr: Some(stderr),
                exit_code,
            } if !stderr.trim().is_empty() => {
                let code = exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                format!("{} (exit {}): {}", message, code, stderr.trim())
            }
            other => other.to_string(),
        }
    }
}
