//! Worker error types.

use thiserror::Error;

use montage_models::{InvalidTransition, ValidationError};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task {0} is still processing")]
    TaskActive(String),

    #[error("Invalid task state change: {0}")]
    InvalidState(#[from] InvalidTransition),

    #[error("Render queue is closed")]
    QueueClosed,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cleanup failed: {0}")]
    CleanupFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] montage_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] montage_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn task_not_found(task_id: impl Into<String>) -> Self {
        Self::TaskNotFound(task_id.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Media(e) => e.is_transient(),
            WorkerError::Storage(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Message recorded on a failed task. Encoder failures carry their
    /// diagnostics.
    pub fn status_message(&self) -> String {
        match self {
            WorkerError::Media(e) => e.status_message(),
            WorkerError::Storage(montage_storage::StorageError::Media(e)) => e.status_message(),
            other => other.to_string(),
        }
    }

    /// Short stable label, used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::Validation(_) => "validation",
            WorkerError::TaskNotFound(_) => "task_not_found",
            WorkerError::TaskActive(_) => "task_active",
            WorkerError::InvalidState(_) => "invalid_state",
            WorkerError::QueueClosed => "queue_closed",
            WorkerError::ConfigError(_) => "config",
            WorkerError::CleanupFailed(_) => "cleanup",
            WorkerError::Media(e) => e.kind(),
            WorkerError::Storage(_) => "storage",
            WorkerError::Io(_) => "io",
        }
    }
}
