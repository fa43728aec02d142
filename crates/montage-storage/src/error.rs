//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

use montage_media::MediaError;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage: {0}")]
    ConfigError(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey(key.into())
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Media(e) if e.is_transient())
    }
}
