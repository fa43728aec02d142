//! Removal of a task's render artifacts.
//!
//! Cleanup is idempotent: removing what is already gone succeeds. Locked
//! files are retried with exponential backoff before the failure surfaces.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use montage_media::{remove_artifact, MediaError};
use montage_storage::{OutputStore, StorageError};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry::{retry_async_if, Exhausted, RetryConfig};

/// What a cleanup pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub output_removed: bool,
    pub work_file_removed: bool,
}

/// Deletes published outputs and leftover work files.
#[derive(Debug, Clone)]
pub struct ArtifactJanitor {
    outputs: OutputStore,
    work_dir: PathBuf,
    retry: RetryConfig,
}

impl ArtifactJanitor {
    pub fn new(outputs: OutputStore, work_dir: impl AsRef<Path>, retry: RetryConfig) -> Self {
        Self {
            outputs,
            work_dir: work_dir.as_ref().to_path_buf(),
            retry,
        }
    }

    pub fn from_config(outputs: OutputStore, config: &WorkerConfig) -> Self {
        let retry = RetryConfig::new("artifact_cleanup")
            .with_max_retries(config.cleanup_retries)
            .with_base_delay(config.cleanup_base_delay);
        Self::new(outputs, &config.work_dir, retry)
    }

    /// Remove everything left behind by `task_id`.
    pub async fn clean(&self, task_id: &str) -> WorkerResult<CleanupReport> {
        let outputs = &self.outputs;
        let output_removed = self
            .with_retry(|| async move { outputs.remove(task_id).await })
            .await?;

        let work_path = self.work_dir.join(format!("{}.mp4", task_id));
        let work_path = &work_path;
        let work_file_removed = self
            .with_retry(|| async move {
                remove_artifact(work_path).await.map_err(StorageError::from)
            })
            .await?;

        debug!(task_id, output_removed, work_file_removed, "Cleaned task artifacts");
        Ok(CleanupReport {
            output_removed,
            work_file_removed,
        })
    }

    async fn with_retry<F, Fut>(&self, operation: F) -> WorkerResult<bool>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<bool, StorageError>>,
    {
        retry_async_if(&self.retry, operation, StorageError::is_transient)
            .await
            .map_err(|Exhausted { error, attempts }| {
                metrics::record_cleanup_failure();
                warn!("Cleanup failed after {} attempt(s): {}", attempts, error);
                match error {
                    StorageError::Media(e @ MediaError::ResourceLocked { .. }) => {
                        WorkerError::CleanupFailed(format!("{} after {} attempt(s)", e, attempts))
                    }
                    other => other.into(),
                }
            })
    }
}
