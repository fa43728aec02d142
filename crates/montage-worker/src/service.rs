//! Request boundary: validate, create tasks, report status.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use montage_models::{RenderRequest, TaskId, TaskStatus, TaskStatusDocument};

use crate::cleanup::{ArtifactJanitor, CleanupReport};
use crate::error::{WorkerError, WorkerResult};
use crate::executor::{JobRunner, RenderJob, WorkerPool};
use crate::metrics;
use crate::task_store::TaskStore;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Accepts render requests and answers status queries.
pub struct TaskService {
    store: Arc<TaskStore>,
    pool: WorkerPool,
    janitor: ArtifactJanitor,
}

impl TaskService {
    /// Start a pool of `workers` over a queue of `queue_capacity`.
    pub fn start(
        store: Arc<TaskStore>,
        runner: Arc<dyn JobRunner>,
        janitor: ArtifactJanitor,
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        let pool = WorkerPool::start(workers, queue_capacity, Arc::clone(&store), runner);
        Self {
            store,
            pool,
            janitor,
        }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Validate and queue a request. Invalid requests never become tasks.
    pub async fn submit(&self, request: RenderRequest) -> WorkerResult<TaskId> {
        request.validate()?;

        let kind = request.kind();
        let task_id = self.store.create(kind);
        metrics::record_task_submitted(kind.as_str());
        info!(task_id = %task_id, operation = kind.as_str(), "Task submitted");

        let job = RenderJob {
            task_id: task_id.clone(),
            request,
        };
        if let Err(e) = self.pool.submit(job).await {
            let _ = self.store.fail(&task_id, &e.to_string());
            return Err(e);
        }
        Ok(task_id)
    }

    pub fn status(&self, task_id: &TaskId) -> WorkerResult<TaskStatusDocument> {
        self.store.document(task_id)
    }

    /// Cancel a pending or processing task. An in-flight encoder keeps
    /// running; its result is discarded.
    pub fn cancel(&self, task_id: &TaskId) -> WorkerResult<TaskStatusDocument> {
        let doc = self.store.cancel(task_id)?;
        info!(task_id = %task_id, "Task cancelled");
        Ok(doc)
    }

    /// Delete a task's artifacts. Refused while it is still processing.
    pub async fn cleanup(&self, task_id: &TaskId) -> WorkerResult<CleanupReport> {
        if self.store.status(task_id)? == TaskStatus::Processing {
            return Err(WorkerError::TaskActive(task_id.to_string()));
        }
        self.janitor.clean(task_id.as_str()).await
    }

    /// Prune old terminal records along with their artifacts.
    pub async fn prune(&self, retention: Duration) -> usize {
        let retention = chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::days(365));
        let pruned = self.store.prune_finished(retention);
        for task_id in &pruned {
            if let Err(e) = self.janitor.clean(task_id.as_str()).await {
                warn!(task_id = %task_id, "Artifact cleanup failed during prune: {}", e);
            }
        }
        pruned.len()
    }

    /// Poll until the task reaches a terminal state.
    pub async fn wait(&self, task_id: &TaskId) -> WorkerResult<TaskStatusDocument> {
        loop {
            let doc = self.store.document(task_id)?;
            if doc.status.is_terminal() {
                return Ok(doc);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Stop accepting work and drain the queue.
    pub async fn shutdown(self, timeout: Duration) {
        self.pool.shutdown(timeout).await;
    }
}
