//! In-memory task status store.
//!
//! One mutex guards every record. It is only held for field updates, never
//! across an await point, so encoder I/O never contends on it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info};

use montage_media::ProgressSink;
use montage_models::{TaskId, TaskKind, TaskRecord, TaskStatus, TaskStatusDocument};

use crate::error::{WorkerError, WorkerResult};

/// Owns the status of every task known to this process.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Mutex<HashMap<TaskId, TaskRecord>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, TaskRecord>> {
        // A panic mid-update leaves a record no worse than its last
        // completed field write.
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_record<R>(
        &self,
        task_id: &TaskId,
        f: impl FnOnce(&mut TaskRecord) -> R,
    ) -> WorkerResult<R> {
        let mut tasks = self.lock();
        let record = tasks
            .get_mut(task_id)
            .ok_or_else(|| WorkerError::task_not_found(task_id.as_str()))?;
        Ok(f(record))
    }

    /// Register a new pending task.
    pub fn create(&self, kind: TaskKind) -> TaskId {
        let task_id = TaskId::new();
        let record = TaskRecord::new(task_id.clone(), kind);
        self.lock().insert(task_id.clone(), record);
        debug!(task_id = %task_id, operation = kind.as_str(), "Task created");
        task_id
    }

    pub fn get(&self, task_id: &TaskId) -> Option<TaskRecord> {
        self.lock().get(task_id).cloned()
    }

    pub fn document(&self, task_id: &TaskId) -> WorkerResult<TaskStatusDocument> {
        self.with_record(task_id, |record| record.to_document())
    }

    pub fn status(&self, task_id: &TaskId) -> WorkerResult<TaskStatus> {
        self.with_record(task_id, |record| record.status)
    }

    /// Claim a pending task for a worker. `Ok(false)` when the task was
    /// cancelled while queued.
    pub fn start(&self, task_id: &TaskId) -> WorkerResult<bool> {
        self.with_record(task_id, |record| match record.status {
            TaskStatus::Pending => record.start().is_ok(),
            _ => false,
        })
    }

    pub fn set_progress(&self, task_id: &TaskId, fraction: f64) -> WorkerResult<()> {
        self.with_record(task_id, |record| record.set_progress(fraction))
    }

    pub fn add_warnings(&self, task_id: &TaskId, warnings: &[String]) -> WorkerResult<()> {
        self.with_record(task_id, |record| {
            for warning in warnings {
                record.add_warning(warning.clone());
            }
        })
    }

    /// Record a finished render. Returns the status the task ends in, which
    /// stays `cancelled` if the caller cancelled while it was encoding.
    pub fn complete(&self, task_id: &TaskId, output_location: &str) -> WorkerResult<TaskStatus> {
        self.with_record(task_id, |record| {
            if let Err(rejected) = record.complete(output_location) {
                info!(task_id = %task_id, "Completion ignored: {}", rejected);
            }
            record.status
        })
    }

    /// Record a failure. A terminal task keeps its state.
    pub fn fail(&self, task_id: &TaskId, message: &str) -> WorkerResult<TaskStatus> {
        self.with_record(task_id, |record| {
            if let Err(rejected) = record.fail(message) {
                info!(task_id = %task_id, "Failure ignored: {}", rejected);
            }
            record.status
        })
    }

    /// Cancel a pending or processing task.
    pub fn cancel(&self, task_id: &TaskId) -> WorkerResult<TaskStatusDocument> {
        self.with_record(task_id, |record| -> WorkerResult<TaskStatusDocument> {
            record.cancel()?;
            Ok(record.to_document())
        })?
    }

    pub fn remove(&self, task_id: &TaskId) -> Option<TaskRecord> {
        self.lock().remove(task_id)
    }

    /// Snapshots of every task, oldest first.
    pub fn list(&self) -> Vec<TaskStatusDocument> {
        let mut docs: Vec<_> = self.lock().values().map(TaskRecord::to_document).collect();
        docs.sort_by_key(|d| d.created_at);
        docs
    }

    /// Drop terminal records that finished more than `retention` ago.
    /// Returns the pruned ids.
    pub fn prune_finished(&self, retention: chrono::Duration) -> Vec<TaskId> {
        let cutoff = Utc::now() - retention;
        let mut tasks = self.lock();
        let expired: Vec<TaskId> = tasks
            .values()
            .filter(|r| r.is_terminal() && r.completed_at.is_some_and(|at| at < cutoff))
            .map(|r| r.task_id.clone())
            .collect();
        for task_id in &expired {
            tasks.remove(task_id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Forwards render progress into a task record.
#[derive(Debug, Clone)]
pub struct TaskProgress {
    store: Arc<TaskStore>,
    task_id: TaskId,
}

impl TaskProgress {
    pub fn new(store: Arc<TaskStore>, task_id: TaskId) -> Self {
        Self { store, task_id }
    }
}

impl ProgressSink for TaskProgress {
    fn report(&self, fraction: f64) {
        // The record may have been pruned while encoding
        let _ = self.store.set_progress(&self.task_id, fraction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_while_processing_survives_completion() {
        let store = TaskStore::new();
        let id = store.create(TaskKind::Export);
        assert!(store.start(&id).unwrap());

        let doc = store.cancel(&id).unwrap();
        assert_eq!(doc.status, TaskStatus::Cancelled);

        assert_eq!(store.complete(&id, "/out/x.mp4").unwrap(), TaskStatus::Cancelled);
        let doc = store.document(&id).unwrap();
        assert_eq!(doc.status, TaskStatus::Cancelled);
        assert!(doc.output_location.is_none());
    }

    #[test]
    fn test_cancelled_pending_task_is_not_started() {
        let store = TaskStore::new();
        let id = store.create(TaskKind::Cut);
        store.cancel(&id).unwrap();
        assert!(!store.start(&id).unwrap());
        assert_eq!(store.status(&id).unwrap(), TaskStatus::Cancelled);
    }

    #[test]
    fn test_terminal_tasks_cannot_be_cancelled() {
        let store = TaskStore::new();
        let id = store.create(TaskKind::Trim);
        store.start(&id).unwrap();
        store.fail(&id, "boom").unwrap();

        assert!(matches!(store.cancel(&id), Err(WorkerError::InvalidState(_))));
        assert_eq!(store.status(&id).unwrap(), TaskStatus::Failed);
    }

    #[test]
    fn test_records_are_independent() {
        let store = TaskStore::new();
        let a = store.create(TaskKind::Export);
        let b = store.create(TaskKind::Export);
        store.start(&a).unwrap();
        store.start(&b).unwrap();

        store.set_progress(&a, 0.45).unwrap();
        store.fail(&b, "encoder exited").unwrap();
        store.complete(&a, "/out/a.mp4").unwrap();

        assert_eq!(store.status(&a).unwrap(), TaskStatus::Completed);
        assert_eq!(store.status(&b).unwrap(), TaskStatus::Failed);
        assert_eq!(store.document(&b).unwrap().progress, 0);
    }

    #[test]
    fn test_unknown_task() {
        let store = TaskStore::new();
        let id = TaskId::from_string("nope");
        assert!(matches!(store.document(&id), Err(WorkerError::TaskNotFound(_))));
        assert!(matches!(store.cancel(&id), Err(WorkerError::TaskNotFound(_))));
    }

    #[test]
    fn test_progress_sink_updates_record() {
        let store = Arc::new(TaskStore::new());
        let id = store.create(TaskKind::Merge);
        store.start(&id).unwrap();

        let sink = TaskProgress::new(Arc::clone(&store), id.clone());
        sink.report(0.3);
        assert_eq!(store.document(&id).unwrap().progress, 30);
    }

    #[test]
    fn test_prune_keeps_active_tasks() {
        let store = TaskStore::new();
        let done = store.create(TaskKind::Cut);
        let active = store.create(TaskKind::Cut);
        store.start(&done).unwrap();
        store.complete(&done, "/out/c.mp4").unwrap();
        store.start(&active).unwrap();

        let pruned = store.prune_finished(chrono::Duration::zero() - chrono::Duration::seconds(1));
        assert_eq!(pruned, vec![done]);
        assert_eq!(store.len(), 1);
        assert!(store.get(&active).is_some());
    }
}
