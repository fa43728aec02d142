//! Structured task logging.

use tracing::{error, info, warn, Span};

use montage_models::{TaskId, TaskKind};

/// Logs task lifecycle events with consistent `task_id`/`operation` fields.
#[derive(Debug, Clone)]
pub struct TaskLogger {
    task_id: String,
    operation: &'static str,
}

impl TaskLogger {
    pub fn new(task_id: &TaskId, kind: TaskKind) -> Self {
        Self {
            task_id: task_id.to_string(),
            operation: kind.as_str(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            task_id = %self.task_id,
            operation = self.operation,
            "Task started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            task_id = %self.task_id,
            operation = self.operation,
            "Task progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            task_id = %self.task_id,
            operation = self.operation,
            "Task warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            task_id = %self.task_id,
            operation = self.operation,
            "Task error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            task_id = %self.task_id,
            operation = self.operation,
            "Task completed: {}", message
        );
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn operation(&self) -> &str {
        self.operation
    }

    /// Span carrying the task fields, for instrumenting the render future.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "task",
            task_id = %self.task_id,
            operation = self.operation
        )
    }
}
