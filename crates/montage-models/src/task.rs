//! Task records for render/cut/trim/merge requests.
//!
//! A [`TaskRecord`] is the mutable status owned by the task store; the
//! [`TaskStatusDocument`] is the snapshot handed to polling callers.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for a worker
    #[default]
    Pending,
    /// A worker is running it
    Processing,
    /// Output written
    Completed,
    /// Terminated with an error
    Failed,
    /// Cancelled by the caller (advisory)
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// No further updates are accepted in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Processing)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Export,
    Cut,
    Trim,
    Merge,
    Transition,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Export => "export",
            TaskKind::Cut => "cut",
            TaskKind::Trim => "trim",
            TaskKind::Merge => "merge",
            TaskKind::Transition => "transition",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot move task from {} to {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// Mutable status of one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    /// Fraction in [0, 1]
    pub progress: f64,
    pub message: Option<String>,
    pub output_location: Option<String>,
    /// Non-fatal degradations (dropped clips and the like)
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(task_id: TaskId, kind: TaskKind) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            kind,
            status: TaskStatus::Pending,
            progress: 0.0,
            message: None,
            output_location: None,
            warnings: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move `pending → processing`.
    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        if self.status != TaskStatus::Pending {
            return Err(InvalidTransition {
                from: self.status,
                to: TaskStatus::Processing,
            });
        }
        self.status = TaskStatus::Processing;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record progress. Ignored once terminal; never moves backwards.
    pub fn set_progress(&mut self, fraction: f64) {
        if self.is_terminal() || !fraction.is_finite() {
            return;
        }
        self.progress = fraction.clamp(0.0, 1.0).max(self.progress);
        self.updated_at = Utc::now();
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
        self.updated_at = Utc::now();
    }

    /// Mark completed. A task that already reached a terminal state (for
    /// instance `cancelled`) keeps it.
    pub fn complete(&mut self, output_location: impl Into<String>) -> Result<(), InvalidTransition> {
        if self.is_terminal() {
            return Err(InvalidTransition {
                from: self.status,
                to: TaskStatus::Completed,
            });
        }
        let now = Utc::now();
        self.status = TaskStatus::Completed;
        self.progress = 1.0;
        self.output_location = Some(output_location.into());
        self.message = Some(self.summary("Completed"));
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Mark failed with the triggering error message.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), InvalidTransition> {
        if self.is_terminal() {
            return Err(InvalidTransition {
                from: self.status,
                to: TaskStatus::Failed,
            });
        }
        let now = Utc::now();
        self.status = TaskStatus::Failed;
        self.message = Some(self.summary(&error.into()));
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Cancel a pending or processing task.
    pub fn cancel(&mut self) -> Result<(), InvalidTransition> {
        if !self.status.is_cancellable() {
            return Err(InvalidTransition {
                from: self.status,
                to: TaskStatus::Cancelled,
            });
        }
        let now = Utc::now();
        self.status = TaskStatus::Cancelled;
        self.message = Some("Cancelled by request".to_string());
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }

    fn summary(&self, head: &str) -> String {
        if self.warnings.is_empty() {
            head.to_string()
        } else {
            format!(
                "{} ({} warning(s): {})",
                head,
                self.warnings.len(),
                self.warnings.join("; ")
            )
        }
    }

    /// Snapshot for polling callers.
    pub fn to_document(&self) -> TaskStatusDocument {
        TaskStatusDocument {
            task_id: self.task_id.clone(),
            kind: self.kind,
            status: self.status,
            progress: (self.progress * 100.0).round().clamp(0.0, 100.0) as u8,
            message: self.message.clone(),
            output_location: self.output_location.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

/// Task status exposed to polling callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusDocument {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    /// Percentage 0-100
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_record_lifecycle() {
        let mut record = TaskRecord::new(TaskId::new(), TaskKind::Export);
        assert_eq!(record.status, TaskStatus::Pending);

        record.start().unwrap();
        record.set_progress(0.45);
        assert_eq!(record.to_document().progress, 45);

        record.complete("/out/a.mp4").unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.progress, 1.0);
        assert!(record.completed_at.is_some());
        assert_eq!(record.output_location.as_deref(), Some("/out/a.mp4"));
    }

    #[test]
    fn test_cancelled_task_is_not_overwritten_by_completion() {
        let mut record = TaskRecord::new(TaskId::new(), TaskKind::Export);
        record.start().unwrap();
        record.cancel().unwrap();

        assert!(record.complete("/out/a.mp4").is_err());
        assert!(record.fail("boom").is_err());
        assert_eq!(record.status, TaskStatus::Cancelled);
        assert!(record.output_location.is_none());
    }

    #[test]
    fn test_only_active_tasks_are_cancellable() {
        let mut record = TaskRecord::new(TaskId::new(), TaskKind::Cut);
        record.start().unwrap();
        record.fail("encoder exited with 1").unwrap();
        assert!(record.cancel().is_err());
        assert_eq!(record.status, TaskStatus::Failed);
    }

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let mut record = TaskRecord::new(TaskId::new(), TaskKind::Merge);
        record.set_progress(0.6);
        record.set_progress(0.3);
        assert_eq!(record.progress, 0.6);
        record.set_progress(7.0);
        assert_eq!(record.progress, 1.0);
    }

    #[test]
    fn test_warnings_surface_in_message() {
        let mut record = TaskRecord::new(TaskId::new(), TaskKind::Export);
        record.start().unwrap();
        record.add_warning("clip 'x' dropped: resource not found");
        record.complete("/out/b.mp4").unwrap();
        let message = record.to_document().message.unwrap();
        assert!(message.contains("1 warning"));
        assert!(message.contains("dropped"));
    }

    #[test]
    fn test_status_document_is_camel_case() {
        let record = TaskRecord::new(TaskId::from_string("t-1"), TaskKind::Trim);
        let json = serde_json::to_value(record.to_document()).unwrap();
        assert_eq!(json["taskId"], "t-1");
        assert_eq!(json["status"], "pending");
        assert!(json.get("completedAt").is_none());
    }
}
