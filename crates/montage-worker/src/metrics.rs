//! Prometheus metrics for the render worker.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const TASKS_SUBMITTED_TOTAL: &str = "montage_tasks_submitted_total";
    pub const RENDERS_STARTED_TOTAL: &str = "montage_renders_started_total";
    pub const RENDERS_COMPLETED_TOTAL: &str = "montage_renders_completed_total";
    pub const RENDERS_FAILED_TOTAL: &str = "montage_renders_failed_total";
    pub const RENDERS_SKIPPED_TOTAL: &str = "montage_renders_skipped_total";
    pub const RENDER_DURATION_SECONDS: &str = "montage_render_duration_seconds";
    pub const WORKERS_BUSY: &str = "montage_workers_busy";
    pub const CLEANUP_FAILURES_TOTAL: &str = "montage_cleanup_failures_total";
}

/// Install the Prometheus recorder with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

pub fn record_task_submitted(kind: &str) {
    counter!(names::TASKS_SUBMITTED_TOTAL, "kind" => kind.to_string()).increment(1);
}

pub fn record_render_started(kind: &str) {
    counter!(names::RENDERS_STARTED_TOTAL, "kind" => kind.to_string()).increment(1);
    gauge!(names::WORKERS_BUSY).increment(1.0);
}

pub fn record_render_completed(kind: &str, duration_secs: f64) {
    counter!(names::RENDERS_COMPLETED_TOTAL, "kind" => kind.to_string()).increment(1);
    histogram!(names::RENDER_DURATION_SECONDS, "kind" => kind.to_string()).record(duration_secs);
    gauge!(names::WORKERS_BUSY).decrement(1.0);
}

pub fn record_render_failed(kind: &str, reason: &str) {
    let labels = [("kind", kind.to_string()), ("reason", reason.to_string())];
    counter!(names::RENDERS_FAILED_TOTAL, &labels).increment(1);
    gauge!(names::WORKERS_BUSY).decrement(1.0);
}

/// A dequeued task that was cancelled before a worker reached it.
pub fn record_render_skipped(kind: &str) {
    counter!(names::RENDERS_SKIPPED_TOTAL, "kind" => kind.to_string()).increment(1);
}

pub fn record_cleanup_failure() {
    counter!(names::CLEANUP_FAILURES_TOTAL).increment(1);
}
