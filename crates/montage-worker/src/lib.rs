//! Render task orchestration.
//!
//! This crate provides:
//! - A task store tracking pending/processing/terminal state
//! - A fixed-size worker pool fed by a bounded queue
//! - The render pipeline dispatching requests to the media layer
//! - Idempotent artifact cleanup with backoff

pub mod cleanup;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod service;
pub mod task_store;

pub use cleanup::{ArtifactJanitor, CleanupReport};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobOutput, JobRunner, RenderJob, WorkerPool};
pub use logging::TaskLogger;
pub use pipeline::RenderPipeline;
pub use retry::{retry_async, retry_async_if, Exhausted, RetryConfig};
pub use service::TaskService;
pub use task_store::{TaskProgress, TaskStore};
