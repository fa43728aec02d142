//! Fixed-size render worker pool.
//!
//! Submitted jobs wait in a bounded channel; `max_concurrent_renders`
//! workers pull from it, so at most that many renders run at once no matter
//! how many are queued.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use montage_media::{remove_artifact, ProgressSink};
use montage_models::{RenderRequest, TaskId, TaskStatus};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::TaskLogger;
use crate::metrics;
use crate::task_store::{TaskProgress, TaskStore};

/// A queued request bound to its task.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub task_id: TaskId,
    pub request: RenderRequest,
}

/// What a successful job produced.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput {
    pub location: PathBuf,
    /// Output length in seconds
    pub duration: f64,
    pub warnings: Vec<String>,
}

/// Performs the work of one job.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run(&self, job: &RenderJob, sink: &dyn ProgressSink) -> WorkerResult<JobOutput>;
}

/// Pool of workers draining the render queue.
pub struct WorkerPool {
    sender: mpsc::Sender<RenderJob>,
    workers: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    /// Spawn `workers` workers over a queue of `queue_capacity` jobs.
    pub fn start(
        workers: usize,
        queue_capacity: usize,
        store: Arc<TaskStore>,
        runner: Arc<dyn JobRunner>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let (shutdown, _) = watch::channel(false);

        info!(
            "Starting render pool with {} workers, queue capacity {}",
            workers, queue_capacity
        );

        let workers = (0..workers.max(1))
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let store = Arc::clone(&store);
                let runner = Arc::clone(&runner);
                let shutdown_rx = shutdown.subscribe();
                tokio::spawn(worker_loop(worker_id, receiver, store, runner, shutdown_rx))
            })
            .collect();

        Self {
            sender,
            workers,
            shutdown,
        }
    }

    /// Queue a job. Waits while the queue is full.
    pub async fn submit(&self, job: RenderJob) -> WorkerResult<()> {
        self.sender
            .send(job)
            .await
            .map_err(|_| WorkerError::QueueClosed)
    }

    /// Jobs that can still be queued without waiting.
    pub fn available_capacity(&self) -> usize {
        self.sender.capacity()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting jobs and let queued ones drain. Workers still busy
    /// after `timeout` are stopped; their encoders are not interrupted.
    pub async fn shutdown(self, timeout: Duration) {
        let WorkerPool {
            sender,
            workers,
            shutdown,
        } = self;
        drop(sender);

        let mut workers = workers;
        let drained = tokio::time::timeout(timeout, async {
            for handle in workers.iter_mut() {
                let _ = handle.await;
            }
        })
        .await;

        if drained.is_err() {
            warn!("Render pool did not drain within {:?}, stopping workers", timeout);
            let _ = shutdown.send(true);
            for handle in &workers {
                handle.abort();
            }
        }
        info!("Render pool stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<RenderJob>>>,
    store: Arc<TaskStore>,
    runner: Arc<dyn JobRunner>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    debug!(worker_id, "Render worker started");
    loop {
        let next = tokio::select! {
            _ = shutdown_rx.changed() => break,
            job = async { receiver.lock().await.recv().await } => job,
        };
        let Some(job) = next else { break };
        execute_job(&store, runner.as_ref(), job).await;
    }
    debug!(worker_id, "Render worker stopped");
}

/// Run one job and record its terminal state.
pub(crate) async fn execute_job(store: &Arc<TaskStore>, runner: &dyn JobRunner, job: RenderJob) {
    let kind = job.request.kind();
    let logger = TaskLogger::new(&job.task_id, kind);

    match store.start(&job.task_id) {
        Ok(true) => {}
        Ok(false) => {
            logger.log_progress("skipped, cancelled before a worker picked it up");
            metrics::record_render_skipped(kind.as_str());
            return;
        }
        Err(e) => {
            logger.log_error(&format!("not in the store: {}", e));
            return;
        }
    }

    metrics::record_render_started(kind.as_str());
    logger.log_start(&format!("{} resource(s)", job.request.resources().len()));

    let started = Instant::now();
    let sink = TaskProgress::new(Arc::clone(store), job.task_id.clone());
    let result = runner
        .run(&job, &sink)
        .instrument(logger.create_span())
        .await;

    match result {
        Ok(output) => {
            metrics::record_render_completed(kind.as_str(), started.elapsed().as_secs_f64());
            let location = output.location.display().to_string();
            let recorded = store
                .add_warnings(&job.task_id, &output.warnings)
                .and_then(|()| store.complete(&job.task_id, &location));
            match recorded {
                Ok(TaskStatus::Cancelled) => {
                    discard_output(&logger, &output.location).await;
                }
                Ok(status) => logger.log_completion(&format!(
                    "{} ({:.3}s, {}, status {})",
                    location,
                    output.duration,
                    pluralize_warnings(output.warnings.len()),
                    status
                )),
                Err(e) => logger.log_error(&format!("could not record completion: {}", e)),
            }
        }
        Err(e) => {
            metrics::record_render_failed(kind.as_str(), e.kind());
            let message = e.status_message();
            logger.log_error(&message);
            if let Err(record_err) = store.fail(&job.task_id, &message) {
                logger.log_error(&format!("could not record failure: {}", record_err));
            }
        }
    }
}

/// Remove the output of a task that was cancelled while it rendered.
async fn discard_output(logger: &TaskLogger, location: &Path) {
    match remove_artifact(location).await {
        Ok(removed) => logger.log_progress(&format!(
            "cancelled during render, output discarded (removed: {})",
            removed
        )),
        Err(e) => {
            metrics::record_cleanup_failure();
            logger.log_error(&format!("could not discard output of cancelled task: {}", e));
        }
    }
}

fn pluralize_warnings(count: usize) -> String {
    match count {
        1 => "1 warning".to_string(),
        n => format!("{} warnings", n),
    }
}
