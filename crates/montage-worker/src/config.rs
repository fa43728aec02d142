//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use montage_models::EncodingConfig;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Renders running at once; further requests wait in the queue
    pub max_concurrent_renders: usize,
    /// Requests that may wait for a worker before `submit` applies backpressure
    pub queue_capacity: usize,
    /// Scratch space for in-progress encodes and merge intermediates
    pub work_dir: PathBuf,
    /// Root of the content-addressed media store
    pub media_root: PathBuf,
    /// Where finished renders are published
    pub output_dir: PathBuf,
    /// Kill an encoder that runs longer than this
    pub encode_timeout: Duration,
    /// Retries for a locked artifact during cleanup
    pub cleanup_retries: u32,
    /// First backoff delay for cleanup retries (doubles each attempt)
    pub cleanup_base_delay: Duration,
    /// Time allowed for queued renders to drain on shutdown
    pub shutdown_timeout: Duration,
    /// Terminal task records older than this are pruned
    pub task_retention: Duration,
    /// Prometheus listener; metrics are not exported when unset
    pub metrics_addr: Option<SocketAddr>,
    pub encoding: EncodingConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_renders: 3,
            queue_capacity: 64,
            work_dir: PathBuf::from("/tmp/montage/work"),
            media_root: PathBuf::from("media"),
            output_dir: PathBuf::from("/tmp/montage/output"),
            encode_timeout: Duration::from_secs(3600), // 1 hour
            cleanup_retries: 5,
            cleanup_base_delay: Duration::from_millis(200),
            shutdown_timeout: Duration::from_secs(60),
            task_retention: Duration::from_secs(24 * 3600),
            metrics_addr: None,
            encoding: EncodingConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut encoding = defaults.encoding.clone();
        if let Ok(preset) = std::env::var("MONTAGE_ENCODE_PRESET") {
            encoding.preset = preset;
        }
        encoding.crf = env_or("MONTAGE_ENCODE_CRF", encoding.crf);
        encoding.fps = env_or("MONTAGE_ENCODE_FPS", encoding.fps);

        Self {
            max_concurrent_renders: env_or("MONTAGE_MAX_RENDERS", defaults.max_concurrent_renders),
            queue_capacity: env_or("MONTAGE_QUEUE_CAPACITY", defaults.queue_capacity),
            work_dir: std::env::var("MONTAGE_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            media_root: std::env::var("MONTAGE_MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
            output_dir: std::env::var("MONTAGE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            encode_timeout: Duration::from_secs(env_or("MONTAGE_ENCODE_TIMEOUT_SECS", 3600)),
            cleanup_retries: env_or("MONTAGE_CLEANUP_RETRIES", defaults.cleanup_retries),
            cleanup_base_delay: Duration::from_millis(env_or("MONTAGE_CLEANUP_BASE_DELAY_MS", 200)),
            shutdown_timeout: Duration::from_secs(env_or("MONTAGE_SHUTDOWN_TIMEOUT_SECS", 60)),
            task_retention: Duration::from_secs(env_or("MONTAGE_TASK_RETENTION_SECS", 24 * 3600)),
            metrics_addr: std::env::var("MONTAGE_METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
            encoding,
        }
    }

    /// Reject settings the pool cannot run with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.max_concurrent_renders == 0 {
            return Err(WorkerError::config_error("MONTAGE_MAX_RENDERS must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(WorkerError::config_error("MONTAGE_QUEUE_CAPACITY must be at least 1"));
        }
        if self.encoding.fps == 0 {
            return Err(WorkerError::config_error("MONTAGE_ENCODE_FPS must be at least 1"));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_renders, 3);
        assert_eq!(config.queue_capacity, 64);
        assert!(config.metrics_addr.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = WorkerConfig {
            max_concurrent_renders: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(WorkerError::ConfigError(_))));
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("MONTAGE_TEST_ENV_OR", "not-a-number");
        assert_eq!(env_or("MONTAGE_TEST_ENV_OR", 7usize), 7);
        std::env::set_var("MONTAGE_TEST_ENV_OR", "12");
        assert_eq!(env_or("MONTAGE_TEST_ENV_OR", 7usize), 12);
        std::env::remove_var("MONTAGE_TEST_ENV_OR");
    }
}
