//! Render pipeline: runs one request against the media layer and publishes
//! the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;

use montage_media::{
    cut, merge, remove_artifact, render_export, run_transition, trim, MediaContext, MediaResult,
    ProgressSink, RenderOutcome,
};
use montage_models::RenderRequest;
use montage_storage::{LocalMediaStore, OutputStore};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::executor::{JobOutput, JobRunner, RenderJob};
use crate::logging::TaskLogger;

/// Encodes into the work directory, then moves finished files into the
/// output store.
#[derive(Debug, Clone)]
pub struct RenderPipeline {
    ctx: MediaContext,
    outputs: OutputStore,
    work_dir: PathBuf,
}

impl RenderPipeline {
    pub fn new(ctx: MediaContext, outputs: OutputStore, work_dir: impl AsRef<Path>) -> Self {
        Self {
            ctx,
            outputs,
            work_dir: work_dir.as_ref().to_path_buf(),
        }
    }

    /// Pipeline backed by the local media store and the FFmpeg binaries.
    pub async fn from_config(config: &WorkerConfig) -> WorkerResult<Self> {
        fs::create_dir_all(&config.work_dir).await?;
        let media = LocalMediaStore::open(&config.media_root).await?;
        let outputs = OutputStore::open(&config.output_dir).await?;
        let ctx = MediaContext::with_ffmpeg(
            Arc::new(media),
            config.encoding.clone(),
            &config.work_dir,
            config.encode_timeout.as_secs(),
        );
        Ok(Self::new(ctx, outputs, &config.work_dir))
    }

    pub fn outputs(&self) -> &OutputStore {
        &self.outputs
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// In-progress encode location for a task.
    pub fn work_path(&self, task_id: &str) -> PathBuf {
        self.work_dir.join(format!("{}.mp4", task_id))
    }

    async fn render(
        &self,
        request: &RenderRequest,
        output: &Path,
        sink: &dyn ProgressSink,
    ) -> MediaResult<RenderOutcome> {
        let ctx = &self.ctx;
        match request {
            RenderRequest::Export { timeline } => render_export(ctx, timeline, output, sink).await,
            RenderRequest::Cut {
                resource_id,
                start,
                end,
            } => cut(ctx, resource_id, *start, *end, output, sink).await,
            RenderRequest::Trim {
                resource_id,
                trim_start,
                trim_end,
            } => trim(ctx, resource_id, *trim_start, *trim_end, output, sink).await,
            RenderRequest::Merge {
                resource_ids,
                transition,
            } => merge(ctx, resource_ids, transition.as_ref(), output, sink).await,
            RenderRequest::Transition {
                first,
                second,
                spec,
            } => run_transition(ctx, spec, first, second.as_deref(), output, sink).await,
        }
    }
}

#[async_trait]
impl JobRunner for RenderPipeline {
    async fn run(&self, job: &RenderJob, sink: &dyn ProgressSink) -> WorkerResult<JobOutput> {
        let logger = TaskLogger::new(&job.task_id, job.request.kind());
        let work_path = self.work_path(job.task_id.as_str());

        let outcome = match self.render(&job.request, &work_path, sink).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(clean) = remove_artifact(&work_path).await {
                    logger.log_warning(&format!("partial output left behind: {}", clean));
                }
                return Err(e.into());
            }
        };

        for warning in &outcome.warnings {
            logger.log_warning(warning);
        }

        let location = self
            .outputs
            .publish(&outcome.output, job.task_id.as_str())
            .await?;

        Ok(JobOutput {
            location,
            duration: outcome.duration,
            warnings: outcome.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_media::{CommandExecutor, FfmpegCommand, MediaError, MediaInfo, MediaProbe};
    use montage_models::{TaskId, TransitionSpec};
    use tempfile::TempDir;

    struct FixedProbe;

    #[async_trait]
    impl MediaProbe for FixedProbe {
        async fn probe(&self, _path: &Path) -> MediaResult<MediaInfo> {
            Ok(MediaInfo::video(3.0, 640, 360))
        }
    }

    /// Writes a placeholder file wherever the encoder was asked to.
    struct TouchExecutor;

    #[async_trait]
    impl CommandExecutor for TouchExecutor {
        async fn execute(
            &self,
            cmd: &FfmpegCommand,
            _expected_duration: f64,
            sink: &dyn ProgressSink,
        ) -> MediaResult<()> {
            sink.report(0.9);
            fs::write(cmd.output(), b"encoded").await?;
            Ok(())
        }
    }

    struct Fixture {
        _media: TempDir,
        work: TempDir,
        out: TempDir,
        pipeline: RenderPipeline,
    }

    async fn fixture() -> Fixture {
        let media = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        for name in ["a.mp4", "b.mp4"] {
            fs::write(media.path().join(name), b"source").await.unwrap();
        }

        let store = LocalMediaStore::open(media.path()).await.unwrap();
        let ctx = MediaContext::new(
            Arc::new(store),
            Arc::new(FixedProbe),
            Arc::new(TouchExecutor),
            Default::default(),
            work.path(),
        );
        let outputs = OutputStore::open(out.path()).await.unwrap();
        let pipeline = RenderPipeline::new(ctx, outputs, work.path());
        Fixture {
            _media: media,
            work,
            out,
            pipeline,
        }
    }

    fn job(request: RenderRequest) -> RenderJob {
        RenderJob {
            task_id: TaskId::from_string("task-1"),
            request,
        }
    }

    #[tokio::test]
    async fn test_cut_is_published() {
        let f = fixture().await;
        let job = job(RenderRequest::Cut {
            resource_id: "a".into(),
            start: 0.5,
            end: 2.0,
        });

        let output = f.pipeline.run(&job, &montage_media::NoopSink).await.unwrap();
        assert_eq!(output.location, f.out.path().join("task-1.mp4"));
        assert!((output.duration - 1.5).abs() < 1e-9);
        assert!(output.location.exists());
        assert!(!f.work.path().join("task-1.mp4").exists());
    }

    #[tokio::test]
    async fn test_transition_between_two_sources() {
        let f = fixture().await;
        let job = job(RenderRequest::Transition {
            first: "a".into(),
            second: Some("b".into()),
            spec: TransitionSpec::Dissolve { duration: 1.0 },
        });

        let output = f.pipeline.run(&job, &montage_media::NoopSink).await.unwrap();
        assert!((output.duration - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_resource_fails_without_output() {
        let f = fixture().await;
        let job = job(RenderRequest::Trim {
            resource_id: "zz".into(),
            trim_start: 0.0,
            trim_end: 1.0,
        });

        let err = f.pipeline.run(&job, &montage_media::NoopSink).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::WorkerError::Media(MediaError::MissingResource(_))
        ));
        assert!(!f.out.path().join("task-1.mp4").exists());
    }
}
