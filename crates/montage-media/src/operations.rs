//! Single-source and multi-source operations: cut, trim, merge and
//! standalone transitions.

use std::path::Path;

use tracing::{debug, info};

use montage_models::{EncodingConfig, Resolution, TransitionSpec};

use crate::command::InputSpec;
use crate::context::MediaContext;
use crate::error::{MediaError, MediaResult};
use crate::graph::{Filter, Pad};
use crate::plan::{RenderOutcome, RenderPlan};
use crate::probe::MediaInfo;
use crate::progress::{milestones, NoopSink, ProgressSink};
use crate::transitions::normalize::{normalize_audio, normalize_video, silence};
use crate::transitions::{paired_plan, synthesize, SourceClip};

/// Resolve and probe one resource.
pub async fn resolve_source(ctx: &MediaContext, resource_id: &str) -> MediaResult<SourceClip> {
    let handle = ctx
        .resolver
        .find(resource_id)
        .await
        .ok_or_else(|| MediaError::missing_resource(resource_id))?;
    let info = ctx.probe.probe(&handle.path).await?;
    debug!(resource_id, duration = info.duration, "Resolved source");
    Ok(SourceClip::new(handle.path, info))
}

fn require_video(resource_id: &str, source: &SourceClip) -> MediaResult<()> {
    if source.info.has_video && source.info.duration > 0.0 {
        Ok(())
    } else {
        Err(MediaError::InvalidRequest(format!(
            "'{}' is not a video with a duration",
            resource_id
        )))
    }
}

/// Re-encode `[seek, seek + duration)` of one source.
fn segment_plan(source: &SourceClip, seek: f64, duration: f64) -> RenderPlan {
    let mut plan = RenderPlan::new(Pad::video(0), duration);
    plan.add_input(InputSpec::new(&source.path).seek(seek).duration(duration));
    if source.info.has_audio {
        plan.audio_out = Some(Pad::audio(0));
    }
    plan
}

async fn encode(
    ctx: &MediaContext,
    plan: &RenderPlan,
    output: &Path,
    encoding: &EncodingConfig,
    sink: &dyn ProgressSink,
) -> MediaResult<()> {
    let cmd = plan.to_command(output, encoding);
    ctx.executor.execute(&cmd, plan.duration, sink).await
}

/// Keep `[start, end)` of a resource. `end` past the source is clamped.
pub async fn cut(
    ctx: &MediaContext,
    resource_id: &str,
    start: f64,
    end: f64,
    output: &Path,
    sink: &dyn ProgressSink,
) -> MediaResult<RenderOutcome> {
    sink.report(milestones::PARSED);
    let source = resolve_source(ctx, resource_id).await?;
    require_video(resource_id, &source)?;
    sink.report(milestones::RESOLVED);

    let native = source.info.duration;
    if start >= native {
        return Err(MediaError::invalid_time_range(format!(
            "cut starts at {}s but '{}' is {:.3}s long",
            start, resource_id, native
        )));
    }
    let duration = end.min(native) - start;
    if duration <= 0.0 {
        return Err(MediaError::invalid_time_range(format!(
            "cut [{}, {}) is empty",
            start, end
        )));
    }

    let plan = segment_plan(&source, start, duration);
    sink.report(milestones::ENCODE_START);
    encode(ctx, &plan, output, &ctx.encoding, sink).await?;
    sink.report(milestones::DONE);
    info!(resource_id, start, duration, "Cut complete");

    Ok(RenderOutcome {
        output: output.to_path_buf(),
        duration,
        warnings: Vec::new(),
    })
}

/// Drop `trim_start` seconds from the head and `trim_end` from the tail.
pub async fn trim(
    ctx: &MediaContext,
    resource_id: &str,
    trim_start: f64,
    trim_end: f64,
    output: &Path,
    sink: &dyn ProgressSink,
) -> MediaResult<RenderOutcome> {
    sink.report(milestones::PARSED);
    let source = resolve_source(ctx, resource_id).await?;
    require_video(resource_id, &source)?;
    sink.report(milestones::RESOLVED);

    let duration = source.info.duration - trim_start - trim_end;
    if duration <= 0.0 {
        return Err(MediaError::invalid_time_range(format!(
            "trimming {}s + {}s leaves nothing of '{}' ({:.3}s)",
            trim_start, trim_end, resource_id, source.info.duration
        )));
    }

    let plan = segment_plan(&source, trim_start, duration);
    sink.report(milestones::ENCODE_START);
    encode(ctx, &plan, output, &ctx.encoding, sink).await?;
    sink.report(milestones::DONE);
    info!(resource_id, trim_start, trim_end, duration, "Trim complete");

    Ok(RenderOutcome {
        output: output.to_path_buf(),
        duration,
        warnings: Vec::new(),
    })
}

/// Concatenate sources in order, letterboxed to the first one's frame.
pub fn concat_plan(sources: &[SourceClip], fps: u32) -> MediaResult<RenderPlan> {
    let first = sources
        .first()
        .ok_or_else(|| MediaError::InvalidRequest("nothing to merge".to_string()))?;
    let target = Resolution::new(first.info.width, first.info.height);
    let total: f64 = sources.iter().map(|s| s.info.duration).sum();

    let mut plan = RenderPlan::new(Pad::label("vout"), total);
    let mut segments = Vec::with_capacity(sources.len() * 2);
    for source in sources {
        let index = plan.add_input(InputSpec::new(&source.path));
        let video = normalize_video(&mut plan.graph, Pad::video(index), target, fps);
        let audio = if source.info.has_audio {
            let audio = normalize_audio(&mut plan.graph, Pad::audio(index));
            // Keep each audio segment exactly as long as its video
            plan.graph.chain(
                vec![audio],
                vec![
                    Filter::new("apad"),
                    Filter::new("atrim").num("end", source.info.duration),
                ],
                "seg",
            )
        } else {
            silence(&mut plan.graph, source.info.duration)
        };
        segments.push(video);
        segments.push(audio);
    }

    let audio_out = Pad::label("aout");
    plan.graph.push(
        segments,
        vec![Filter::new("concat")
            .opt("n", sources.len())
            .opt("v", 1)
            .opt("a", 1)],
        vec![plan.video_out.clone(), audio_out.clone()],
    );
    plan.audio_out = Some(audio_out);
    Ok(plan)
}

/// Merge resources in order, joining every seam with `transition` when
/// given.
pub async fn merge(
    ctx: &MediaContext,
    resource_ids: &[String],
    transition: Option<&TransitionSpec>,
    output: &Path,
    sink: &dyn ProgressSink,
) -> MediaResult<RenderOutcome> {
    sink.report(milestones::PARSED);
    if resource_ids.len() < 2 {
        return Err(MediaError::InvalidRequest(
            "merge needs at least two resources".to_string(),
        ));
    }
    if let Some(spec) = transition {
        if !spec.is_paired() {
            return Err(MediaError::InvalidRequest(format!(
                "{} cannot join two clips",
                spec.kind().as_str()
            )));
        }
    }

    let mut sources = Vec::with_capacity(resource_ids.len());
    for resource_id in resource_ids {
        let source = resolve_source(ctx, resource_id).await?;
        require_video(resource_id, &source)?;
        sources.push(source);
    }
    sink.report(milestones::RESOLVED);

    let fps = ctx.encoding.fps;
    let duration = match transition {
        None => {
            let plan = concat_plan(&sources, fps)?;
            sink.report(milestones::COMPOSED);
            sink.report(milestones::ENCODE_START);
            encode(ctx, &plan, output, &ctx.encoding, sink).await?;
            plan.duration
        }
        Some(spec) => fold_with_transition(ctx, spec, &sources, output, sink).await?,
    };
    sink.report(milestones::DONE);
    info!(sources = sources.len(), duration, "Merge complete");

    Ok(RenderOutcome {
        output: output.to_path_buf(),
        duration,
        warnings: Vec::new(),
    })
}

/// Join sources pairwise: each step's output becomes the next step's first
/// source. Intermediates live in a scratch directory removed on return.
async fn fold_with_transition(
    ctx: &MediaContext,
    spec: &TransitionSpec,
    sources: &[SourceClip],
    output: &Path,
    sink: &dyn ProgressSink,
) -> MediaResult<f64> {
    tokio::fs::create_dir_all(&ctx.scratch_dir).await?;
    let scratch = tempfile::Builder::new()
        .prefix("merge-")
        .tempdir_in(&ctx.scratch_dir)?;
    let intermediate = EncodingConfig::for_intermediate().with_fps(ctx.encoding.fps);

    let (first, rest) = sources
        .split_first()
        .ok_or_else(|| MediaError::InvalidRequest("nothing to merge".to_string()))?;
    let mut current = first.clone();
    let steps = rest.len();

    for (step, next) in rest.iter().enumerate() {
        let plan = paired_plan(spec, &current, next, ctx.encoding.fps)?;
        let is_last = step + 1 == steps;

        if is_last {
            sink.report(milestones::ENCODE_START);
            encode(ctx, &plan, output, &ctx.encoding, sink).await?;
            return Ok(plan.duration);
        }

        let path = scratch.path().join(format!("step-{}.mp4", step));
        debug!(step, path = %path.display(), "Encoding merge intermediate");
        encode(ctx, &plan, &path, &intermediate, &NoopSink).await?;
        current = SourceClip::new(
            path,
            MediaInfo {
                duration: plan.duration,
                width: current.info.width,
                height: current.info.height,
                has_video: true,
                has_audio: current.info.has_audio || next.info.has_audio,
            },
        );
    }

    Err(MediaError::internal("merge fold produced no output"))
}

/// Apply one transition: single-clip kinds to `first`, paired kinds between
/// `first` and `second`.
pub async fn run_transition(
    ctx: &MediaContext,
    spec: &TransitionSpec,
    first: &str,
    second: Option<&str>,
    output: &Path,
    sink: &dyn ProgressSink,
) -> MediaResult<RenderOutcome> {
    sink.report(milestones::PARSED);
    let first_source = resolve_source(ctx, first).await?;
    require_video(first, &first_source)?;
    let second_source = match second {
        Some(id) => {
            let source = resolve_source(ctx, id).await?;
            require_video(id, &source)?;
            Some(source)
        }
        None => None,
    };
    sink.report(milestones::RESOLVED);

    let plan = synthesize(spec, &first_source, second_source.as_ref(), ctx.encoding.fps)?;
    sink.report(milestones::COMPOSED);
    sink.report(milestones::ENCODE_START);
    encode(ctx, &plan, output, &ctx.encoding, sink).await?;
    sink.report(milestones::DONE);
    info!(transition = %spec, duration = plan.duration, "Transition complete");

    Ok(RenderOutcome {
        output: output.to_path_buf(),
        duration: plan.duration,
        warnings: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandExecutor, FfmpegCommand};
    use crate::probe::MediaProbe;
    use async_trait::async_trait;
    use montage_models::Direction;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Probe answering from a table keyed by file name.
    struct TableProbe(HashMap<String, MediaInfo>);

    #[async_trait]
    impl MediaProbe for TableProbe {
        async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            self.0
                .get(&name)
                .cloned()
                .ok_or_else(|| MediaError::FileNotFound(path.to_path_buf()))
        }
    }

    #[derive(Default)]
    struct RecordingExecutor {
        runs: Mutex<Vec<(Vec<String>, f64)>>,
    }

    impl RecordingExecutor {
        fn runs(&self) -> Vec<(Vec<String>, f64)> {
            self.runs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn execute(
            &self,
            cmd: &FfmpegCommand,
            expected_duration: f64,
            _sink: &dyn ProgressSink,
        ) -> MediaResult<()> {
            self.runs
                .lock()
                .unwrap()
                .push((cmd.build_args(), expected_duration));
            Ok(())
        }
    }

    fn context(scratch: &Path, media: &[(&str, MediaInfo)]) -> (MediaContext, Arc<RecordingExecutor>) {
        let resolver: HashMap<String, PathBuf> = media
            .iter()
            .map(|(id, _)| (id.to_string(), PathBuf::from(format!("/media/{}.mp4", id))))
            .collect();
        let probe = TableProbe(
            media
                .iter()
                .map(|(id, info)| (id.to_string(), info.clone()))
                .collect(),
        );
        let executor = Arc::new(RecordingExecutor::default());
        let ctx = MediaContext::new(
            Arc::new(resolver),
            Arc::new(probe),
            executor.clone(),
            EncodingConfig::default(),
            scratch,
        );
        (ctx, executor)
    }

    fn wipe() -> TransitionSpec {
        TransitionSpec::Wipe {
            duration: 1.0,
            direction: Direction::Right,
        }
    }

    #[tokio::test]
    async fn test_cut_clamps_end_to_source() {
        let dir = TempDir::new().unwrap();
        let (ctx, executor) = context(dir.path(), &[("a", MediaInfo::video(10.0, 1280, 720))]);

        let outcome = cut(&ctx, "a", 4.0, 30.0, Path::new("/out/cut.mp4"), &NoopSink)
            .await
            .unwrap();
        assert_eq!(outcome.duration, 6.0);

        let runs = executor.runs();
        let args = runs[0].0.join(" ");
        assert!(args.contains("-ss 4.000 -t 6.000 -i /media/a.mp4"));
        assert!(args.contains("-map 0:v -map 0:a"));
    }

    #[tokio::test]
    async fn test_cut_past_end_is_invalid() {
        let dir = TempDir::new().unwrap();
        let (ctx, executor) = context(dir.path(), &[("a", MediaInfo::video(5.0, 1280, 720))]);
        let result = cut(&ctx, "a", 5.0, 8.0, Path::new("/out/cut.mp4"), &NoopSink).await;
        assert!(matches!(result, Err(MediaError::InvalidTimeRange(_))));
        assert!(executor.runs().is_empty());
    }

    #[tokio::test]
    async fn test_trim_usable_duration() {
        let dir = TempDir::new().unwrap();
        let (ctx, _) = context(dir.path(), &[("a", MediaInfo::video(5.0, 1280, 720))]);
        let outcome = trim(&ctx, "a", 1.0, 2.0, Path::new("/out/trim.mp4"), &NoopSink)
            .await
            .unwrap();
        assert_eq!(outcome.duration, 2.0);

        let result = trim(&ctx, "a", 3.0, 2.0, Path::new("/out/trim.mp4"), &NoopSink).await;
        assert!(matches!(result, Err(MediaError::InvalidTimeRange(_))));
    }

    #[tokio::test]
    async fn test_unknown_resource_is_missing() {
        let dir = TempDir::new().unwrap();
        let (ctx, _) = context(dir.path(), &[]);
        let result = trim(&ctx, "ghost", 0.0, 0.0, Path::new("/out/x.mp4"), &NoopSink).await;
        assert!(matches!(result, Err(MediaError::MissingResource(_))));
    }

    #[test]
    fn test_concat_fills_missing_audio_with_silence() {
        let sources = vec![
            SourceClip::new("/media/a.mp4", MediaInfo::video(2.0, 1280, 720)),
            SourceClip::new("/media/b.mp4", MediaInfo::video(3.0, 640, 480).without_audio()),
        ];
        let plan = concat_plan(&sources, 30).unwrap();
        let graph = plan.graph.to_filter_complex();

        assert_eq!(plan.duration, 5.0);
        assert!(graph.contains("anullsrc=r=44100:cl=stereo,atrim=end=3"));
        assert!(graph.contains("concat=n=2:v=1:a=1[vout][aout]"));
        assert_eq!(graph.matches("scale=w=1280:h=720").count(), 2);
        assert!(plan.graph.dangling_labels(&plan.sinks()).is_empty());
    }

    #[tokio::test]
    async fn test_merge_folds_through_intermediates() {
        let dir = TempDir::new().unwrap();
        let (ctx, executor) = context(
            dir.path(),
            &[
                ("a", MediaInfo::video(3.0, 1280, 720)),
                ("b", MediaInfo::video(3.0, 1280, 720)),
                ("c", MediaInfo::video(3.0, 1280, 720)),
            ],
        );
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let outcome = merge(&ctx, &ids, Some(&wipe()), Path::new("/out/merged.mp4"), &NoopSink)
            .await
            .unwrap();
        // 3 + 3 - 1, then 5 + 3 - 1
        assert_eq!(outcome.duration, 7.0);

        let runs = executor.runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].1, 5.0);
        assert_eq!(runs[1].1, 7.0);
        // The first step's output is the second step's first input
        let intermediate = runs[0].0.last().unwrap().clone();
        assert!(intermediate.ends_with("step-0.mp4"));
        assert!(runs[1].0.contains(&intermediate));
        assert_eq!(runs[1].0.last().unwrap(), "/out/merged.mp4");
        // Scratch directory is gone once the merge returns
        assert!(!Path::new(&intermediate).parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_merge_without_transition_is_one_concat() {
        let dir = TempDir::new().unwrap();
        let (ctx, executor) = context(
            dir.path(),
            &[
                ("a", MediaInfo::video(2.0, 1280, 720)),
                ("b", MediaInfo::video(2.5, 1280, 720)),
            ],
        );
        let ids = vec!["a".to_string(), "b".to_string()];
        let outcome = merge(&ctx, &ids, None, Path::new("/out/m.mp4"), &NoopSink)
            .await
            .unwrap();
        assert_eq!(outcome.duration, 4.5);
        assert_eq!(executor.runs().len(), 1);
    }

    #[tokio::test]
    async fn test_merge_rejects_single_clip_transition() {
        let dir = TempDir::new().unwrap();
        let (ctx, _) = context(dir.path(), &[]);
        let ids = vec!["a".to_string(), "b".to_string()];
        let fade = TransitionSpec::Fade {
            duration: 1.0,
            phase: montage_models::Phase::In,
        };
        let result = merge(&ctx, &ids, Some(&fade), Path::new("/out/m.mp4"), &NoopSink).await;
        assert!(matches!(result, Err(MediaError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_paired_transition_output_duration() {
        let dir = TempDir::new().unwrap();
        let (ctx, executor) = context(
            dir.path(),
            &[
                ("a", MediaInfo::video(3.0, 1920, 1080)),
                ("b", MediaInfo::video(3.0, 1920, 1080)),
            ],
        );
        let outcome = run_transition(&ctx, &wipe(), "a", Some("b"), Path::new("/out/t.mp4"), &NoopSink)
            .await
            .unwrap();
        assert_eq!(outcome.duration, 5.0);
        assert_eq!(executor.runs()[0].1, 5.0);
    }
}
