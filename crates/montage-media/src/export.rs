//! Timeline export.
//!
//! [`ExportGraphBuilder`] lowers a [`Composition`] into one filter graph:
//!
//! 1. a black canvas of the export size running for the total duration,
//! 2. one overlay per visual item, placed, rotated, faded and enabled only
//!    over its timeline window,
//! 3. one `drawtext` per text item above everything else,
//! 4. every audio contribution delayed to its offset and summed, or silence.
//!
//! [`render_export`] drives resolution, composition, graph building and the
//! encoder, reporting milestones along the way.

use std::f64::consts::PI;
use std::path::Path;

use tracing::{debug, info, warn};

use montage_models::{EncodingConfig, Resolution, Timeline};

use crate::command::InputSpec;
use crate::compositor::{
    compose, resolve_sources, AudioItem, AudioOrigin, Composition, TextItem, VisualItem, VisualKind,
};
use crate::context::MediaContext;
use crate::error::{MediaError, MediaResult};
use crate::graph::{fmt_num, Expr, Filter, Pad};
use crate::keyframe::{self, Component};
use crate::plan::{RenderOutcome, RenderPlan};
use crate::progress::{milestones, ProgressSink};
use crate::transform::{TransformResolver, PROP_ROTATION, PROP_SCALE, PROP_VOLUME};
use crate::transitions::normalize::{audio_format, silence};
use crate::transitions::clip_effects;

/// A render plan plus the degradations met while building it.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    pub plan: RenderPlan,
    pub warnings: Vec<String>,
}

/// Builds the export filter graph pass by pass.
pub struct ExportGraphBuilder<'c, 'a> {
    composition: &'c Composition<'a>,
    fps: u32,
    plan: RenderPlan,
    /// Current top of the video composite
    canvas: Pad,
    /// Input index per visual item, in composition order
    visual_inputs: Vec<usize>,
    warnings: Vec<String>,
}

impl<'c, 'a> ExportGraphBuilder<'c, 'a> {
    pub fn new(composition: &'c Composition<'a>, encoding: &EncodingConfig) -> Self {
        let export = composition.canvas.export;
        let mut plan = RenderPlan::new(Pad::label("vout"), composition.duration);
        let canvas = plan.graph.chain(
            vec![],
            vec![Filter::new("color")
                .opt("c", "black")
                .opt("s", format!("{}x{}", export.width, export.height))
                .opt("r", encoding.fps)
                .num("d", composition.duration)],
            "base",
        );

        Self {
            composition,
            fps: encoding.fps,
            plan,
            canvas,
            visual_inputs: Vec::new(),
            warnings: composition.warnings.clone(),
        }
    }

    /// Overlay every visual item in composition order.
    pub fn visual_pass(&mut self) {
        let composition = self.composition;
        for item in &composition.video {
            let input = match item.kind {
                VisualKind::Video => InputSpec::new(item.media.path())
                    .seek(item.clip.trim_start)
                    .duration(item.played),
                VisualKind::Image => InputSpec::new(item.media.path())
                    .looped_image(self.fps)
                    .duration(item.played),
            };
            let index = self.plan.add_input(input);
            self.visual_inputs.push(index);

            let (filters, overlay) = self.visual_filters(item);
            let prepared = self.plan.graph.chain(vec![Pad::video(index)], filters, "clip");
            self.canvas = self
                .plan
                .graph
                .chain(vec![self.canvas.clone(), prepared], vec![overlay], "comp");
        }
        debug!(items = composition.video.len(), "Visual pass built");
    }

    /// Filters preparing one visual item, and the overlay placing it.
    fn visual_filters(&self, item: &VisualItem<'_>) -> (Vec<Filter>, Filter) {
        let canvas = self.composition.canvas;
        let natural = Resolution::new(item.media.info.width, item.media.info.height);
        let exprs = TransformResolver::new(item.clip, natural, canvas).lower(item.start());
        let fx = clip_effects(&item.clip.transitions, item.start(), item.end(), canvas.export);

        let mut filters = vec![
            Filter::new("setpts").arg(format!("PTS-STARTPTS+{}/TB", fmt_num(item.start()))),
            Filter::new("format").arg("rgba"),
        ];

        let width = exprs.width.clone() * fx.zoom.clone();
        let height = exprs.height.clone() * fx.zoom.clone();
        let size_animated = !width.is_const() || !height.is_const();
        let rotated = exprs.rotation.as_const() != Some(0.0);
        let radians = exprs.rotation.clone() * (PI / 180.0);

        if size_animated && rotated {
            // Rotation and uniform scaling commute about the centre, so the
            // natural frame is turned first and the rotated box scaled after.
            let diagonal = (natural.width.max(1) as f64).hypot(natural.height.max(1) as f64);
            filters.push(rotate_filter(&radians, true));
            filters.push(
                Filter::new("scale")
                    .expr("w", &(width.clone() * (diagonal / natural.width.max(1) as f64)))
                    .expr("h", &(height.clone() * (diagonal / natural.height.max(1) as f64)))
                    .opt("eval", "frame"),
            );
        } else {
            filters.push(match (width.as_const(), height.as_const()) {
                (Some(w), Some(h)) => Filter::new("scale")
                    .opt("w", w.round().max(1.0) as u32)
                    .opt("h", h.round().max(1.0) as u32),
                _ => Filter::new("scale")
                    .expr("w", &width)
                    .expr("h", &height)
                    .opt("eval", "frame"),
            });
            if rotated {
                filters.push(rotate_filter(&radians, !radians.is_const()));
            }
        }

        match (&fx.mask, exprs.opacity.as_const()) {
            (None, Some(opacity)) if opacity >= 1.0 => {}
            (None, Some(opacity)) => {
                filters.push(Filter::new("colorchannelmixer").num("aa", opacity));
            }
            (mask, _) => {
                let mut alpha =
                    Expr::call("alpha", vec![Expr::var("X"), Expr::var("Y")]) * exprs.opacity.clone();
                if let Some(mask) = mask {
                    alpha = alpha * mask.clone();
                }
                filters.push(
                    Filter::new("geq")
                        .opt("r", "r(X,Y)")
                        .opt("g", "g(X,Y)")
                        .opt("b", "b(X,Y)")
                        .expr_upper("a", &alpha),
                );
            }
        }

        filters.extend(fx.fades.iter().cloned());

        // Rotated or zoomed frames are centred on the placed box
        let mut x = exprs.x.clone() + fx.offset_x.clone();
        let mut y = exprs.y.clone() + fx.offset_y.clone();
        if rotated || fx.is_zoomed() {
            x = x + (exprs.width.clone() - Expr::var("overlay_w")) / 2.0;
            y = y + (exprs.height.clone() - Expr::var("overlay_h")) / 2.0;
        }

        let overlay = Filter::new("overlay")
            .expr("x", &x)
            .expr("y", &y)
            .opt("eof_action", "pass")
            .expr("enable", &Expr::between(Expr::time(), item.start(), item.end()));

        (filters, overlay)
    }

    /// Draw every text item above the visual composite.
    pub fn text_pass(&mut self) {
        let composition = self.composition;
        for item in &composition.text {
            if let Some(filter) = self.text_filter(item) {
                self.canvas = self
                    .plan
                    .graph
                    .chain(vec![self.canvas.clone()], vec![filter], "text");
            }
        }
    }

    fn text_filter(&mut self, item: &TextItem<'_>) -> Option<Filter> {
        let clip = item.clip;
        let spec = clip.text_spec()?;
        let canvas = self.composition.canvas;
        let start = clip.start_time;
        let end = clip.end_time();

        let resolver = TransformResolver::new(clip, canvas.source, canvas);
        let exprs = resolver.lower(start);
        let fx = clip_effects(&clip.transitions, start, end, canvas.export);

        if clip.rotation != 0.0 || keyframe::is_keyframed(&clip.keyframes, PROP_ROTATION) {
            let message = format!("text clip at {:.2}s drawn without rotation", start);
            warn!("{}", message);
            self.warnings.push(message);
        }

        // Vertical scale drives the glyph size, re-evaluated per frame
        let scale_y = keyframe::lower(
            &clip.keyframes,
            PROP_SCALE,
            Component::Y,
            clip.scale.y,
            &(Expr::time() - start),
        );
        let font_size = Expr::max(scale_y * (spec.font_size * canvas.ratio().y), Expr::num(1.0));
        let alpha = Expr::clip(exprs.opacity.clone() * fx.alpha.clone(), 0.0, 1.0);

        Some(
            Filter::new("drawtext")
                .opt("text", &spec.content)
                .opt("font", &spec.font_family)
                .expr("fontsize", &font_size)
                .opt("fontcolor", &spec.color)
                .expr("x", &(exprs.x + fx.offset_x))
                .expr("y", &(exprs.y + fx.offset_y))
                .expr("alpha", &alpha)
                .expr("enable", &Expr::between(Expr::time(), start, end))
                .opt("expansion", "none"),
        )
    }

    /// Delay, scale and sum every audio contribution. Call after
    /// [`visual_pass`](Self::visual_pass); video soundtracks read from the
    /// visual inputs.
    pub fn audio_pass(&mut self) -> MediaResult<()> {
        let composition = self.composition;
        let duration = composition.duration;
        let mut tracks = Vec::with_capacity(composition.audio.len());

        for item in &composition.audio {
            let input = match item.origin {
                AudioOrigin::VideoTrack { visual_index } => self
                    .visual_inputs
                    .get(visual_index)
                    .copied()
                    .ok_or_else(|| MediaError::internal("audio pass ran before visual pass"))?,
                AudioOrigin::AudioLayer => self.plan.add_input(
                    InputSpec::new(item.media.path())
                        .seek(item.clip.trim_start)
                        .duration(item.played),
                ),
            };
            let filters = self.audio_filters(item);
            tracks.push(self.plan.graph.chain(vec![Pad::audio(input)], filters, "aud"));
        }

        let tail = vec![
            Filter::new("apad"),
            Filter::new("atrim").num("end", duration),
        ];
        let audio_out = match tracks.len() {
            0 => silence(&mut self.plan.graph, duration),
            1 => self.plan.graph.chain(tracks, tail, "amix"),
            n => {
                let mut filters = vec![Filter::new("amix")
                    .opt("inputs", n)
                    .opt("duration", "longest")
                    .opt("dropout_transition", 0)
                    .opt("normalize", 0)];
                filters.extend(tail);
                self.plan.graph.chain(tracks, filters, "amix")
            }
        };
        self.plan.audio_out = Some(audio_out);
        Ok(())
    }

    fn audio_filters(&self, item: &AudioItem<'_>) -> Vec<Filter> {
        let clip = item.clip;
        let mut filters = vec![audio_format(), Filter::new("asetpts").arg("PTS-STARTPTS")];

        // Local time: timestamps were just rebased to zero
        let volume = Expr::max(
            keyframe::lower(&clip.keyframes, PROP_VOLUME, Component::Scalar, clip.volume, &Expr::time()),
            Expr::num(0.0),
        );
        match volume.as_const() {
            Some(v) if v == 1.0 => {}
            Some(v) => filters.push(Filter::new("volume").num("volume", v)),
            None => filters.push(
                Filter::new("volume")
                    .expr("volume", &volume)
                    .opt("eval", "frame"),
            ),
        }

        let end = item.start() + item.played;
        let fx = clip_effects(&clip.transitions, item.start(), end, self.composition.canvas.export);
        filters.extend(fx.audio_fades);

        let delay_ms = (item.start() * 1000.0).round().max(0.0) as u64;
        if delay_ms > 0 {
            filters.push(Filter::new("adelay").opt("delays", delay_ms).opt("all", 1));
        }
        filters
    }

    /// Close the video chain and return the plan.
    pub fn finish(mut self) -> ExportPlan {
        let video_out = self.plan.video_out.clone();
        self.plan.graph.push(
            vec![self.canvas],
            vec![Filter::new("format").arg("yuv420p")],
            vec![video_out],
        );
        ExportPlan {
            plan: self.plan,
            warnings: self.warnings,
        }
    }
}

fn rotate_filter(radians: &Expr, animated: bool) -> Filter {
    let filter = Filter::new("rotate").expr("a", radians);
    let filter = match (animated, radians.as_const()) {
        (false, Some(a)) => filter
            .opt("ow", format!("rotw({})", fmt_num(a)))
            .opt("oh", format!("roth({})", fmt_num(a))),
        // Large enough for any angle
        _ => filter.opt("ow", "hypot(iw,ih)").opt("oh", "ow"),
    };
    filter.opt("c", "none")
}

/// Lower a composition into a complete render plan.
pub fn build_export_graph(composition: &Composition<'_>, encoding: &EncodingConfig) -> MediaResult<ExportPlan> {
    let mut builder = ExportGraphBuilder::new(composition, encoding);
    builder.visual_pass();
    builder.text_pass();
    builder.audio_pass()?;
    Ok(builder.finish())
}

/// Render `timeline` to `output`.
pub async fn render_export(
    ctx: &MediaContext,
    timeline: &Timeline,
    output: &Path,
    sink: &dyn ProgressSink,
) -> MediaResult<RenderOutcome> {
    sink.report(milestones::PARSED);

    let sources = resolve_sources(timeline, ctx.resolver.as_ref(), ctx.probe.as_ref()).await?;
    sink.report(milestones::RESOLVED);

    let composition = compose(timeline, &sources)?;
    sink.report(milestones::COMPOSED);
    info!(
        duration = composition.duration,
        visuals = composition.video.len(),
        texts = composition.text.len(),
        audio = composition.audio.len(),
        "Timeline composed"
    );

    let mut builder = ExportGraphBuilder::new(&composition, &ctx.encoding);
    builder.visual_pass();
    builder.text_pass();
    sink.report(milestones::OVERLAY);

    builder.audio_pass()?;
    sink.report(milestones::AUDIO_MIX);

    let ExportPlan { plan, warnings } = builder.finish();
    let cmd = plan.to_command(output, &ctx.encoding);
    sink.report(milestones::ENCODE_START);
    ctx.executor.execute(&cmd, plan.duration, sink).await?;
    sink.report(milestones::DONE);

    Ok(RenderOutcome {
        output: output.to_path_buf(),
        duration: plan.duration,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandExecutor, FfmpegCommand};
    use crate::compositor::{ResolvedMedia, ResolvedSources};
    use crate::probe::{MediaInfo, MediaProbe};
    use crate::resolver::MediaHandle;
    use async_trait::async_trait;
    use montage_models::{
        Clip, ClipTransitions, Direction, Easing, Keyframe, Layer, LayerKind, Phase, PropertyValue, TextSpec,
        TransitionSpec, Vec2,
    };
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    fn sources(entries: &[(&str, MediaInfo)]) -> ResolvedSources {
        let mut sources = ResolvedSources::new();
        for (id, info) in entries {
            sources.insert(ResolvedMedia {
                handle: MediaHandle::new(*id, format!("/media/{}.mp4", id)),
                info: info.clone(),
            });
        }
        sources
    }

    fn hd() -> Timeline {
        Timeline::new(Resolution::new(1920, 1080), Resolution::new(960, 540))
    }

    fn build(timeline: &Timeline, sources: &ResolvedSources) -> ExportPlan {
        let composition = compose(timeline, sources).unwrap();
        build_export_graph(&composition, &EncodingConfig::default()).unwrap()
    }

    #[test]
    fn test_single_clip_fills_canvas() {
        let tl = hd().with_layer(Layer::new(LayerKind::Video).with_clip(Clip::media("a", 0.0, 4.0)));
        let src = sources(&[("a", MediaInfo::video(10.0, 1280, 720))]);
        let export = build(&tl, &src);
        let graph = export.plan.graph.to_filter_complex();

        assert!(graph.starts_with("color=c=black:s=1920x1080:r=30:d=4[base0]"));
        assert!(graph.contains("scale=w=1920:h=1080"));
        assert!(graph.contains("overlay=x=0:y=0:eof_action=pass:enable='between(t,0,4)'"));
        assert!(graph.ends_with("format=yuv420p[vout]"));
        // Soundtrack of the single clip, padded to the duration
        assert!(graph.contains("[0:a]aformat=sample_rates=44100:channel_layouts=stereo,asetpts=PTS-STARTPTS[aud"));
        assert!(graph.contains("apad,atrim=end=4[amix"));
        assert!(export
            .plan
            .graph
            .dangling_labels(&export.plan.sinks())
            .is_empty());
        assert_eq!(
            export.plan.inputs[0].args,
            vec!["-t".to_string(), "4.000".to_string()]
        );
    }

    #[test]
    fn test_preserve_mode_maps_through_canvas_ratio() {
        let mut clip = Clip::media("a", 1.0, 3.0);
        clip.scale = Vec2::splat(0.5);
        clip.position = Vec2::new(100.0, 50.0);
        clip.opacity = 0.5;
        clip.trim_start = 2.0;
        let tl = hd().with_layer(Layer::new(LayerKind::Video).with_clip(clip));
        let src = sources(&[("a", MediaInfo::video(10.0, 640, 360).without_audio())]);
        let export = build(&tl, &src);
        let graph = export.plan.graph.to_filter_complex();

        assert!(graph.contains("setpts=PTS-STARTPTS+1/TB"));
        // 640 * 0.5 * 2
        assert!(graph.contains("scale=w=640:h=360"));
        assert!(graph.contains("colorchannelmixer=aa=0.5"));
        assert!(graph.contains("overlay=x=200:y=100"));
        assert_eq!(
            export.plan.inputs[0].args,
            vec!["-ss", "2.000", "-t", "3.000"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
        // No audio contributes: silence
        assert!(graph.contains("anullsrc=r=44100:cl=stereo,atrim=end=4"));
    }

    #[test]
    fn test_rotation_centres_on_placed_box() {
        let mut clip = Clip::media("a", 0.0, 2.0);
        clip.scale = Vec2::splat(0.5);
        clip.rotation = 90.0;
        let tl = hd().with_layer(Layer::new(LayerKind::Video).with_clip(clip));
        let src = sources(&[("a", MediaInfo::video(2.0, 960, 540))]);
        let graph = build(&tl, &src).plan.graph.to_filter_complex();

        assert!(graph.contains("rotate=a=1.570796:ow=rotw(1.570796):oh=roth(1.570796):c=none"));
        assert!(graph.contains("x=(960-overlay_w)/2"));
    }

    #[test]
    fn test_keyframed_opacity_uses_geq() {
        let mut clip = Clip::media("a", 2.0, 2.0);
        clip.keyframes = vec![
            Keyframe::new(0.0, Easing::Linear).with("opacity", PropertyValue::Scalar(0.0)),
            Keyframe::new(1.0, Easing::Linear).with("opacity", PropertyValue::Scalar(1.0)),
        ];
        let tl = hd().with_layer(Layer::new(LayerKind::Video).with_clip(clip));
        let src = sources(&[("a", MediaInfo::video(5.0, 1920, 1080))]);
        let graph = build(&tl, &src).plan.graph.to_filter_complex();

        assert!(graph.contains("geq=r='r(X,Y)'"));
        assert!(graph.contains("a='alpha(X,Y)*clip("));
        assert_eq!(graph.matches("colorchannelmixer").count(), 0);
    }

    #[test]
    fn test_clip_transitions_in_composite() {
        let mut clip = Clip::media("a", 0.0, 4.0);
        clip.transitions = ClipTransitions {
            entry: Some(TransitionSpec::Fade {
                duration: 1.0,
                phase: Phase::In,
            }),
            exit: Some(TransitionSpec::Wipe {
                duration: 1.0,
                direction: Direction::Right,
            }),
        };
        let tl = hd().with_layer(Layer::new(LayerKind::Video).with_clip(clip));
        let src = sources(&[("a", MediaInfo::video(4.0, 1920, 1080))]);
        let graph = build(&tl, &src).plan.graph.to_filter_complex();

        assert!(graph.contains("fade=t=in:st=0:d=1:alpha=1"));
        assert!(graph.contains("geq="));
        assert!(graph.contains("afade=t=in:st=0:d=1"));
        assert!(graph.contains("afade=t=out:st=3:d=1"));
    }

    #[test]
    fn test_audio_layers_are_delayed_and_summed() {
        let mut music = Clip::media("music", 1.5, 3.0);
        music.volume = 0.8;
        let tl = hd()
            .with_layer(Layer::new(LayerKind::Video).with_clip(Clip::media("a", 0.0, 5.0)))
            .with_layer(Layer::new(LayerKind::Audio).with_clip(music));
        let src = sources(&[
            ("a", MediaInfo::video(10.0, 1920, 1080)),
            ("music", MediaInfo::audio(30.0)),
        ]);
        let export = build(&tl, &src);
        let graph = export.plan.graph.to_filter_complex();

        assert!(graph.contains("volume=volume=0.8,adelay=delays=1500:all=1"));
        assert!(graph.contains("amix=inputs=2:duration=longest:dropout_transition=0:normalize=0,apad,atrim=end=5"));
        assert_eq!(export.plan.inputs.len(), 2);
    }

    #[test]
    fn test_text_drawn_last_with_scaled_font() {
        let text = Clip::text(
            TextSpec {
                content: "Hello, world".to_string(),
                font_family: "Sans".to_string(),
                font_size: 24.0,
                color: "#ffcc00".to_string(),
            },
            1.0,
            2.0,
        );
        let tl = hd()
            .with_layer(Layer::new(LayerKind::Text).with_clip(text))
            .with_layer(Layer::new(LayerKind::Video).with_clip(Clip::media("a", 0.0, 3.0)));
        let src = sources(&[("a", MediaInfo::video(3.0, 1920, 1080))]);
        let graph = build(&tl, &src).plan.graph.to_filter_complex();

        let overlay_at = graph.find("overlay=").unwrap();
        let text_at = graph.find("drawtext=").unwrap();
        assert!(text_at > overlay_at);
        assert!(graph.contains("text='Hello, world'"));
        assert!(graph.contains("fontsize=48"));
        assert!(graph.contains("enable='between(t,1,3)'"));
        assert!(graph.contains("expansion=none"));
    }

    #[test]
    fn test_keyframed_text_scale_animates_font_size() {
        let mut text = Clip::text(
            TextSpec {
                content: "Grow".to_string(),
                font_family: "Sans".to_string(),
                font_size: 24.0,
                color: "#ffffff".to_string(),
            },
            1.0,
            3.0,
        );
        text.keyframes = vec![
            Keyframe::new(0.0, Easing::Linear).with("scale", PropertyValue::Scalar(1.0)),
            Keyframe::new(2.0, Easing::Linear).with("scale", PropertyValue::Scalar(2.0)),
        ];
        let tl = hd().with_layer(Layer::new(LayerKind::Text).with_clip(text));
        let graph = build(&tl, &ResolvedSources::new()).plan.graph.to_filter_complex();

        assert!(graph.contains("fontsize='max("));
        assert!(!graph.contains("fontsize=48"));
    }

    #[test]
    fn test_text_rotation_is_reported() {
        let mut text = Clip::text(
            TextSpec {
                content: "Tilted".to_string(),
                font_family: "Sans".to_string(),
                font_size: 24.0,
                color: "#ffffff".to_string(),
            },
            0.0,
            2.0,
        );
        text.rotation = 15.0;
        let tl = hd().with_layer(Layer::new(LayerKind::Text).with_clip(text));
        let src = ResolvedSources::new();
        let export = build(&tl, &src);
        assert_eq!(export.warnings.len(), 1);
        assert!(export.warnings[0].contains("without rotation"));
    }

    #[test]
    fn test_audio_pass_needs_visual_pass() {
        let tl = hd().with_layer(Layer::new(LayerKind::Video).with_clip(Clip::media("a", 0.0, 3.0)));
        let src = sources(&[("a", MediaInfo::video(3.0, 1920, 1080))]);
        let composition = compose(&tl, &src).unwrap();
        let mut builder = ExportGraphBuilder::new(&composition, &EncodingConfig::default());
        assert!(matches!(builder.audio_pass(), Err(MediaError::Internal(_))));
    }

    struct FixedProbe;

    #[async_trait]
    impl MediaProbe for FixedProbe {
        async fn probe(&self, _path: &Path) -> MediaResult<MediaInfo> {
            Ok(MediaInfo::video(6.0, 1280, 720))
        }
    }

    #[derive(Default)]
    struct RecordingExecutor {
        commands: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn execute(
            &self,
            cmd: &FfmpegCommand,
            _expected_duration: f64,
            sink: &dyn ProgressSink,
        ) -> MediaResult<()> {
            self.commands.lock().unwrap().push(cmd.build_args());
            sink.report(0.8);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_render_export_reports_milestones() {
        let mut resolver = HashMap::new();
        resolver.insert("a".to_string(), PathBuf::from("/media/a.mp4"));
        let executor = Arc::new(RecordingExecutor::default());
        let ctx = MediaContext::new(
            Arc::new(resolver),
            Arc::new(FixedProbe),
            executor.clone(),
            EncodingConfig::default(),
            "/tmp/montage",
        );
        let tl = hd().with_layer(
            Layer::new(LayerKind::Video)
                .with_clip(Clip::media("a", 0.0, 3.0))
                .with_clip(Clip::media("missing", 3.0, 1.0)),
        );

        let reports = Mutex::new(Vec::new());
        let sink = |f: f64| reports.lock().unwrap().push(f);
        let outcome = render_export(&ctx, &tl, Path::new("/out/render.mp4"), &sink)
            .await
            .unwrap();

        assert_eq!(outcome.duration, 4.0);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(
            *reports.lock().unwrap(),
            vec![0.05, 0.15, 0.30, 0.45, 0.55, 0.60, 0.8, 1.0]
        );
        let commands = executor.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].last().unwrap(), "/out/render.mp4");
        assert!(commands[0].contains(&"+faststart".to_string()));
    }

    #[tokio::test]
    async fn test_render_export_fails_when_nothing_resolves() {
        let resolver: HashMap<String, PathBuf> = HashMap::new();
        let ctx = MediaContext::new(
            Arc::new(resolver),
            Arc::new(FixedProbe),
            Arc::new(RecordingExecutor::default()),
            EncodingConfig::default(),
            "/tmp/montage",
        );
        let tl = hd().with_layer(Layer::new(LayerKind::Video).with_clip(Clip::media("missing", 0.0, 1.0)));
        let result = render_export(&ctx, &tl, Path::new("/out/x.mp4"), &crate::progress::NoopSink).await;
        assert!(matches!(result, Err(MediaError::EmptyTimeline)));
    }
}
