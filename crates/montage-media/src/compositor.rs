//! Timeline composition.
//!
//! [`resolve_sources`] looks every referenced resource up once and probes
//! it. [`compose`] then walks the layers and produces time-ordered visual,
//! text and audio tracks. Both steps are independent of filter syntax; the
//! export graph is built from the resulting [`Composition`].

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use montage_models::{Clip, LayerKind, Timeline};

use crate::error::{MediaError, MediaResult};
use crate::probe::{MediaInfo, MediaProbe};
use crate::resolver::{MediaHandle, MediaResolver};
use crate::transform::CanvasSpace;

/// A resolved and probed source.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMedia {
    pub handle: MediaHandle,
    pub info: MediaInfo,
}

impl ResolvedMedia {
    pub fn path(&self) -> &Path {
        &self.handle.path
    }
}

/// Outcome of resolving a timeline's resources.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSources {
    media: HashMap<String, ResolvedMedia>,
    missing: Vec<String>,
}

impl ResolvedSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, media: ResolvedMedia) {
        self.media.insert(media.handle.resource_id.clone(), media);
    }

    pub fn mark_missing(&mut self, resource_id: impl Into<String>) {
        self.missing.push(resource_id.into());
    }

    pub fn get(&self, resource_id: &str) -> Option<&ResolvedMedia> {
        self.media.get(resource_id)
    }

    /// Ids that could not be resolved.
    pub fn missing(&self) -> &[String] {
        &self.missing
    }
}

/// Resolve and probe every resource referenced by a visible layer.
///
/// Unknown ids are recorded, not fatal; probe failures on files that do
/// exist are.
pub async fn resolve_sources(
    timeline: &Timeline,
    resolver: &dyn MediaResolver,
    probe: &dyn MediaProbe,
) -> MediaResult<ResolvedSources> {
    let mut sources = ResolvedSources::new();

    for resource_id in timeline.referenced_resources() {
        match resolver.find(resource_id).await {
            Some(handle) => {
                let info = probe.probe(&handle.path).await?;
                debug!(
                    resource_id,
                    duration = info.duration,
                    width = info.width,
                    height = info.height,
                    "Resolved source"
                );
                sources.insert(ResolvedMedia { handle, info });
            }
            None => {
                warn!(resource_id, "Resource not found");
                sources.mark_missing(resource_id);
            }
        }
    }

    Ok(sources)
}

/// How a visual source is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualKind {
    Video,
    /// Still image, looped for the clip duration
    Image,
}

/// A clip drawn on the export canvas.
#[derive(Debug, Clone, Copy)]
pub struct VisualItem<'a> {
    pub layer_index: usize,
    pub clip: &'a Clip,
    pub media: &'a ResolvedMedia,
    pub kind: VisualKind,
    /// Seconds of source shown
    pub played: f64,
}

impl VisualItem<'_> {
    pub fn start(&self) -> f64 {
        self.clip.start_time
    }

    pub fn end(&self) -> f64 {
        self.clip.start_time + self.played
    }
}

/// Where an audio item's samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioOrigin {
    /// A clip on an audio layer
    AudioLayer,
    /// The soundtrack of the visual item at this index
    VideoTrack { visual_index: usize },
}

/// A volume-scaled audio contribution at a timeline offset.
#[derive(Debug, Clone, Copy)]
pub struct AudioItem<'a> {
    pub layer_index: usize,
    pub clip: &'a Clip,
    pub media: &'a ResolvedMedia,
    pub origin: AudioOrigin,
    pub played: f64,
}

impl AudioItem<'_> {
    pub fn start(&self) -> f64 {
        self.clip.start_time
    }
}

/// A text clip, drawn above all visual content.
#[derive(Debug, Clone, Copy)]
pub struct TextItem<'a> {
    pub layer_index: usize,
    pub clip: &'a Clip,
}

/// Time-ordered tracks ready to be lowered into a filter graph.
#[derive(Debug, Clone)]
pub struct Composition<'a> {
    pub canvas: CanvasSpace,
    /// Ordered by `(layer_index, start_time)`; later entries draw on top
    pub video: Vec<VisualItem<'a>>,
    pub audio: Vec<AudioItem<'a>>,
    /// Ordered by `(layer_index, start_time)`
    pub text: Vec<TextItem<'a>>,
    pub duration: f64,
    /// Degradations to surface to the caller
    pub warnings: Vec<String>,
}

impl Composition<'_> {
    pub fn has_content(&self) -> bool {
        !self.video.is_empty() || !self.audio.is_empty() || !self.text.is_empty()
    }
}

/// Total duration: the latest clip end across visible layers, or the
/// timeline's hint when no clip exists.
pub fn timeline_duration(timeline: &Timeline) -> MediaResult<f64> {
    let latest = timeline
        .layers
        .iter()
        .filter(|l| l.visible)
        .flat_map(|l| l.clips.iter())
        .map(Clip::end_time)
        .reduce(f64::max);

    match (latest, timeline.duration_hint) {
        (Some(end), _) => Ok(end),
        (None, Some(hint)) if hint > 0.0 => Ok(hint),
        _ => Err(MediaError::EmptyTimeline),
    }
}

/// Walk the layers and build the composition.
pub fn compose<'a>(timeline: &'a Timeline, sources: &'a ResolvedSources) -> MediaResult<Composition<'a>> {
    let duration = timeline_duration(timeline)?;
    let has_clips = timeline
        .layers
        .iter()
        .any(|l| l.visible && !l.clips.is_empty());

    let mut video: Vec<VisualItem<'a>> = Vec::new();
    let mut text: Vec<TextItem<'a>> = Vec::new();
    // Video soundtracks are linked to their visual item after sorting
    let mut soundtracks: Vec<(usize, &'a Clip, &'a ResolvedMedia, f64)> = Vec::new();
    let mut audio: Vec<AudioItem<'a>> = Vec::new();
    let mut warnings = Vec::new();

    for (layer_index, layer) in timeline.layers.iter().enumerate() {
        if !layer.visible {
            debug!(layer_index, "Skipping invisible layer");
            continue;
        }

        for clip in &layer.clips {
            if clip.text_spec().is_some() {
                text.push(TextItem { layer_index, clip });
                continue;
            }

            let Some(resource_id) = clip.resource_id() else {
                continue;
            };
            let Some(media) = sources.get(resource_id) else {
                let message = format!(
                    "clip at {:.2}s on layer {} dropped: resource '{}' not found",
                    clip.start_time, layer_index, resource_id
                );
                warn!(layer_index, resource_id, "{}", message);
                metrics::counter!("montage_clips_dropped_total").increment(1);
                warnings.push(message);
                continue;
            };

            let is_still = layer.kind == LayerKind::Image
                || (media.info.has_video && !media.info.has_audio && media.info.duration <= 0.0);

            let played = if is_still {
                clip.duration
            } else {
                if clip.usable_duration(media.info.duration) <= 0.0 {
                    return Err(MediaError::invalid_time_range(format!(
                        "clip '{}' trims {}s + {}s from a {:.3}s source",
                        resource_id, clip.trim_start, clip.trim_end, media.info.duration
                    )));
                }
                clip.played_duration(media.info.duration)
            };

            match layer.kind {
                LayerKind::Audio => {
                    if !media.info.has_audio {
                        let message = format!(
                            "clip at {:.2}s on layer {} skipped: '{}' has no audio stream",
                            clip.start_time, layer_index, resource_id
                        );
                        warn!(layer_index, resource_id, "{}", message);
                        warnings.push(message);
                    } else if !layer.muted {
                        audio.push(AudioItem {
                            layer_index,
                            clip,
                            media,
                            origin: AudioOrigin::AudioLayer,
                            played,
                        });
                    }
                }
                LayerKind::Video | LayerKind::Image | LayerKind::Text => {
                    if !media.info.has_video {
                        let message = format!(
                            "clip at {:.2}s on layer {} skipped: '{}' has no video stream",
                            clip.start_time, layer_index, resource_id
                        );
                        warn!(layer_index, resource_id, "{}", message);
                        warnings.push(message);
                        continue;
                    }
                    video.push(VisualItem {
                        layer_index,
                        clip,
                        media,
                        kind: if is_still {
                            VisualKind::Image
                        } else {
                            VisualKind::Video
                        },
                        played,
                    });
                    if !is_still && !layer.muted && media.info.has_audio {
                        soundtracks.push((layer_index, clip, media, played));
                    }
                }
            }
        }
    }

    video.sort_by(|a, b| {
        a.layer_index
            .cmp(&b.layer_index)
            .then(a.start().total_cmp(&b.start()))
    });
    text.sort_by(|a, b| {
        a.layer_index
            .cmp(&b.layer_index)
            .then(a.clip.start_time.total_cmp(&b.clip.start_time))
    });

    for (layer_index, clip, media, played) in soundtracks {
        let visual_index = video
            .iter()
            .position(|v| std::ptr::eq(v.clip, clip))
            .ok_or_else(|| MediaError::internal("soundtrack without a visual item"))?;
        audio.push(AudioItem {
            layer_index,
            clip,
            media,
            origin: AudioOrigin::VideoTrack { visual_index },
            played,
        });
    }
    audio.sort_by(|a, b| {
        a.layer_index
            .cmp(&b.layer_index)
            .then(a.start().total_cmp(&b.start()))
    });

    let composition = Composition {
        canvas: CanvasSpace::new(timeline.source_resolution, timeline.export_resolution),
        video,
        audio,
        text,
        duration,
        warnings,
    };

    if has_clips && !composition.has_content() {
        return Err(MediaError::EmptyTimeline);
    }

    Ok(composition)
}
