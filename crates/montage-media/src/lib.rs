#![deny(unreachable_patterns)]
//! Timeline compositing on top of the FFmpeg CLI.
//!
//! This crate provides:
//! - Keyframe interpolation and per-frame expression lowering
//! - Fill/preserve placement of clips on the export canvas
//! - Layer composition into a typed filter graph
//! - Fade, zoom, dissolve, wipe and slide transitions
//! - Export, cut, trim and merge operations driven through a [`CommandExecutor`]

pub mod command;
pub mod compositor;
pub mod context;
pub mod error;
pub mod export;
pub mod fs_utils;
pub mod graph;
pub mod keyframe;
pub mod operations;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod resolver;
pub mod transform;
pub mod transitions;

pub use command::{check_ffmpeg, check_ffprobe, CommandExecutor, FfmpegCommand, FfmpegRunner, InputSpec};
pub use compositor::{compose, resolve_sources, Composition, ResolvedMedia, ResolvedSources};
pub use context::MediaContext;
pub use error::{MediaError, MediaResult};
pub use export::{build_export_graph, render_export, ExportGraphBuilder, ExportPlan};
pub use fs_utils::{move_file, remove_artifact};
pub use graph::{Expr, Filter, FilterGraph, Pad};
pub use keyframe::interpolate;
pub use operations::{cut, merge, run_transition, trim};
pub use plan::{RenderOutcome, RenderPlan};
pub use probe::{probe_media, FfprobeProbe, MediaInfo, MediaProbe};
pub use progress::{milestones, NoopSink, ProgressSink};
pub use resolver::{MediaHandle, MediaResolver};
pub use transform::{CanvasSpace, FitMode, ResolvedTransform, TransformResolver};
pub use transitions::{synthesize, SourceClip};
