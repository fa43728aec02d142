//! Paired effects joining two sources: dissolve, wipe and slide.
//!
//! Both sources are letterboxed to the first one's frame and split into a
//! head and a tail. The last `overlap` seconds of A and the first `overlap`
//! seconds of B are blended; A's head, the blend and B's tail are then
//! concatenated.

use montage_models::{paired_output_duration, Direction, Resolution, TransitionSpec};

use crate::command::InputSpec;
use crate::error::{MediaError, MediaResult};
use crate::graph::{Expr, Filter, FilterGraph, Pad};
use crate::plan::RenderPlan;

use super::clip::wipe_reveal;
use super::normalize::{audio_format, normalize_audio, normalize_video};
use super::SourceClip;

/// Segments shorter than this are left out of the concat.
const MIN_SEGMENT_SECS: f64 = 0.001;

/// Build the plan joining `first` and `second` with a paired transition.
pub fn paired_plan(
    spec: &TransitionSpec,
    first: &SourceClip,
    second: &SourceClip,
    fps: u32,
) -> MediaResult<RenderPlan> {
    for source in [first, second] {
        if !source.info.has_video || source.info.duration <= 0.0 {
            return Err(MediaError::InvalidRequest(format!(
                "{} is not a video with a duration",
                source.path.display()
            )));
        }
    }

    let da = first.info.duration;
    let db = second.info.duration;
    let overlap = spec.overlap(da, db);
    let total = paired_output_duration(da, db, spec.duration());
    let target = Resolution::new(first.info.width, first.info.height);

    let mut plan = RenderPlan::new(Pad::label("vout"), total);
    let a = plan.add_input(InputSpec::new(&first.path));
    let b = plan.add_input(InputSpec::new(&second.path));
    let graph = &mut plan.graph;

    let a_norm = normalize_video(graph, Pad::video(a), target, fps);
    let b_norm = normalize_video(graph, Pad::video(b), target, fps);
    let a_parts = graph.chain_n(vec![a_norm], vec![Filter::new("split").arg(2)], "as", 2);
    let b_parts = graph.chain_n(vec![b_norm], vec![Filter::new("split").arg(2)], "bs", 2);

    let mut segments = Vec::with_capacity(3);
    if da - overlap >= MIN_SEGMENT_SECS {
        segments.push(trim(graph, a_parts[0].clone(), 0.0, da - overlap));
    } else {
        discard(graph, a_parts[0].clone());
    }
    let a_tail = trim(graph, a_parts[1].clone(), da - overlap, da);
    let b_head = trim(graph, b_parts[0].clone(), 0.0, overlap);
    segments.push(blend(graph, spec, a_tail, b_head, overlap, target)?);
    if db - overlap >= MIN_SEGMENT_SECS {
        segments.push(trim(graph, b_parts[1].clone(), overlap, db));
    } else {
        discard(graph, b_parts[1].clone());
    }

    let count = segments.len();
    graph.push(
        segments,
        vec![
            Filter::new("concat")
                .opt("n", count)
                .opt("v", 1)
                .opt("a", 0),
            Filter::new("format").arg("yuv420p"),
        ],
        vec![plan.video_out.clone()],
    );

    plan.audio_out = crossfade_audio(&mut plan.graph, first, second, a, b, overlap, total);
    Ok(plan)
}

/// Cut `[start, end]` out of a stream and rebase its timestamps.
fn trim(graph: &mut FilterGraph, input: Pad, start: f64, end: f64) -> Pad {
    graph.chain(
        vec![input],
        vec![
            Filter::new("trim").num("start", start).num("end", end),
            Filter::new("setpts").arg("PTS-STARTPTS"),
        ],
        "seg",
    )
}

/// Consume a split output that is not needed.
fn discard(graph: &mut FilterGraph, input: Pad) {
    graph.push(vec![input], vec![Filter::new("nullsink")], vec![]);
}

/// The overlap segment for each paired kind. Time inside the segment runs
/// from 0 to `overlap`.
fn blend(
    graph: &mut FilterGraph,
    spec: &TransitionSpec,
    a_tail: Pad,
    b_head: Pad,
    overlap: f64,
    target: Resolution,
) -> MediaResult<Pad> {
    let p = Expr::ramp(Expr::time(), 0.0, overlap);

    let pad = match spec {
        TransitionSpec::Dissolve { .. } => {
            let b_fading = graph.chain(
                vec![b_head],
                vec![
                    Filter::new("format").arg("yuva420p"),
                    Filter::new("fade")
                        .opt("t", "in")
                        .num("st", 0.0)
                        .num("d", overlap)
                        .opt("alpha", 1),
                ],
                "dis",
            );
            graph.chain(
                vec![a_tail, b_fading],
                vec![Filter::new("overlay").opt("format", "auto")],
                "mix",
            )
        }
        TransitionSpec::Wipe { direction, .. } => {
            // blend's first input is A, the second B
            let revealed = wipe_reveal(*direction, p);
            let expr = Expr::if_else(revealed, Expr::var("B"), Expr::var("A"));
            graph.chain(
                vec![a_tail, b_head],
                vec![Filter::new("blend").expr_upper("all_expr", &expr)],
                "mix",
            )
        }
        TransitionSpec::Slide { direction, .. } => {
            let (stack, inputs, offset) = slide_layout(*direction, a_tail, b_head, p);
            let (x, y) = if direction.is_horizontal() {
                (offset, Expr::num(0.0))
            } else {
                (Expr::num(0.0), offset)
            };
            graph.chain(
                inputs,
                vec![
                    Filter::new(stack),
                    Filter::new("crop")
                        .opt("w", target.width)
                        .opt("h", target.height)
                        .expr("x", &x)
                        .expr("y", &y),
                ],
                "mix",
            )
        }
        TransitionSpec::Fade { .. } | TransitionSpec::Zoom { .. } => {
            return Err(MediaError::InvalidRequest(format!(
                "{} takes a single source",
                spec.kind().as_str()
            )))
        }
    };
    Ok(pad)
}

/// Stack filter, its input order and the crop offset for a push in
/// `direction`: the content moves towards `direction`.
fn slide_layout(direction: Direction, a: Pad, b: Pad, p: Expr) -> (&'static str, Vec<Pad>, Expr) {
    let half_w = Expr::var("iw") / 2.0;
    let half_h = Expr::var("ih") / 2.0;
    let remaining = Expr::num(1.0) - p.clone();
    match direction {
        Direction::Left => ("hstack", vec![a, b], half_w * p),
        Direction::Right => ("hstack", vec![b, a], half_w * remaining),
        Direction::Up => ("vstack", vec![a, b], half_h * p),
        Direction::Down => ("vstack", vec![b, a], half_h * remaining),
    }
}

/// Audio for the joined clip.
///
/// Both tracks cross-fade over the overlap with an equal-power curve. A
/// single track passes through at its own offset and is padded to the
/// output length.
fn crossfade_audio(
    graph: &mut FilterGraph,
    first: &SourceClip,
    second: &SourceClip,
    a: usize,
    b: usize,
    overlap: f64,
    total: f64,
) -> Option<Pad> {
    let pad_to_total = |extra: Vec<Filter>| {
        let mut filters = vec![audio_format()];
        filters.extend(extra);
        filters.push(Filter::new("apad"));
        filters.push(Filter::new("atrim").num("end", total));
        filters
    };

    match (first.info.has_audio, second.info.has_audio) {
        (true, true) => {
            let a_audio = normalize_audio(graph, Pad::audio(a));
            let b_audio = normalize_audio(graph, Pad::audio(b));
            Some(graph.chain(
                vec![a_audio, b_audio],
                vec![Filter::new("acrossfade")
                    .num("d", overlap)
                    .opt("c1", "qsin")
                    .opt("c2", "qsin")],
                "aout",
            ))
        }
        (true, false) => Some(graph.chain(vec![Pad::audio(a)], pad_to_total(vec![]), "aout")),
        (false, true) => {
            let delay_ms = ((first.info.duration - overlap) * 1000.0).round().max(0.0) as u64;
            Some(graph.chain(
                vec![Pad::audio(b)],
                pad_to_total(vec![Filter::new("adelay")
                    .opt("delays", delay_ms)
                    .opt("all", 1)]),
                "aout",
            ))
        }
        (false, false) => None,
    }
}
