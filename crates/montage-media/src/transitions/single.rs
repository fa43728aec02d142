//! Single-clip effects: fade and zoom, at the start (`in`) or end (`out`).

use montage_models::{Phase, TransitionSpec};

use crate::command::InputSpec;
use crate::error::{MediaError, MediaResult};
use crate::graph::{Expr, Filter, Pad};
use crate::plan::RenderPlan;

use super::normalize::audio_format;
use super::SourceClip;

/// Build the plan for a fade or zoom applied to `source`.
pub fn single_clip_plan(spec: &TransitionSpec, source: &SourceClip, fps: u32) -> MediaResult<RenderPlan> {
    let total = source.info.duration;
    let duration = spec.duration().min(total);
    let phase = spec
        .phase()
        .ok_or_else(|| MediaError::InvalidRequest(format!("{} needs two sources", spec.kind().as_str())))?;
    // Where the effect window starts, in source seconds
    let window_start = match phase {
        Phase::In => 0.0,
        Phase::Out => total - duration,
    };

    let mut plan = RenderPlan::new(Pad::label("vout"), total);
    let input = plan.add_input(InputSpec::new(&source.path));

    match spec {
        TransitionSpec::Fade { .. } => {
            plan.graph.push(
                vec![Pad::video(input)],
                vec![
                    Filter::new("fade")
                        .opt("t", phase.as_str())
                        .num("st", window_start)
                        .num("d", duration),
                    Filter::new("format").arg("yuv420p"),
                ],
                vec![plan.video_out.clone()],
            );
            if source.info.has_audio {
                let audio_out = Pad::label("aout");
                plan.graph.push(
                    vec![Pad::audio(input)],
                    vec![
                        audio_format(),
                        Filter::new("afade")
                            .opt("t", phase.as_str())
                            .num("st", window_start)
                            .num("d", duration),
                    ],
                    vec![audio_out.clone()],
                );
                plan.audio_out = Some(audio_out);
            }
        }
        TransitionSpec::Zoom { .. } => {
            let background = plan.graph.chain(
                vec![],
                vec![Filter::new("color")
                    .opt("c", "black")
                    .opt("s", format!("{}x{}", source.info.width, source.info.height))
                    .opt("r", fps)
                    .num("d", total)],
                "bg",
            );

            let factor = zoom_factor(phase, window_start, duration);
            let scaled = plan.graph.chain(
                vec![Pad::video(input)],
                vec![Filter::new("scale")
                    .expr("w", &even(Expr::var("iw") * factor.clone()))
                    .expr("h", &even(Expr::var("ih") * factor))
                    .opt("eval", "frame")],
                "zs",
            );
            plan.graph.push(
                vec![background, scaled],
                vec![
                    Filter::new("overlay")
                        .expr("x", &((Expr::var("W") - Expr::var("w")) / 2.0))
                        .expr("y", &((Expr::var("H") - Expr::var("h")) / 2.0))
                        .opt("shortest", 1),
                    Filter::new("format").arg("yuv420p"),
                ],
                vec![plan.video_out.clone()],
            );
            if source.info.has_audio {
                plan.audio_out = Some(Pad::audio(input));
            }
        }
        _ => {
            return Err(MediaError::InvalidRequest(format!(
                "{} needs two sources",
                spec.kind().as_str()
            )))
        }
    }

    Ok(plan)
}

/// Content scale over time: `in` grows 0.5 → 1, `out` shrinks 1 → 0.5.
pub fn zoom_factor(phase: Phase, window_start: f64, duration: f64) -> Expr {
    let p = Expr::ramp(Expr::time(), window_start, duration);
    match phase {
        Phase::In => Expr::num(1.0) / (Expr::num(2.0) - p),
        Phase::Out => Expr::num(1.0) / (Expr::num(1.0) + p),
    }
}

/// Round a size down to an even number of pixels.
fn even(size: Expr) -> Expr {
    Expr::call("trunc", vec![size / 2.0]) * 2.0
}
