//! Entry and exit transitions applied to a single clip inside the export
//! composite.
//!
//! Each transition contributes to a [`ClipEffects`] bundle of expressions
//! and filters that the export graph builder folds into the clip's chain.
//! The entry window is the first `duration` seconds the clip is shown and
//! the exit window the last; both are clamped to the shown duration.

use montage_models::{ClipTransitions, Direction, Resolution, TransitionSpec};

use crate::graph::{Expr, Filter};

/// Per-clip transition effects, with time in timeline seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipEffects {
    /// Factor on the placed size
    pub zoom: Expr,
    /// Added to the overlay position
    pub offset_x: Expr,
    pub offset_y: Expr,
    /// Alpha multiplier over `X`/`Y`/`W`/`H`/`T`, for `geq`
    pub mask: Option<Expr>,
    /// Alpha multiplier for fades, usable where a filter has no fade option
    pub alpha: Expr,
    /// `fade` filters with `alpha=1`
    pub fades: Vec<Filter>,
    /// `afade` filters in clip-local seconds
    pub audio_fades: Vec<Filter>,
}

impl Default for ClipEffects {
    fn default() -> Self {
        Self {
            zoom: Expr::num(1.0),
            offset_x: Expr::num(0.0),
            offset_y: Expr::num(0.0),
            mask: None,
            alpha: Expr::num(1.0),
            fades: Vec::new(),
            audio_fades: Vec::new(),
        }
    }
}

impl ClipEffects {
    pub fn is_zoomed(&self) -> bool {
        self.zoom != Expr::num(1.0)
    }

    pub fn is_offset(&self) -> bool {
        !self.offset_x.is_const() || !self.offset_y.is_const()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Entry,
    Exit,
}

/// Effects for a clip shown over `[start, end]` on a `canvas`-sized frame.
pub fn clip_effects(transitions: &ClipTransitions, start: f64, end: f64, canvas: Resolution) -> ClipEffects {
    let mut effects = ClipEffects::default();
    let shown = (end - start).max(0.0);

    if let Some(spec) = &transitions.entry {
        apply(&mut effects, spec, Slot::Entry, start, end, shown, canvas);
    }
    if let Some(spec) = &transitions.exit {
        apply(&mut effects, spec, Slot::Exit, start, end, shown, canvas);
    }

    effects
}

fn apply(
    effects: &mut ClipEffects,
    spec: &TransitionSpec,
    slot: Slot,
    start: f64,
    end: f64,
    shown: f64,
    canvas: Resolution,
) {
    let duration = spec.duration().min(shown);
    if duration <= 0.0 {
        return;
    }
    let window_start = match slot {
        Slot::Entry => start,
        Slot::Exit => end - duration,
    };
    // 0 → 1 across the window
    let p = Expr::ramp(Expr::time(), window_start, duration);
    let w = canvas.width as f64;
    let h = canvas.height as f64;

    match spec {
        TransitionSpec::Fade { .. } | TransitionSpec::Dissolve { .. } => {
            let fade_type = match slot {
                Slot::Entry => "in",
                Slot::Exit => "out",
            };
            effects.fades.push(
                Filter::new("fade")
                    .opt("t", fade_type)
                    .num("st", window_start)
                    .num("d", duration)
                    .opt("alpha", 1),
            );
            effects.alpha = effects.alpha.clone() * visibility(slot, p);
            effects.audio_fades.push(audio_fade(slot, start, end, duration));
        }
        TransitionSpec::Zoom { .. } => {
            let factor = match slot {
                Slot::Entry => Expr::num(1.0) / (Expr::num(2.0) - p),
                Slot::Exit => Expr::num(1.0) / (Expr::num(1.0) + p),
            };
            effects.zoom = effects.zoom.clone() * factor;
            effects.audio_fades.push(audio_fade(slot, start, end, duration));
        }
        TransitionSpec::Wipe { direction, .. } => {
            effects.alpha = effects.alpha.clone() * visibility(slot, p.clone());
            let reveal = wipe_reveal(*direction, p);
            let mask = match slot {
                Slot::Entry => reveal,
                Slot::Exit => Expr::num(1.0) - reveal,
            };
            effects.mask = Some(match effects.mask.take() {
                Some(existing) => existing * mask,
                None => mask,
            });
            effects.audio_fades.push(audio_fade(slot, start, end, duration));
        }
        TransitionSpec::Slide { direction, .. } => {
            let (dx, dy) = slide_offset(*direction, slot, p, w, h);
            effects.offset_x = effects.offset_x.clone() + dx;
            effects.offset_y = effects.offset_y.clone() + dy;
            effects.audio_fades.push(audio_fade(slot, start, end, duration));
        }
    }
}

/// Fraction visible: `p` on entry, `1 - p` on exit.
fn visibility(slot: Slot, p: Expr) -> Expr {
    match slot {
        Slot::Entry => p,
        Slot::Exit => Expr::num(1.0) - p,
    }
}

fn audio_fade(slot: Slot, start: f64, end: f64, duration: f64) -> Filter {
    let (fade_type, st) = match slot {
        Slot::Entry => ("in", 0.0),
        Slot::Exit => ("out", end - start - duration),
    };
    Filter::new("afade")
        .opt("t", fade_type)
        .num("st", st)
        .num("d", duration)
}

/// 1 where the moving edge has already passed, 0 elsewhere. The edge
/// travels in `direction` as `p` goes 0 → 1.
pub(crate) fn wipe_reveal(direction: Direction, p: Expr) -> Expr {
    let x = Expr::var("X");
    let y = Expr::var("Y");
    let w = Expr::var("W");
    let h = Expr::var("H");
    match direction {
        Direction::Right => Expr::lte(x, w * p),
        Direction::Left => Expr::gte(x, w * (Expr::num(1.0) - p)),
        Direction::Down => Expr::lte(y, h * p),
        Direction::Up => Expr::gte(y, h * (Expr::num(1.0) - p)),
    }
}

/// Displacement of a sliding clip. Entering, the clip arrives from the side
/// opposite `direction`; exiting, it leaves towards `direction`.
fn slide_offset(direction: Direction, slot: Slot, p: Expr, w: f64, h: f64) -> (Expr, Expr) {
    let zero = Expr::num(0.0);
    match slot {
        Slot::Entry => {
            let remaining = Expr::num(1.0) - p;
            match direction {
                Direction::Left => (remaining * w, zero),
                Direction::Right => (remaining * -w, zero),
                Direction::Up => (zero, remaining * h),
                Direction::Down => (zero, remaining * -h),
            }
        }
        Slot::Exit => match direction {
            Direction::Left => (p * -w, zero),
            Direction::Right => (p * w, zero),
            Direction::Up => (zero, p * -h),
            Direction::Down => (zero, p * h),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_models::Phase;

    fn canvas() -> Resolution {
        Resolution::new(1920, 1080)
    }

    fn transitions(entry: Option<TransitionSpec>, exit: Option<TransitionSpec>) -> ClipTransitions {
        ClipTransitions { entry, exit }
    }

    #[test]
    fn test_no_transitions_is_identity() {
        let effects = clip_effects(&ClipTransitions::default(), 0.0, 5.0, canvas());
        assert_eq!(effects, ClipEffects::default());
        assert!(!effects.is_zoomed());
        assert!(!effects.is_offset());
    }

    #[test]
    fn test_fade_windows() {
        let fx = clip_effects(
            &transitions(
                Some(TransitionSpec::Fade {
                    duration: 1.0,
                    phase: Phase::In,
                }),
                Some(TransitionSpec::Dissolve { duration: 0.5 }),
            ),
            2.0,
            6.0,
            canvas(),
        );
        let fades: Vec<String> = fx.fades.iter().map(ToString::to_string).collect();
        assert_eq!(
            fades,
            vec!["fade=t=in:st=2:d=1:alpha=1", "fade=t=out:st=5.5:d=0.5:alpha=1"]
        );
        let afades: Vec<String> = fx.audio_fades.iter().map(ToString::to_string).collect();
        assert_eq!(
            afades,
            vec!["afade=t=in:st=0:d=1", "afade=t=out:st=3.5:d=0.5"]
        );
        assert_eq!(fx.alpha.eval(2.5), Some(0.5));
        assert_eq!(fx.alpha.eval(4.0), Some(1.0));
        assert_eq!(fx.alpha.eval(5.75), Some(0.5));
    }

    #[test]
    fn test_transition_longer_than_clip_is_clamped() {
        let fx = clip_effects(
            &transitions(
                Some(TransitionSpec::Fade {
                    duration: 3.0,
                    phase: Phase::In,
                }),
                None,
            ),
            0.0,
            2.0,
            canvas(),
        );
        assert_eq!(fx.fades[0].get("d"), Some("2"));
    }

    #[test]
    fn test_zoom_grows_from_half() {
        let fx = clip_effects(
            &transitions(
                Some(TransitionSpec::Zoom {
                    duration: 1.0,
                    phase: Phase::In,
                }),
                Some(TransitionSpec::Zoom {
                    duration: 1.0,
                    phase: Phase::Out,
                }),
            ),
            0.0,
            4.0,
            canvas(),
        );
        assert!(fx.is_zoomed());
        assert_eq!(fx.zoom.eval(0.0), Some(0.5));
        assert_eq!(fx.zoom.eval(1.0), Some(1.0));
        assert_eq!(fx.zoom.eval(2.0), Some(1.0));
        assert_eq!(fx.zoom.eval(4.0), Some(0.5));
    }

    #[test]
    fn test_slide_in_from_right_edge() {
        let fx = clip_effects(
            &transitions(
                Some(TransitionSpec::Slide {
                    duration: 1.0,
                    direction: Direction::Left,
                }),
                None,
            ),
            1.0,
            5.0,
            canvas(),
        );
        assert!(fx.is_offset());
        assert_eq!(fx.offset_x.eval(1.0), Some(1920.0));
        assert_eq!(fx.offset_x.eval(1.5), Some(960.0));
        assert_eq!(fx.offset_x.eval(2.0), Some(0.0));
        assert_eq!(fx.offset_y.eval(1.5), Some(0.0));
    }

    #[test]
    fn test_slide_out_downwards() {
        let fx = clip_effects(
            &transitions(
                None,
                Some(TransitionSpec::Slide {
                    duration: 2.0,
                    direction: Direction::Down,
                }),
            ),
            0.0,
            4.0,
            canvas(),
        );
        assert_eq!(fx.offset_y.eval(2.0), Some(0.0));
        assert_eq!(fx.offset_y.eval(3.0), Some(540.0));
    }

    #[test]
    fn test_wipe_builds_mask() {
        let fx = clip_effects(
            &transitions(
                Some(TransitionSpec::Wipe {
                    duration: 1.0,
                    direction: Direction::Right,
                }),
                None,
            ),
            0.0,
            3.0,
            canvas(),
        );
        let mask = fx.mask.expect("wipe mask");
        assert_eq!(
            mask.render(crate::graph::TimeVar::Upper),
            "lte(X,W*clip(T,0,1))"
        );
    }
}
