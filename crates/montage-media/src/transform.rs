//! Clip placement on the export canvas.
//!
//! Timelines are authored against a preview (source) canvas and exported at
//! another resolution. A clip whose resolved position is exactly `(0, 0)` and
//! scale exactly `1` on both axes is stretched to cover the export frame
//! (fill mode); any other placement is mapped through the canvas ratio so it
//! lands where the preview showed it (preserve mode).
//!
//! Positions are top-left offsets in source-canvas pixels. Rotation turns
//! the clip about its own centre after scale and position.

use montage_models::{Clip, Resolution, Vec2};

use crate::graph::Expr;
use crate::keyframe::{self, Component};

pub const PROP_SCALE: &str = "scale";
pub const PROP_POSITION: &str = "position";
pub const PROP_ROTATION: &str = "rotation";
pub const PROP_OPACITY: &str = "opacity";
pub const PROP_VOLUME: &str = "volume";

/// Authoring and output canvases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSpace {
    pub source: Resolution,
    pub export: Resolution,
}

impl CanvasSpace {
    pub fn new(source: Resolution, export: Resolution) -> Self {
        Self { source, export }
    }

    /// Export pixels per source pixel, per axis.
    pub fn ratio(&self) -> Vec2 {
        Vec2::new(
            self.export.width as f64 / self.source.width.max(1) as f64,
            self.export.height as f64 / self.source.height.max(1) as f64,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    Fill,
    Preserve,
}

impl FitMode {
    pub fn decide(scale: Vec2, position: Vec2) -> Self {
        if position == Vec2::ZERO && scale == Vec2::ONE {
            FitMode::Fill
        } else {
            FitMode::Preserve
        }
    }
}

/// Placement at one instant, in export-canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTransform {
    pub mode: FitMode,
    /// Factor applied to the natural width
    pub scale_x: f64,
    /// Factor applied to the natural height
    pub scale_y: f64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Degrees, clockwise
    pub rotation: f64,
    pub opacity: f64,
}

/// Placement as per-frame expressions of timeline time.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformExprs {
    pub width: Expr,
    pub height: Expr,
    pub x: Expr,
    pub y: Expr,
    pub rotation: Expr,
    pub opacity: Expr,
}

impl TransformExprs {
    /// Whether the frame size changes over time.
    pub fn is_size_animated(&self) -> bool {
        !self.width.is_const() || !self.height.is_const()
    }
}

/// Resolves a clip's transform against its media and the canvases.
#[derive(Debug, Clone, Copy)]
pub struct TransformResolver<'a> {
    clip: &'a Clip,
    natural: Resolution,
    canvas: CanvasSpace,
}

impl<'a> TransformResolver<'a> {
    pub fn new(clip: &'a Clip, natural: Resolution, canvas: CanvasSpace) -> Self {
        Self {
            clip,
            natural,
            canvas,
        }
    }

    pub fn user_scale(&self, t: f64) -> Vec2 {
        keyframe::vec2_at(&self.clip.keyframes, t, PROP_SCALE, self.clip.scale)
    }

    pub fn user_position(&self, t: f64) -> Vec2 {
        keyframe::vec2_at(&self.clip.keyframes, t, PROP_POSITION, self.clip.position)
    }

    pub fn rotation(&self, t: f64) -> f64 {
        keyframe::scalar_at(&self.clip.keyframes, t, PROP_ROTATION, self.clip.rotation)
    }

    pub fn opacity(&self, t: f64) -> f64 {
        keyframe::scalar_at(&self.clip.keyframes, t, PROP_OPACITY, self.clip.opacity).clamp(0.0, 1.0)
    }

    /// Whether any placement property is keyframed.
    pub fn is_animated(&self) -> bool {
        [PROP_SCALE, PROP_POSITION, PROP_ROTATION, PROP_OPACITY]
            .iter()
            .any(|p| keyframe::is_keyframed(&self.clip.keyframes, p))
    }

    /// Placement at clip-local time `t`.
    pub fn resolve(&self, t: f64) -> ResolvedTransform {
        let scale = self.user_scale(t);
        let position = self.user_position(t);
        let mode = FitMode::decide(scale, position);
        let natural_w = self.natural.width.max(1) as f64;
        let natural_h = self.natural.height.max(1) as f64;

        let (scale_x, scale_y, x, y) = match mode {
            FitMode::Fill => (
                self.canvas.export.width as f64 / natural_w,
                self.canvas.export.height as f64 / natural_h,
                0.0,
                0.0,
            ),
            FitMode::Preserve => {
                let ratio = self.canvas.ratio();
                (
                    scale.x * ratio.x,
                    scale.y * ratio.y,
                    position.x * ratio.x,
                    position.y * ratio.y,
                )
            }
        };

        ResolvedTransform {
            mode,
            scale_x,
            scale_y,
            x,
            y,
            width: natural_w * scale_x,
            height: natural_h * scale_y,
            rotation: self.rotation(t),
            opacity: self.opacity(t),
        }
    }

    /// Placement as expressions of timeline time, for a clip that starts at
    /// `start` seconds. The fill/preserve decision is folded into each
    /// expression so it is taken per frame.
    pub fn lower(&self, start: f64) -> TransformExprs {
        let local = Expr::time() - start;
        let kfs = &self.clip.keyframes;
        let ratio = self.canvas.ratio();
        let natural_w = self.natural.width.max(1) as f64;
        let natural_h = self.natural.height.max(1) as f64;

        let sx = keyframe::lower(kfs, PROP_SCALE, Component::X, self.clip.scale.x, &local);
        let sy = keyframe::lower(kfs, PROP_SCALE, Component::Y, self.clip.scale.y, &local);
        let px = keyframe::lower(kfs, PROP_POSITION, Component::X, self.clip.position.x, &local);
        let py = keyframe::lower(kfs, PROP_POSITION, Component::Y, self.clip.position.y, &local);

        let fill = Expr::eq(sx.clone(), Expr::num(1.0))
            * Expr::eq(sy.clone(), Expr::num(1.0))
            * Expr::eq(px.clone(), Expr::num(0.0))
            * Expr::eq(py.clone(), Expr::num(0.0));

        let width = Expr::if_else(
            fill.clone(),
            Expr::num(self.canvas.export.width as f64),
            sx * (natural_w * ratio.x),
        );
        let height = Expr::if_else(
            fill.clone(),
            Expr::num(self.canvas.export.height as f64),
            sy * (natural_h * ratio.y),
        );
        let x = Expr::if_else(fill.clone(), Expr::num(0.0), px * ratio.x);
        let y = Expr::if_else(fill, Expr::num(0.0), py * ratio.y);

        let rotation = keyframe::lower(kfs, PROP_ROTATION, Component::Scalar, self.clip.rotation, &local);
        let opacity = Expr::clip(
            keyframe::lower(kfs, PROP_OPACITY, Component::Scalar, self.clip.opacity, &local),
            0.0,
            1.0,
        );

        TransformExprs {
            width,
            height,
            x,
            y,
            rotation,
            opacity,
        }
    }
}

/// Size of the box that contains a `width`×`height` frame rotated by
/// `degrees`.
pub fn rotated_bounds(width: f64, height: f64, degrees: f64) -> (f64, f64) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    (
        width * cos.abs() + height * sin.abs(),
        width * sin.abs() + height * cos.abs(),
    )
}
