//! Keyframe interpolation.
//!
//! [`interpolate`] evaluates a property at one instant. [`lower`] turns the
//! same piecewise curve into an [`Expr`] so the encoder evaluates it per
//! frame; both follow the same hold/ease rules.

use std::collections::BTreeMap;

use montage_models::{Easing, Keyframe, PropertyValue, Vec2};

use crate::graph::Expr;

/// Value of `property` at clip-local time `t`.
///
/// - No keyframe defines the property: `None`.
/// - Only earlier keyframes: the latest one's value is held.
/// - Only later keyframes: the earliest one's value (no backward extrapolation).
/// - Otherwise the two neighbours are blended with the earlier keyframe's easing.
pub fn interpolate(keyframes: &[Keyframe], t: f64, property: &str) -> Option<PropertyValue> {
    let mut defining: Vec<(&Keyframe, &PropertyValue)> = keyframes
        .iter()
        .filter_map(|k| k.get(property).map(|v| (k, v)))
        .collect();
    // Stable: among equal times the later entry stays later
    defining.sort_by(|a, b| a.0.time.total_cmp(&b.0.time));

    let prev = defining.iter().rev().find(|(k, _)| k.time <= t);
    let next = defining.iter().find(|(k, _)| k.time > t);

    match (prev, next) {
        (None, None) => None,
        (Some((_, value)), None) | (None, Some((_, value))) => Some((*value).clone()),
        (Some((pk, pv)), Some((nk, nv))) => {
            let progress = ((t - pk.time) / (nk.time - pk.time)).clamp(0.0, 1.0);
            Some(blend(pv, nv, pk.easing.apply(progress)))
        }
    }
}

fn blend(a: &PropertyValue, b: &PropertyValue, p: f64) -> PropertyValue {
    match (a, b) {
        (PropertyValue::Scalar(x), PropertyValue::Scalar(y)) => PropertyValue::Scalar(x + (y - x) * p),
        // Not numeric: hold the earlier value until the later keyframe is reached
        (PropertyValue::Other(_), _) | (_, PropertyValue::Other(_)) => a.clone(),
        _ => {
            let from = components(a);
            let to = components(b);
            let keys: std::collections::BTreeSet<&String> = from.keys().chain(to.keys()).collect();
            PropertyValue::Vector(
                keys.into_iter()
                    .map(|k| {
                        let x = from.get(k).copied().unwrap_or(0.0);
                        let y = to.get(k).copied().unwrap_or(0.0);
                        (k.clone(), x + (y - x) * p)
                    })
                    .collect(),
            )
        }
    }
}

/// Numeric components of a value; a scalar applies to both axes.
fn components(value: &PropertyValue) -> BTreeMap<String, f64> {
    match value {
        PropertyValue::Scalar(v) => [("x".to_string(), *v), ("y".to_string(), *v)]
            .into_iter()
            .collect(),
        PropertyValue::Vector(map) => map.clone(),
        PropertyValue::Other(_) => BTreeMap::new(),
    }
}

/// Scalar property at `t`, or `fallback` when not keyframed.
pub fn scalar_at(keyframes: &[Keyframe], t: f64, property: &str, fallback: f64) -> f64 {
    interpolate(keyframes, t, property)
        .and_then(|v| v.as_scalar())
        .unwrap_or(fallback)
}

/// Two-component property at `t`, or `fallback` when not keyframed.
pub fn vec2_at(keyframes: &[Keyframe], t: f64, property: &str, fallback: Vec2) -> Vec2 {
    interpolate(keyframes, t, property)
        .and_then(|v| v.as_vec2())
        .unwrap_or(fallback)
}

/// Which number to extract from a keyframed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Scalar,
    X,
    Y,
}

impl Component {
    fn extract(&self, value: &PropertyValue) -> Option<f64> {
        match self {
            Component::Scalar => value.as_scalar(),
            Component::X => value.as_vec2().map(|v| v.x),
            Component::Y => value.as_vec2().map(|v| v.y),
        }
    }
}

/// Whether any keyframe defines `property`.
pub fn is_keyframed(keyframes: &[Keyframe], property: &str) -> bool {
    keyframes.iter().any(|k| k.get(property).is_some())
}

/// Lower one component of a keyframed property into an expression of
/// `local_time` (seconds since the clip started).
///
/// Returns a constant when fewer than two keyframes define it.
pub fn lower(
    keyframes: &[Keyframe],
    property: &str,
    component: Component,
    fallback: f64,
    local_time: &Expr,
) -> Expr {
    let mut points: Vec<(f64, f64, Easing)> = keyframes
        .iter()
        .filter_map(|k| {
            k.get(property)
                .and_then(|v| component.extract(v))
                .map(|v| (k.time, v, k.easing))
        })
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    // Latest entry wins on duplicate times
    let mut deduped: Vec<(f64, f64, Easing)> = Vec::with_capacity(points.len());
    for p in points {
        match deduped.last_mut() {
            Some(last) if last.0 == p.0 => *last = p,
            _ => deduped.push(p),
        }
    }

    match deduped.as_slice() {
        [] => Expr::num(fallback),
        [(_, v, _)] => Expr::num(*v),
        [.., (_, last, _)] => {
            let mut expr = Expr::num(*last);
            for pair in deduped.windows(2).rev() {
                let (t0, v0, easing) = pair[0];
                let (t1, v1, _) = pair[1];
                let progress = Expr::ramp(local_time.clone(), t0, t1 - t0);
                let segment = Expr::lerp(v0, v1, ease(easing, progress));
                expr = Expr::if_else(Expr::lt(local_time.clone(), Expr::num(t1)), segment, expr);
            }
            expr
        }
    }
}

/// Easing curve as an expression of linear progress `p`.
pub fn ease(easing: Easing, p: Expr) -> Expr {
    match easing {
        Easing::Linear => p,
        Easing::EaseIn => p.clone() * p,
        Easing::EaseOut => p.clone() * (Expr::num(2.0) - p),
        Easing::EaseInOut => p.clone() * p.clone() * (Expr::num(3.0) - p * 2.0),
    }
}
