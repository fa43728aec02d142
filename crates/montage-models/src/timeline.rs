//! Typed timeline model.
//!
//! A [`Timeline`] is built once from a caller document (see
//! [`crate::document`]) and is treated as immutable for the duration of a
//! render.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::transition::TransitionSpec;

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A two-component value (position, per-axis scale).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    pub const ONE: Vec2 = Vec2 { x: 1.0, y: 1.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn splat(v: f64) -> Self {
        Self { x: v, y: v }
    }
}

/// Layer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Video,
    Audio,
    Image,
    Text,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Video => "video",
            LayerKind::Audio => "audio",
            LayerKind::Image => "image",
            LayerKind::Text => "text",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Keyframe easing curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// Map linear progress in [0, 1] through the curve.
    pub fn apply(&self, progress: f64) -> f64 {
        let p = progress;
        match self {
            Easing::Linear => p,
            Easing::EaseIn => p * p,
            Easing::EaseOut => p * (2.0 - p),
            Easing::EaseInOut => p * p * (3.0 - 2.0 * p),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Easing::Linear => "linear",
            Easing::EaseIn => "ease-in",
            Easing::EaseOut => "ease-out",
            Easing::EaseInOut => "ease-in-out",
        }
    }
}

/// An animatable property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Scalar(f64),
    /// Structured numeric value, e.g. `{x, y}`.
    Vector(BTreeMap<String, f64>),
    /// Anything that cannot be interpolated numerically.
    Other(serde_json::Value),
}

impl PropertyValue {
    pub fn vec2(x: f64, y: f64) -> Self {
        let mut map = BTreeMap::new();
        map.insert("x".to_string(), x);
        map.insert("y".to_string(), y);
        PropertyValue::Vector(map)
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            PropertyValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// View as a two-component value. A scalar applies to both axes;
    /// a missing key reads as zero.
    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            PropertyValue::Scalar(v) => Some(Vec2::splat(*v)),
            PropertyValue::Vector(map) => Some(Vec2::new(
                map.get("x").copied().unwrap_or(0.0),
                map.get("y").copied().unwrap_or(0.0),
            )),
            PropertyValue::Other(_) => None,
        }
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(ref n) => match n.as_f64() {
                Some(v) => PropertyValue::Scalar(v),
                None => PropertyValue::Other(value),
            },
            serde_json::Value::Object(ref obj)
                if !obj.is_empty() && obj.values().all(|v| v.is_number()) =>
            {
                PropertyValue::Vector(
                    obj.iter()
                        .filter_map(|(k, v)| v.as_f64().map(|f| (k.clone(), f)))
                        .collect(),
                )
            }
            other => PropertyValue::Other(other),
        }
    }
}

/// Timestamped set of property values, relative to the clip start.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    pub time: f64,
    pub properties: BTreeMap<String, PropertyValue>,
    pub easing: Easing,
}

impl Keyframe {
    pub fn new(time: f64, easing: Easing) -> Self {
        Self {
            time,
            properties: BTreeMap::new(),
            easing,
        }
    }

    /// Builder-style property setter.
    pub fn with(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

/// Sort keyframes by time. Keyframes sharing a time are merged per
/// property, with later entries overwriting earlier ones; the easing comes
/// from the last of them.
pub fn normalize_keyframes(mut keyframes: Vec<Keyframe>) -> Vec<Keyframe> {
    // Stable sort keeps input order among equal times.
    keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut out: Vec<Keyframe> = Vec::with_capacity(keyframes.len());
    for kf in keyframes {
        match out.last_mut() {
            Some(last) if last.time == kf.time => {
                last.properties.extend(kf.properties);
                last.easing = kf.easing;
            }
            _ => out.push(kf),
        }
    }
    out
}

/// Text styling for text clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpec {
    pub content: String,
    pub font_family: String,
    /// Font size in source-canvas pixels.
    pub font_size: f64,
    /// CSS-style colour, e.g. `#ffffff` or `white`.
    pub color: String,
}

/// What a clip draws or plays.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipSource {
    Media { resource_id: String },
    Text(TextSpec),
}

/// Clip-level transitions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipTransitions {
    pub entry: Option<TransitionSpec>,
    pub exit: Option<TransitionSpec>,
}

/// One placed, time-bounded instance of media or text.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub source: ClipSource,
    pub start_time: f64,
    pub duration: f64,
    pub trim_start: f64,
    pub trim_end: f64,
    pub scale: Vec2,
    pub position: Vec2,
    /// Degrees, clockwise.
    pub rotation: f64,
    pub opacity: f64,
    pub volume: f64,
    /// Sorted by time.
    pub keyframes: Vec<Keyframe>,
    pub transitions: ClipTransitions,
}

impl Clip {
    /// A media clip with identity transform.
    pub fn media(resource_id: impl Into<String>, start_time: f64, duration: f64) -> Self {
        Self {
            source: ClipSource::Media {
                resource_id: resource_id.into(),
            },
            start_time,
            duration,
            trim_start: 0.0,
            trim_end: 0.0,
            scale: Vec2::ONE,
            position: Vec2::ZERO,
            rotation: 0.0,
            opacity: 1.0,
            volume: 1.0,
            keyframes: Vec::new(),
            transitions: ClipTransitions::default(),
        }
    }

    /// A text clip with identity transform.
    pub fn text(spec: TextSpec, start_time: f64, duration: f64) -> Self {
        Self {
            source: ClipSource::Text(spec),
            ..Self::media("", start_time, duration)
        }
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    pub fn resource_id(&self) -> Option<&str> {
        match &self.source {
            ClipSource::Media { resource_id } => Some(resource_id),
            ClipSource::Text(_) => None,
        }
    }

    pub fn text_spec(&self) -> Option<&TextSpec> {
        match &self.source {
            ClipSource::Text(spec) => Some(spec),
            ClipSource::Media { .. } => None,
        }
    }

    pub fn is_animated(&self) -> bool {
        !self.keyframes.is_empty()
    }

    /// Seconds of source content left after trimming.
    pub fn usable_duration(&self, native_duration: f64) -> f64 {
        usable_duration(native_duration, self.trim_start, self.trim_end)
    }

    /// Seconds of source actually shown on the timeline.
    pub fn played_duration(&self, native_duration: f64) -> f64 {
        self.duration.min(self.usable_duration(native_duration))
    }
}

/// Seconds of content left in a source of `native` seconds after trimming.
pub fn usable_duration(native: f64, trim_start: f64, trim_end: f64) -> f64 {
    (native - trim_start - trim_end).max(0.0)
}

/// A z-ordered track of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub kind: LayerKind,
    pub visible: bool,
    pub muted: bool,
    pub clips: Vec<Clip>,
}

impl Layer {
    pub fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            visible: true,
            muted: false,
            clips: Vec::new(),
        }
    }

    pub fn with_clip(mut self, clip: Clip) -> Self {
        self.clips.push(clip);
        self
    }
}

/// Full description of one render.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub duration_hint: Option<f64>,
    pub export_resolution: Resolution,
    pub source_resolution: Resolution,
    pub layers: Vec<Layer>,
}

impl Timeline {
    pub fn new(export_resolution: Resolution, source_resolution: Resolution) -> Self {
        Self {
            duration_hint: None,
            export_resolution,
            source_resolution,
            layers: Vec::new(),
        }
    }

    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Number of clips across all layers, visible or not.
    pub fn clip_count(&self) -> usize {
        self.layers.iter().map(|l| l.clips.len()).sum()
    }

    /// Resource ids referenced by visible layers, deduplicated in first-seen order.
    pub fn referenced_resources(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.layers
            .iter()
            .filter(|l| l.visible)
            .flat_map(|l| l.clips.iter())
            .filter_map(|c| c.resource_id())
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_duration_after_trim() {
        assert!((usable_duration(5.0, 1.0, 2.0) - 2.0).abs() < 1e-9);
        assert_eq!(usable_duration(2.0, 1.5, 1.0), 0.0);

        let mut clip = Clip::media("a", 0.0, 4.0);
        clip.trim_start = 1.0;
        clip.trim_end = 2.0;
        assert!((clip.played_duration(5.0) - 2.0).abs() < 1e-9);
        assert!((clip.played_duration(20.0) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_easing_curves() {
        assert_eq!(Easing::Linear.apply(0.5), 0.5);
        assert_eq!(Easing::EaseIn.apply(0.5), 0.25);
        assert_eq!(Easing::EaseOut.apply(0.5), 0.75);
        assert_eq!(Easing::EaseInOut.apply(0.5), 0.5);
        for e in [Easing::Linear, Easing::EaseIn, Easing::EaseOut, Easing::EaseInOut] {
            assert_eq!(e.apply(0.0), 0.0);
            assert_eq!(e.apply(1.0), 1.0);
        }
    }

    #[test]
    fn test_normalize_keyframes_sorts_and_keeps_latest_duplicate() {
        let kfs = vec![
            Keyframe::new(2.0, Easing::Linear).with("opacity", PropertyValue::Scalar(0.2)),
            Keyframe::new(0.0, Easing::Linear).with("opacity", PropertyValue::Scalar(1.0)),
            Keyframe::new(2.0, Easing::EaseIn).with("opacity", PropertyValue::Scalar(0.8)),
        ];
        let sorted = normalize_keyframes(kfs);
        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted[0].time, 0.0);
        assert_eq!(sorted[1].easing, Easing::EaseIn);
        assert_eq!(sorted[1].get("opacity"), Some(&PropertyValue::Scalar(0.8)));
    }

    #[test]
    fn test_same_time_keyframes_merge_properties() {
        let kfs = vec![
            Keyframe::new(1.0, Easing::Linear).with("scale", PropertyValue::Scalar(2.0)),
            Keyframe::new(1.0, Easing::EaseOut).with("opacity", PropertyValue::Scalar(0.5)),
        ];
        let merged = normalize_keyframes(kfs);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].get("scale"), Some(&PropertyValue::Scalar(2.0)));
        assert_eq!(merged[0].get("opacity"), Some(&PropertyValue::Scalar(0.5)));
        assert_eq!(merged[0].easing, Easing::EaseOut);
    }

    #[test]
    fn test_property_value_from_json() {
        let v: PropertyValue = serde_json::json!(1.5).into();
        assert_eq!(v.as_scalar(), Some(1.5));

        let v: PropertyValue = serde_json::json!({"x": 10, "y": -4.5}).into();
        assert_eq!(v.as_vec2(), Some(Vec2::new(10.0, -4.5)));

        let v: PropertyValue = serde_json::json!("red").into();
        assert!(matches!(v, PropertyValue::Other(_)));
        assert_eq!(v.as_vec2(), None);
    }

    #[test]
    fn test_referenced_resources_skips_hidden_layers() {
        let mut hidden = Layer::new(LayerKind::Video).with_clip(Clip::media("hidden", 0.0, 1.0));
        hidden.visible = false;
        let timeline = Timeline::new(Resolution::new(1920, 1080), Resolution::new(960, 540))
            .with_layer(
                Layer::new(LayerKind::Video)
                    .with_clip(Clip::media("a", 0.0, 1.0))
                    .with_clip(Clip::media("a", 1.0, 1.0)),
            )
            .with_layer(hidden);
        assert_eq!(timeline.referenced_resources(), vec!["a"]);
        assert_eq!(timeline.clip_count(), 3);
    }
}
