//! Timeline document wire format.
//!
//! The document is the JSON object submitted by the editor at export time.
//! It is deserialized leniently (defaults for everything the editor may omit)
//! and then converted once into the typed [`Timeline`] model, failing fast
//! with a [`ValidationError`] that names the offending field.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ValidationError, ValidationResult};
use crate::timeline::{
    normalize_keyframes, Clip, ClipSource, ClipTransitions, Easing, Keyframe, Layer, LayerKind,
    PropertyValue, Resolution, TextSpec, Timeline, Vec2,
};
use crate::transition::{Phase, TransitionSpec};

/// Default font family for text clips.
pub const DEFAULT_FONT_FAMILY: &str = "Sans";
/// Default font size (source-canvas pixels) for text clips.
pub const DEFAULT_FONT_SIZE: f64 = 48.0;
/// Default text colour.
pub const DEFAULT_TEXT_COLOR: &str = "#ffffff";

/// Root timeline document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDocument {
    /// Export canvas size
    pub resolution: ResolutionDocument,

    /// Preview canvas size the editor laid clips out on (defaults to `resolution`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_resolution: Option<ResolutionDocument>,

    /// Declared duration, used only when the timeline has no clips
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Layers, bottom first
    #[serde(default)]
    pub layers: Vec<LayerDocument>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct ResolutionDocument {
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LayerDocument {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default = "default_true")]
    pub visible: bool,

    #[serde(default)]
    pub muted: bool,

    #[serde(default)]
    pub clips: Vec<ClipDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClipDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    #[serde(default)]
    pub start_time: f64,

    #[serde(default)]
    pub duration: f64,

    #[serde(default)]
    pub trim_start: f64,

    #[serde(default)]
    pub trim_end: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleDocument>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<PointDocument>,

    #[serde(default)]
    pub rotation: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,

    #[serde(default)]
    pub keyframes: Vec<KeyframeDocument>,

    #[serde(default)]
    pub transitions: TransitionsDocument,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ClipDataDocument>,
}

/// Scale is either uniform or per-axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ScaleDocument {
    Uniform(f64),
    Axes { x: f64, y: f64 },
}

impl ScaleDocument {
    fn to_vec2(self) -> Vec2 {
        match self {
            ScaleDocument::Uniform(s) => Vec2::splat(s),
            ScaleDocument::Axes { x, y } => Vec2::new(x, y),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default)]
pub struct PointDocument {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeyframeDocument {
    pub time: f64,

    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easing: Option<String>,

    /// Properties the editor wrote inline next to `time`.
    #[serde(flatten)]
    pub inline: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct TransitionsDocument {
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<TransitionDocument>,

    #[serde(rename = "out", default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<TransitionDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransitionDocument {
    #[serde(alias = "type")]
    pub kind: String,

    pub duration: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

impl TransitionDocument {
    /// Validate into a typed transition; `default_phase` applies to fade/zoom.
    pub fn to_spec(&self, default_phase: Phase) -> ValidationResult<TransitionSpec> {
        TransitionSpec::parse(
            &self.kind,
            self.duration,
            self.direction.as_deref(),
            default_phase,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClipDataDocument {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

fn default_true() -> bool {
    true
}

/// JSON schema for the timeline document.
pub fn timeline_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(TimelineDocument)
}

impl TimelineDocument {
    /// Parse and validate a JSON document into a [`Timeline`].
    pub fn parse(json: &str) -> ValidationResult<Timeline> {
        let doc: TimelineDocument = serde_json::from_str(json)?;
        doc.into_timeline()
    }

    /// Validate this document into a [`Timeline`].
    pub fn into_timeline(self) -> ValidationResult<Timeline> {
        let export_resolution = to_resolution("export", self.resolution)?;
        let source_resolution = match self.source_resolution {
            Some(r) => to_resolution("source", r)?,
            None => export_resolution,
        };

        let duration_hint = match self.duration {
            Some(d) if !d.is_finite() || d < 0.0 => {
                return Err(ValidationError::invalid_value(
                    "duration",
                    format!("{} is not a valid duration", d),
                ))
            }
            Some(d) if d > 0.0 => Some(d),
            _ => None,
        };

        let layers = self
            .layers
            .into_iter()
            .enumerate()
            .map(|(index, layer)| layer.into_layer(index))
            .collect::<ValidationResult<Vec<_>>>()?;

        Ok(Timeline {
            duration_hint,
            export_resolution,
            source_resolution,
            layers,
        })
    }
}

fn to_resolution(field: &'static str, r: ResolutionDocument) -> ValidationResult<Resolution> {
    if r.width <= 0 || r.height <= 0 || r.width > u32::MAX as i64 || r.height > u32::MAX as i64 {
        return Err(ValidationError::InvalidResolution {
            field,
            width: r.width,
            height: r.height,
        });
    }
    Ok(Resolution::new(r.width as u32, r.height as u32))
}

fn parse_layer_kind(kind: &str) -> ValidationResult<LayerKind> {
    match kind.to_lowercase().as_str() {
        "video" => Ok(LayerKind::Video),
        "audio" => Ok(LayerKind::Audio),
        "image" => Ok(LayerKind::Image),
        "text" => Ok(LayerKind::Text),
        _ => Err(ValidationError::UnknownLayerKind(kind.to_string())),
    }
}

fn parse_easing(easing: Option<&str>) -> ValidationResult<Easing> {
    match easing.map(|e| e.to_lowercase()) {
        None => Ok(Easing::Linear),
        Some(e) => match e.as_str() {
            "" | "linear" => Ok(Easing::Linear),
            "ease-in" | "easein" | "ease_in" => Ok(Easing::EaseIn),
            "ease-out" | "easeout" | "ease_out" => Ok(Easing::EaseOut),
            "ease-in-out" | "easeinout" | "ease_in_out" => Ok(Easing::EaseInOut),
            _ => Err(ValidationError::UnknownEasing(e)),
        },
    }
}

impl LayerDocument {
    fn into_layer(self, index: usize) -> ValidationResult<Layer> {
        let kind = parse_layer_kind(&self.kind)?;
        let clips = self
            .clips
            .into_iter()
            .enumerate()
            .map(|(clip_index, clip)| clip.into_clip(kind, index, clip_index))
            .collect::<ValidationResult<Vec<_>>>()?;

        Ok(Layer {
            kind,
            visible: self.visible,
            muted: self.muted,
            clips,
        })
    }
}

impl ClipDocument {
    fn into_clip(self, layer_kind: LayerKind, layer: usize, clip: usize) -> ValidationResult<Clip> {
        let field = |name: &str| format!("layers[{}].clips[{}].{}", layer, clip, name);

        if !self.start_time.is_finite() || self.start_time < 0.0 {
            return Err(ValidationError::invalid_time_range(format!(
                "{} must be >= 0 (got {})",
                field("startTime"),
                self.start_time
            )));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(ValidationError::invalid_time_range(format!(
                "{} must be > 0 (got {})",
                field("duration"),
                self.duration
            )));
        }
        for (name, value) in [("trimStart", self.trim_start), ("trimEnd", self.trim_end)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::invalid_time_range(format!(
                    "{} must be >= 0 (got {})",
                    field(name),
                    value
                )));
            }
        }

        let opacity = self.opacity.unwrap_or(1.0);
        if !(0.0..=1.0).contains(&opacity) {
            return Err(ValidationError::invalid_value(
                field("opacity"),
                format!("{} is outside [0, 1]", opacity),
            ));
        }

        let volume = self.volume.unwrap_or(1.0);
        if !volume.is_finite() || volume < 0.0 {
            return Err(ValidationError::invalid_value(
                field("volume"),
                format!("{} must be >= 0", volume),
            ));
        }

        let scale = self.scale.map(ScaleDocument::to_vec2).unwrap_or(Vec2::ONE);
        if !(scale.x.is_finite() && scale.y.is_finite() && scale.x > 0.0 && scale.y > 0.0) {
            return Err(ValidationError::invalid_value(
                field("scale"),
                format!("({}, {}) must be positive on both axes", scale.x, scale.y),
            ));
        }

        let position = self
            .position
            .map(|p| Vec2::new(p.x, p.y))
            .unwrap_or(Vec2::ZERO);
        if !(position.x.is_finite() && position.y.is_finite()) {
            return Err(ValidationError::invalid_value(field("position"), "must be finite"));
        }
        if !self.rotation.is_finite() {
            return Err(ValidationError::invalid_value(field("rotation"), "must be finite"));
        }

        let data = self.data.unwrap_or_default();
        let is_text = layer_kind == LayerKind::Text
            || data.kind.as_deref().map(|k| k.eq_ignore_ascii_case("text")) == Some(true);

        let source = if is_text {
            let content = data
                .text
                .filter(|t| !t.is_empty())
                .ok_or(ValidationError::MissingText { layer, clip })?;
            let font_size = data.font_size.unwrap_or(DEFAULT_FONT_SIZE);
            if !font_size.is_finite() || font_size <= 0.0 {
                return Err(ValidationError::invalid_value(
                    field("data.fontSize"),
                    format!("{} must be > 0", font_size),
                ));
            }
            ClipSource::Text(TextSpec {
                content,
                font_family: data
                    .font_family
                    .filter(|f| !f.is_empty())
                    .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
                font_size,
                color: data
                    .color
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_string()),
            })
        } else {
            let resource_id = self
                .resource_id
                .filter(|id| !id.trim().is_empty())
                .ok_or(ValidationError::MissingResourceId { layer, clip })?;
            ClipSource::Media { resource_id }
        };

        let keyframes = self
            .keyframes
            .into_iter()
            .map(|kf| kf.into_keyframe(&field("keyframes")))
            .collect::<ValidationResult<Vec<_>>>()?;

        let transitions = ClipTransitions {
            entry: self
                .transitions
                .entry
                .as_ref()
                .map(|t| t.to_spec(Phase::In))
                .transpose()?,
            exit: self
                .transitions
                .exit
                .as_ref()
                .map(|t| t.to_spec(Phase::Out))
                .transpose()?,
        };

        Ok(Clip {
            source,
            start_time: self.start_time,
            duration: self.duration,
            trim_start: self.trim_start,
            trim_end: self.trim_end,
            scale,
            position,
            rotation: self.rotation,
            opacity,
            volume,
            keyframes: normalize_keyframes(keyframes),
            transitions,
        })
    }
}

impl KeyframeDocument {
    fn into_keyframe(self, field: &str) -> ValidationResult<Keyframe> {
        if !self.time.is_finite() || self.time < 0.0 {
            return Err(ValidationError::invalid_time_range(format!(
                "{} time must be >= 0 (got {})",
                field, self.time
            )));
        }

        let easing = parse_easing(self.easing.as_deref())?;
        let mut properties: BTreeMap<String, PropertyValue> = self
            .inline
            .into_iter()
            .map(|(name, value)| (name, PropertyValue::from(value)))
            .collect();
        // Explicit `properties` win over inline duplicates.
        for (name, value) in self.properties {
            properties.insert(name, PropertyValue::from(value));
        }

        Ok(Keyframe {
            time: self.time,
            properties,
            easing,
        })
    }
}
