//! Transition definitions.
//!
//! A transition is parsed once into a [`TransitionSpec`] variant. Each variant
//! only carries the direction type that is meaningful for its kind, so an
//! invalid pairing (a wipe going "in", a fade going "left") cannot exist past
//! the parsing boundary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ValidationError, ValidationResult};

/// Longest transition accepted, in seconds.
pub const MAX_TRANSITION_SECS: f64 = 5.0;

/// Transition family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Fade,
    Dissolve,
    Wipe,
    Slide,
    Zoom,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Fade => "fade",
            TransitionKind::Dissolve => "dissolve",
            TransitionKind::Wipe => "wipe",
            TransitionKind::Slide => "slide",
            TransitionKind::Zoom => "zoom",
        }
    }

    /// Whether this kind blends two adjacent sources.
    pub fn is_paired(&self) -> bool {
        matches!(
            self,
            TransitionKind::Dissolve | TransitionKind::Wipe | TransitionKind::Slide
        )
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransitionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fade" => Ok(TransitionKind::Fade),
            "dissolve" | "crossfade" | "cross-dissolve" => Ok(TransitionKind::Dissolve),
            "wipe" => Ok(TransitionKind::Wipe),
            "slide" => Ok(TransitionKind::Slide),
            "zoom" => Ok(TransitionKind::Zoom),
            _ => Err(ValidationError::UnknownTransition(s.to_string())),
        }
    }
}

/// Whether a single-clip effect runs at the head or the tail of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    In,
    Out,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::In => "in",
            Phase::Out => "out",
        }
    }
}

/// Cardinal direction for wipe and slide.
///
/// The direction names where the boundary (wipe) or the content (slide) moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    /// Whether motion happens along the x axis.
    pub fn is_horizontal(&self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }
}

/// A validated transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionSpec {
    Fade { duration: f64, phase: Phase },
    Zoom { duration: f64, phase: Phase },
    Dissolve { duration: f64 },
    Wipe { duration: f64, direction: Direction },
    Slide { duration: f64, direction: Direction },
}

impl TransitionSpec {
    /// Parse a transition from its loosely-typed parts.
    ///
    /// `default_phase` is used for fade and zoom when no direction is given,
    /// which is how clip-level `in`/`out` slots imply their phase.
    pub fn parse(
        kind: &str,
        duration: f64,
        direction: Option<&str>,
        default_phase: Phase,
    ) -> ValidationResult<Self> {
        let kind: TransitionKind = kind.parse()?;

        if !duration.is_finite() || duration <= 0.0 || duration > MAX_TRANSITION_SECS {
            return Err(ValidationError::invalid_value(
                "transition.duration",
                format!(
                    "{} transition duration {} must be in (0, {}] seconds",
                    kind, duration, MAX_TRANSITION_SECS
                ),
            ));
        }

        let direction = direction.map(|d| d.trim().to_lowercase());

        let spec = match kind {
            TransitionKind::Fade | TransitionKind::Zoom => {
                let phase = match direction.as_deref() {
                    None | Some("") => default_phase,
                    Some("in") => Phase::In,
                    Some("out") => Phase::Out,
                    Some(other) => {
                        return Err(ValidationError::unsupported_direction(kind.as_str(), other))
                    }
                };
                if kind == TransitionKind::Fade {
                    TransitionSpec::Fade { duration, phase }
                } else {
                    TransitionSpec::Zoom { duration, phase }
                }
            }
            TransitionKind::Dissolve => TransitionSpec::Dissolve { duration },
            TransitionKind::Wipe | TransitionKind::Slide => {
                let direction = match direction.as_deref() {
                    Some("left") => Direction::Left,
                    Some("right") => Direction::Right,
                    Some("up") => Direction::Up,
                    Some("down") => Direction::Down,
                    other => {
                        return Err(ValidationError::unsupported_direction(
                            kind.as_str(),
                            other.unwrap_or("<missing>"),
                        ))
                    }
                };
                if kind == TransitionKind::Wipe {
                    TransitionSpec::Wipe { duration, direction }
                } else {
                    TransitionSpec::Slide { duration, direction }
                }
            }
        };

        Ok(spec)
    }

    pub fn kind(&self) -> TransitionKind {
        match self {
            TransitionSpec::Fade { .. } => TransitionKind::Fade,
            TransitionSpec::Zoom { .. } => TransitionKind::Zoom,
            TransitionSpec::Dissolve { .. } => TransitionKind::Dissolve,
            TransitionSpec::Wipe { .. } => TransitionKind::Wipe,
            TransitionSpec::Slide { .. } => TransitionKind::Slide,
        }
    }

    /// Requested duration in seconds.
    pub fn duration(&self) -> f64 {
        match *self {
            TransitionSpec::Fade { duration, .. }
            | TransitionSpec::Zoom { duration, .. }
            | TransitionSpec::Dissolve { duration }
            | TransitionSpec::Wipe { duration, .. }
            | TransitionSpec::Slide { duration, .. } => duration,
        }
    }

    pub fn is_paired(&self) -> bool {
        self.kind().is_paired()
    }

    /// Phase of a single-clip effect.
    pub fn phase(&self) -> Option<Phase> {
        match *self {
            TransitionSpec::Fade { phase, .. } | TransitionSpec::Zoom { phase, .. } => Some(phase),
            _ => None,
        }
    }

    /// Direction of a wipe or slide.
    pub fn direction(&self) -> Option<Direction> {
        match *self {
            TransitionSpec::Wipe { direction, .. } | TransitionSpec::Slide { direction, .. } => {
                Some(direction)
            }
            _ => None,
        }
    }

    /// Overlap actually used when blending sources of the given durations.
    pub fn overlap(&self, first_duration: f64, second_duration: f64) -> f64 {
        self.duration().min(first_duration).min(second_duration).max(0.0)
    }
}

impl fmt::Display for TransitionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.phase(), self.direction()) {
            (Some(phase), _) => write!(f, "{} {} ({:.2}s)", self.kind(), phase.as_str(), self.duration()),
            (_, Some(dir)) => write!(f, "{} {} ({:.2}s)", self.kind(), dir.as_str(), self.duration()),
            _ => write!(f, "{} ({:.2}s)", self.kind(), self.duration()),
        }
    }
}

/// Duration of the clip produced by a paired transition.
pub fn paired_output_duration(first_duration: f64, second_duration: f64, requested: f64) -> f64 {
    let overlap = requested.min(first_duration).min(second_duration).max(0.0);
    first_duration + second_duration - overlap
}
