//! Shared data models for the Montage renderer.
//!
//! This crate provides:
//! - The typed timeline model and its JSON wire document
//! - Transition specifications
//! - Render requests and task status records
//! - Encoding configuration

pub mod document;
pub mod encoding;
pub mod error;
pub mod request;
pub mod task;
pub mod timeline;
pub mod transition;

// Re-export common types
pub use document::{timeline_schema, TimelineDocument};
pub use encoding::EncodingConfig;
pub use error::{ValidationError, ValidationResult};
pub use request::RenderRequest;
pub use task::{InvalidTransition, TaskId, TaskKind, TaskRecord, TaskStatus, TaskStatusDocument};
pub use timeline::{
    normalize_keyframes, usable_duration, Clip, ClipSource, ClipTransitions, Easing, Keyframe,
    Layer, LayerKind, PropertyValue, Resolution, TextSpec, Timeline, Vec2,
};
pub use transition::{
    paired_output_duration, Direction, Phase, TransitionKind, TransitionSpec,
    MAX_TRANSITION_SECS,
};
