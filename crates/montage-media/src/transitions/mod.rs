//! Transition synthesis.
//!
//! - [`clip`]: entry/exit effects folded into the export composite
//! - [`single`]: standalone fade and zoom on one source
//! - [`paired`]: dissolve, wipe and slide joining two sources
//! - [`normalize`]: letterboxing and audio format shared by the above

pub mod clip;
pub mod normalize;
pub mod paired;
pub mod single;

use std::path::PathBuf;

use montage_models::TransitionSpec;

use crate::error::{MediaError, MediaResult};
use crate::plan::RenderPlan;
use crate::probe::MediaInfo;

pub use clip::{clip_effects, ClipEffects};
pub use paired::paired_plan;
pub use single::single_clip_plan;

/// A probed source file fed to the synthesizer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceClip {
    pub path: PathBuf,
    pub info: MediaInfo,
}

impl SourceClip {
    pub fn new(path: impl Into<PathBuf>, info: MediaInfo) -> Self {
        Self {
            path: path.into(),
            info,
        }
    }
}

/// Build the plan for `spec` applied to one source or joining two.
pub fn synthesize(
    spec: &TransitionSpec,
    first: &SourceClip,
    second: Option<&SourceClip>,
    fps: u32,
) -> MediaResult<RenderPlan> {
    match (spec.is_paired(), second) {
        (true, Some(second)) => paired_plan(spec, first, second, fps),
        (false, None) => single_clip_plan(spec, first, fps),
        (true, None) => Err(MediaError::InvalidRequest(format!(
            "{} needs a second source",
            spec.kind().as_str()
        ))),
        (false, Some(_)) => Err(MediaError::InvalidRequest(format!(
            "{} takes a single source",
            spec.kind().as_str()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_models::{Direction, Phase};

    fn source() -> SourceClip {
        SourceClip::new("/media/a.mp4", MediaInfo::video(3.0, 640, 360))
    }

    #[test]
    fn test_arity_is_checked() {
        let wipe = TransitionSpec::Wipe {
            duration: 1.0,
            direction: Direction::Left,
        };
        let fade = TransitionSpec::Fade {
            duration: 1.0,
            phase: Phase::In,
        };
        assert!(synthesize(&wipe, &source(), None, 30).is_err());
        assert!(synthesize(&fade, &source(), Some(&source()), 30).is_err());
        assert!(synthesize(&wipe, &source(), Some(&source()), 30).is_ok());
        assert!(synthesize(&fade, &source(), None, 30).is_ok());
    }
}
