//! Render requests accepted by the task service.
//!
//! Every request is validated synchronously; a request that fails
//! [`RenderRequest::validate`] never becomes a task.

use crate::error::{ValidationError, ValidationResult};
use crate::task::TaskKind;
use crate::timeline::Timeline;
use crate::transition::TransitionSpec;

/// Work submitted to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderRequest {
    /// Render a whole timeline.
    Export { timeline: Timeline },
    /// Keep `[start, end)` of one resource.
    Cut {
        resource_id: String,
        start: f64,
        end: f64,
    },
    /// Drop `trim_start` seconds from the head and `trim_end` from the tail.
    Trim {
        resource_id: String,
        trim_start: f64,
        trim_end: f64,
    },
    /// Concatenate resources in order, optionally joining each seam with a
    /// paired transition.
    Merge {
        resource_ids: Vec<String>,
        transition: Option<TransitionSpec>,
    },
    /// Apply one transition directly. Paired kinds need `second`.
    Transition {
        first: String,
        second: Option<String>,
        spec: TransitionSpec,
    },
}

impl RenderRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            RenderRequest::Export { .. } => TaskKind::Export,
            RenderRequest::Cut { .. } => TaskKind::Cut,
            RenderRequest::Trim { .. } => TaskKind::Trim,
            RenderRequest::Merge { .. } => TaskKind::Merge,
            RenderRequest::Transition { .. } => TaskKind::Transition,
        }
    }

    /// Resource ids the request reads, in order.
    pub fn resources(&self) -> Vec<&str> {
        match self {
            RenderRequest::Export { timeline } => timeline.referenced_resources(),
            RenderRequest::Cut { resource_id, .. } | RenderRequest::Trim { resource_id, .. } => {
                vec![resource_id.as_str()]
            }
            RenderRequest::Merge { resource_ids, .. } => {
                resource_ids.iter().map(String::as_str).collect()
            }
            RenderRequest::Transition { first, second, .. } => std::iter::once(first.as_str())
                .chain(second.as_deref())
                .collect(),
        }
    }

    /// Structural checks that need no media access.
    pub fn validate(&self) -> ValidationResult<()> {
        match self {
            RenderRequest::Export { .. } => Ok(()),
            RenderRequest::Cut {
                resource_id,
                start,
                end,
            } => {
                require_resource_id(resource_id)?;
                if !start.is_finite() || !end.is_finite() || *start < 0.0 {
                    return Err(ValidationError::invalid_time_range(format!(
                        "cut bounds must be finite and non-negative (start={}, end={})",
                        start, end
                    )));
                }
                if end <= start {
                    return Err(ValidationError::invalid_time_range(format!(
                        "cut end {} must be after start {}",
                        end, start
                    )));
                }
                Ok(())
            }
            RenderRequest::Trim {
                resource_id,
                trim_start,
                trim_end,
            } => {
                require_resource_id(resource_id)?;
                for (name, value) in [("trimStart", trim_start), ("trimEnd", trim_end)] {
                    if !value.is_finite() || *value < 0.0 {
                        return Err(ValidationError::invalid_time_range(format!(
                            "{} must be a non-negative number, got {}",
                            name, value
                        )));
                    }
                }
                Ok(())
            }
            RenderRequest::Merge {
                resource_ids,
                transition,
            } => {
                if resource_ids.len() < 2 {
                    return Err(ValidationError::invalid_request(format!(
                        "merge needs at least two resources, got {}",
                        resource_ids.len()
                    )));
                }
                for id in resource_ids {
                    require_resource_id(id)?;
                }
                if let Some(spec) = transition {
                    if !spec.is_paired() {
                        return Err(ValidationError::invalid_request(format!(
                            "{} is a single-clip transition and cannot join merge seams",
                            spec.kind()
                        )));
                    }
                }
                Ok(())
            }
            RenderRequest::Transition {
                first,
                second,
                spec,
            } => {
                require_resource_id(first)?;
                match (spec.is_paired(), second) {
                    (true, Some(second)) => require_resource_id(second),
                    (true, None) => Err(ValidationError::invalid_request(format!(
                        "{} transition needs two resources",
                        spec.kind()
                    ))),
                    (false, Some(_)) => Err(ValidationError::invalid_request(format!(
                        "{} transition takes a single resource",
                        spec.kind()
                    ))),
                    (false, None) => Ok(()),
                }
            }
        }
    }
}

fn require_resource_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::invalid_request("resource id must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::{Direction, Phase};

    #[test]
    fn test_cut_requires_ordered_bounds() {
        let req = RenderRequest::Cut {
            resource_id: "a".into(),
            start: 4.0,
            end: 2.0,
        };
        assert!(matches!(
            req.validate(),
            Err(ValidationError::InvalidTimeRange(_))
        ));

        let req = RenderRequest::Cut {
            resource_id: "a".into(),
            start: 1.0,
            end: 2.5,
        };
        assert!(req.validate().is_ok());
        assert_eq!(req.kind(), TaskKind::Cut);
    }

    #[test]
    fn test_trim_rejects_negative_bounds() {
        let req = RenderRequest::Trim {
            resource_id: "a".into(),
            trim_start: -1.0,
            trim_end: 0.0,
        };
        assert!(matches!(
            req.validate(),
            Err(ValidationError::InvalidTimeRange(_))
        ));
    }

    #[test]
    fn test_merge_rejects_single_clip_transition() {
        let req = RenderRequest::Merge {
            resource_ids: vec!["a".into(), "b".into()],
            transition: Some(TransitionSpec::Fade {
                duration: 1.0,
                phase: Phase::In,
            }),
        };
        assert!(matches!(
            req.validate(),
            Err(ValidationError::InvalidRequest(_))
        ));

        let req = RenderRequest::Merge {
            resource_ids: vec!["a".into(), "b".into(), "c".into()],
            transition: Some(TransitionSpec::Wipe {
                duration: 1.0,
                direction: Direction::Left,
            }),
        };
        assert!(req.validate().is_ok());
        assert_eq!(req.resources(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_needs_two_resources() {
        let req = RenderRequest::Merge {
            resource_ids: vec!["a".into()],
            transition: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_transition_arity() {
        let paired = TransitionSpec::Dissolve { duration: 1.0 };
        let req = RenderRequest::Transition {
            first: "a".into(),
            second: None,
            spec: paired,
        };
        assert!(req.validate().is_err());

        let single = TransitionSpec::Zoom {
            duration: 1.0,
            phase: Phase::Out,
        };
        let req = RenderRequest::Transition {
            first: "a".into(),
            second: None,
            spec: single,
        };
        assert!(req.validate().is_ok());
        assert_eq!(req.resources(), vec!["a"]);
    }
}
