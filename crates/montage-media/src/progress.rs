//! Progress reporting.
//!
//! Renders report coarse milestones through a [`ProgressSink`]; the encoder's
//! own `-progress` stream is parsed into [`FfmpegProgress`].

use serde::{Deserialize, Serialize};

/// Receiver for fractional progress in `[0, 1]`.
///
/// Called a handful of times per render. A sink that does nothing is valid.
pub trait ProgressSink: Send + Sync {
    fn report(&self, fraction: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, fraction: f64) {
        self(fraction)
    }
}

/// Sink that discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn report(&self, _fraction: f64) {}
}

/// Milestones reported while rendering a timeline.
pub mod milestones {
    pub const PARSED: f64 = 0.05;
    pub const RESOLVED: f64 = 0.15;
    pub const COMPOSED: f64 = 0.30;
    pub const OVERLAY: f64 = 0.45;
    pub const AUDIO_MIX: f64 = 0.55;
    pub const ENCODE_START: f64 = 0.60;
    pub const DONE: f64 = 1.0;
}

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Fraction of `total_duration_ms` already encoded, in `[0, 1]`.
    pub fn fraction(&self, total_duration_ms: i64) -> f64 {
        if self.is_complete {
            return 1.0;
        }
        if total_duration_ms <= 0 {
            return 0.0;
        }
        (self.out_time_ms as f64 / total_duration_ms as f64).clamp(0.0, 1.0)
    }
}

/// Maps encoder progress into `[start, end)` of the overall render and
/// forwards it to a sink in coarse steps.
pub struct EncodeProgress<'a> {
    sink: &'a dyn ProgressSink,
    start: f64,
    end: f64,
    step: f64,
    total_ms: i64,
    last: f64,
}

impl<'a> EncodeProgress<'a> {
    pub fn new(sink: &'a dyn ProgressSink, total_seconds: f64) -> Self {
        Self {
            sink,
            start: milestones::ENCODE_START,
            end: 0.99,
            step: 0.1,
            total_ms: (total_seconds * 1000.0).round() as i64,
            last: milestones::ENCODE_START,
        }
    }

    /// Forward `progress` if it advanced by at least one step.
    pub fn update(&mut self, progress: &FfmpegProgress) {
        let overall = self.start + (self.end - self.start) * progress.fraction(self.total_ms);
        if overall - self.last >= self.step - 1e-9 {
            self.last = overall;
            self.sink.report(overall);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_fraction() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };
        assert!((progress.fraction(10000) - 0.5).abs() < 1e-9);
        assert!((progress.fraction(2000) - 1.0).abs() < 1e-9);
        assert_eq!(progress.fraction(0), 0.0);
    }

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |f: f64| seen.lock().unwrap().push(f);
        sink.report(0.25);
        NoopSink.report(0.5);
        assert_eq!(*seen.lock().unwrap(), vec![0.25]);
    }

    #[test]
    fn test_encode_progress_is_coarse() {
        let seen = Mutex::new(Vec::new());
        let sink = |f: f64| seen.lock().unwrap().push(f);
        let mut encode = EncodeProgress::new(&sink, 10.0);

        for ms in (0..=10_000).step_by(100) {
            encode.update(&FfmpegProgress {
                out_time_ms: ms,
                ..Default::default()
            });
        }

        let seen = seen.into_inner().unwrap();
        assert!(seen.len() <= 4, "too many reports: {:?}", seen);
        assert!(seen.iter().all(|f| *f > milestones::ENCODE_START && *f < 1.0));
    }
}
