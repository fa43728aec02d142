//! What `ffprobe` reports about a source.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Stream facts the compositor needs about a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Seconds; 0 for stills
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub has_video: bool,
    pub has_audio: bool,
}

impl MediaInfo {
    /// A video source with an audio track.
    pub fn video(duration: f64, width: u32, height: u32) -> Self {
        Self {
            duration,
            width,
            height,
            has_video: true,
            has_audio: true,
        }
    }

    /// An audio-only source.
    pub fn audio(duration: f64) -> Self {
        Self {
            duration,
            width: 0,
            height: 0,
            has_video: false,
            has_audio: true,
        }
    }

    /// A still image.
    pub fn image(width: u32, height: u32) -> Self {
        Self::video(0.0, width, height).without_audio()
    }

    pub fn without_audio(mut self) -> Self {
        self.has_audio = false;
        self
    }
}

/// Source of [`MediaInfo`], abstracted so compositing can run without the
/// external tool.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;
}

/// [`MediaProbe`] backed by the `ffprobe` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeProbe;

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        probe_media(path).await
    }
}

/// The parts of `-show_format -show_streams` JSON that are read.
#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Run `ffprobe` on a file.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }
    media_info_from_json(&output.stdout)
}

fn seconds(value: Option<&str>) -> Option<f64> {
    value?.parse::<f64>().ok().filter(|d| d.is_finite() && *d > 0.0)
}

fn media_info_from_json(json: &[u8]) -> MediaResult<MediaInfo> {
    let report: ProbeReport = serde_json::from_slice(json)?;

    let video = report.streams.iter().find(|s| s.codec_type == "video");
    let has_audio = report.streams.iter().any(|s| s.codec_type == "audio");
    if video.is_none() && !has_audio {
        return Err(MediaError::InvalidMedia(
            "no audio or video stream found".to_string(),
        ));
    }

    // Container duration, else the longest stream; stills report neither
    let duration = seconds(report.format.duration.as_deref())
        .or_else(|| {
            report
                .streams
                .iter()
                .filter_map(|s| seconds(s.duration.as_deref()))
                .reduce(f64::max)
        })
        .unwrap_or(0.0);

    Ok(MediaInfo {
        duration,
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
        has_video: video.is_some(),
        has_audio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_with_audio() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080},
                {"codec_type": "audio"}
            ],
            "format": {"duration": "12.500000"}
        }"#;
        let info = media_info_from_json(json).unwrap();
        assert_eq!(info, MediaInfo::video(12.5, 1920, 1080));
    }

    #[test]
    fn test_still_image_has_no_duration() {
        let json = br#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 480}],
            "format": {"duration": "N/A"}
        }"#;
        assert_eq!(media_info_from_json(json).unwrap(), MediaInfo::image(640, 480));
    }

    #[test]
    fn test_stream_duration_used_without_container_duration() {
        let json = br#"{
            "streams": [
                {"codec_type": "audio", "duration": "3.2"},
                {"codec_type": "audio", "duration": "4.0"}
            ]
        }"#;
        let info = media_info_from_json(json).unwrap();
        assert_eq!(info, MediaInfo::audio(4.0));
    }

    #[test]
    fn test_streamless_file_is_rejected() {
        let json = br#"{"streams": [], "format": {}}"#;
        assert!(matches!(
            media_info_from_json(json),
            Err(MediaError::InvalidMedia(_))
        ));
    }
}
