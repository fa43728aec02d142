//! Output encoding parameters.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Encoder settings applied to every render. Missing fields in a document
/// take the defaults: H.264 `fast` at CRF 23, 30 fps, AAC 192k, faststart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EncodingConfig {
    pub codec: String,
    pub preset: String,
    /// 0-51, lower is better
    pub crf: u8,
    pub fps: u32,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Put the moov atom first so playback can start before download ends
    pub faststart: bool,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".into(),
            preset: "fast".into(),
            crf: 23,
            fps: 30,
            audio_codec: "aac".into(),
            audio_bitrate: "192k".into(),
            faststart: true,
        }
    }
}

impl EncodingConfig {
    /// Settings for merge intermediates, which are re-encoded once more.
    pub fn for_intermediate() -> Self {
        Self {
            preset: "veryfast".into(),
            crf: 18,
            faststart: false,
            ..Self::default()
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    /// Output arguments; audio codec flags only when `with_audio`.
    pub fn output_args(&self, with_audio: bool) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-r".to_string(),
            self.fps.to_string(),
        ];

        if with_audio {
            args.extend(["-c:a".to_string(), self.audio_codec.clone()]);
            args.extend(["-b:a".to_string(), self.audio_bitrate.clone()]);
        }
        if self.faststart {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_default_output_args() {
        let args = EncodingConfig::default().output_args(true);
        assert!(has_pair(&args, "-c:v", "libx264"));
        assert!(has_pair(&args, "-crf", "23"));
        assert!(has_pair(&args, "-r", "30"));
        assert!(has_pair(&args, "-b:a", "192k"));
        assert!(has_pair(&args, "-movflags", "+faststart"));
    }

    #[test]
    fn test_video_only_args_omit_audio_codec() {
        let args = EncodingConfig::default().output_args(false);
        assert!(!args.iter().any(|a| a == "-c:a"));
    }

    #[test]
    fn test_intermediate_keeps_fps_and_skips_faststart() {
        let args = EncodingConfig::for_intermediate().with_fps(25).output_args(true);
        assert!(has_pair(&args, "-crf", "18"));
        assert!(has_pair(&args, "-r", "25"));
        assert!(!args.iter().any(|a| a == "+faststart"));
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: EncodingConfig = serde_json::from_str(r#"{"crf": 20}"#).unwrap();
        assert_eq!(config.crf, 20);
        assert_eq!(config.preset, "fast");
        assert_eq!(config.audio_bitrate, "192k");
    }
}
