//! FFmpeg command builder and runner.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::graph::{FilterGraph, Pad};
use crate::progress::{EncodeProgress, FfmpegProgress, ProgressSink};
use montage_models::EncodingConfig;

/// Stderr lines kept for failure diagnostics.
const DIAGNOSTIC_LINES: usize = 20;

/// One `-i` input with its per-input options.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    /// Arguments placed before `-i` (seek, duration, loop)
    pub args: Vec<String>,
    pub path: PathBuf,
}

impl InputSpec {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            args: Vec::new(),
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Input-side seek.
    pub fn seek(mut self, seconds: f64) -> Self {
        if seconds > 0.0 {
            self.args.push("-ss".to_string());
            self.args.push(format!("{:.3}", seconds));
        }
        self
    }

    /// Read at most `seconds` from the input.
    pub fn duration(mut self, seconds: f64) -> Self {
        self.args.push("-t".to_string());
        self.args.push(format!("{:.3}", seconds));
        self
    }

    /// Repeat a still image as a video stream at `fps`.
    pub fn looped_image(mut self, fps: u32) -> Self {
        self.args.extend([
            "-loop".to_string(),
            "1".to_string(),
            "-framerate".to_string(),
            fps.to_string(),
        ]);
        self
    }
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<InputSpec>,
    output: PathBuf,
    /// Output arguments (after all inputs)
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add an input; returns its index for use in pads.
    pub fn add_input(&mut self, input: InputSpec) -> usize {
        self.inputs.push(input);
        self.inputs.len() - 1
    }

    /// Builder-style [`add_input`](Self::add_input).
    pub fn input(mut self, input: InputSpec) -> Self {
        self.add_input(input);
        self
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the filter graph.
    pub fn filter_complex(self, graph: &FilterGraph) -> Self {
        self.output_arg("-filter_complex")
            .output_arg(graph.to_filter_complex())
    }

    /// Map a pad to the output.
    pub fn map(self, pad: &Pad) -> Self {
        self.output_arg("-map").output_arg(pad.map_arg())
    }

    /// Apply video and audio encoding parameters.
    pub fn encoding(self, encoding: &EncodingConfig) -> Self {
        self.output_args(encoding.output_args(true))
    }

    /// Apply video parameters only and drop audio.
    pub fn video_only(self, encoding: &EncodingConfig) -> Self {
        self.output_args(encoding.output_args(false)).output_arg("-an")
    }

    /// Cap output duration.
    pub fn max_duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn inputs(&self) -> &[InputSpec] {
        &self.inputs
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());
        args.push("-nostats".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Something that can run an encoder command to completion.
///
/// `expected_duration` is the output length in seconds, used to turn the
/// encoder's progress into a fraction.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        cmd: &FfmpegCommand,
        expected_duration: f64,
        sink: &dyn ProgressSink,
    ) -> MediaResult<()>;
}

/// Runs FFmpeg as a child process with progress tracking.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs).filter(|s| *s > 0);
        self
    }

    /// Run an FFmpeg command with a progress callback.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, mut on_progress: F) -> MediaResult<()>
    where
        F: FnMut(&FfmpegProgress),
    {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr was not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        let mut current = FfmpegProgress::default();
        let mut diagnostics: VecDeque<String> = VecDeque::with_capacity(DIAGNOSTIC_LINES);

        let read_stderr = async {
            while let Ok(Some(line)) = reader.next_line().await {
                match parse_progress_line(&line, &mut current) {
                    ParsedLine::Progress(p) => on_progress(&p),
                    ParsedLine::Field => {}
                    ParsedLine::Diagnostic => {
                        if diagnostics.len() == DIAGNOSTIC_LINES {
                            diagnostics.pop_front();
                        }
                        diagnostics.push_back(line);
                    }
                }
            }
        };

        match self.timeout_secs {
            Some(secs) => {
                if tokio::time::timeout(Duration::from_secs(secs), read_stderr)
                    .await
                    .is_err()
                {
                    warn!("FFmpeg timed out after {} seconds, killing process", secs);
                    let _ = child.kill().await;
                    return Err(MediaError::Timeout(secs));
                }
            }
            None => read_stderr.await,
        }

        let stderr_tail: Vec<String> = diagnostics.into_iter().collect();
        Self::finish(&mut child, stderr_tail).await
    }

    async fn finish(child: &mut Child, stderr_tail: Vec<String>) -> MediaResult<()> {
        let status = child.wait().await?;

        if status.success() {
            Ok(())
        } else {
            let stderr = Some(stderr_tail.join("\n")).filter(|s| !s.is_empty());
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                stderr,
                status.code(),
            ))
        }
    }
}

#[async_trait]
impl CommandExecutor for FfmpegRunner {
    async fn execute(
        &self,
        cmd: &FfmpegCommand,
        expected_duration: f64,
        sink: &dyn ProgressSink,
    ) -> MediaResult<()> {
        let mut encode = EncodeProgress::new(sink, expected_duration);
        self.run_with_progress(cmd, |p| encode.update(p)).await
    }
}

enum ParsedLine {
    /// End of one progress block
    Progress(FfmpegProgress),
    /// A `key=value` progress field
    Field,
    /// Anything else: encoder diagnostics
    Diagnostic,
}

/// Parse a line from FFmpeg's `-progress` output.
fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> ParsedLine {
    let line = line.trim();

    let Some((key, value)) = line.split_once('=') else {
        return ParsedLine::Diagnostic;
    };

    match key {
        "out_time_ms" | "out_time_us" => {
            // Both keys carry microseconds in current FFmpeg builds
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "fps" => {
            if let Ok(fps) = value.parse() {
                current.fps = fps;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return ParsedLine::Progress(current.clone());
        }
        k if k.contains(' ') => return ParsedLine::Diagnostic,
        _ => {}
    }

    ParsedLine::Field
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Filter;

    #[test]
    fn test_command_builder() {
        let mut cmd = FfmpegCommand::new("out.mp4");
        let first = cmd.add_input(InputSpec::new("a.mp4").seek(10.0).duration(30.0));
        let second = cmd.add_input(InputSpec::new("logo.png").looped_image(30).duration(5.0));
        assert_eq!((first, second), (0, 1));

        let mut graph = FilterGraph::new();
        let out = graph.chain(
            vec![Pad::video(0), Pad::video(1)],
            vec![Filter::new("overlay")],
            "v",
        );
        let cmd = cmd
            .filter_complex(&graph)
            .map(&out)
            .encoding(&EncodingConfig::default());

        let args = cmd.build_args();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let first_i = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < first_i);
        assert_eq!(args[ss + 1], "10.000");
        assert!(args.contains(&"[0:v][1:v]overlay[v0]".to_string()));
        assert!(args.contains(&"[v0]".to_string()));
        assert!(args.contains(&"-loop".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_zero_seek_is_omitted() {
        let input = InputSpec::new("a.mp4").seek(0.0).duration(2.0);
        assert_eq!(input.args, vec!["-t".to_string(), "2.000".to_string()]);
    }

    #[test]
    fn test_progress_parsing() {
        let mut progress = FfmpegProgress::default();

        assert!(matches!(
            parse_progress_line("out_time_us=5000000", &mut progress),
            ParsedLine::Field
        ));
        assert_eq!(progress.out_time_ms, 5000);

        parse_progress_line("speed=1.5x", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        match parse_progress_line("progress=end", &mut progress) {
            ParsedLine::Progress(p) => assert!(p.is_complete),
            _ => panic!("expected a progress block"),
        }
    }

    #[test]
    fn test_diagnostic_lines_are_separated() {
        let mut progress = FfmpegProgress::default();
        assert!(matches!(
            parse_progress_line("[AVFilterGraph @ 0x1] No such filter: 'blendx'", &mut progress),
            ParsedLine::Diagnostic
        ));
        assert!(matches!(
            parse_progress_line("Error initializing filter 'scale' with args 'w=-1'", &mut progress),
            ParsedLine::Diagnostic
        ));
    }
}
