//! Encoder-ready render plans.

use std::path::{Path, PathBuf};

use montage_models::EncodingConfig;

use crate::command::{FfmpegCommand, InputSpec};
use crate::graph::{FilterGraph, Pad};

/// Inputs, filter graph and output pads for one encoder run.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub inputs: Vec<InputSpec>,
    pub graph: FilterGraph,
    pub video_out: Pad,
    /// `None` writes a file without an audio stream
    pub audio_out: Option<Pad>,
    /// Output length in seconds
    pub duration: f64,
}

impl RenderPlan {
    pub fn new(video_out: Pad, duration: f64) -> Self {
        Self {
            inputs: Vec::new(),
            graph: FilterGraph::new(),
            video_out,
            audio_out: None,
            duration,
        }
    }

    /// Register an input and return its index.
    pub fn add_input(&mut self, input: InputSpec) -> usize {
        self.inputs.push(input);
        self.inputs.len() - 1
    }

    /// Output pads that must remain unconsumed in the graph.
    pub fn sinks(&self) -> Vec<Pad> {
        let mut sinks = vec![self.video_out.clone()];
        sinks.extend(self.audio_out.clone());
        sinks
    }

    /// Build the encoder command writing to `output`.
    pub fn to_command(&self, output: impl AsRef<Path>, encoding: &EncodingConfig) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(output);
        for input in &self.inputs {
            cmd.add_input(input.clone());
        }
        if !self.graph.is_empty() {
            cmd = cmd.filter_complex(&self.graph);
        }
        cmd = cmd.map(&self.video_out);
        cmd = match &self.audio_out {
            Some(audio) => cmd.map(audio).encoding(encoding),
            None => cmd.video_only(encoding),
        };
        cmd.max_duration(self.duration)
    }
}

/// A finished render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutcome {
    pub output: PathBuf,
    /// Output length in seconds
    pub duration: f64,
    /// Degradations to surface in the task status
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Filter;

    #[test]
    fn test_command_maps_outputs() {
        let mut plan = RenderPlan::new(Pad::label("vout"), 4.0);
        let input = plan.add_input(InputSpec::new("/media/a.mp4"));
        plan.graph.push(
            vec![Pad::video(input)],
            vec![Filter::new("format").arg("yuv420p")],
            vec![Pad::label("vout")],
        );
        plan.audio_out = Some(Pad::audio(input));

        let args = plan
            .to_command("/out/x.mp4", &EncodingConfig::default())
            .build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-filter_complex [0:v]format=yuv420p[vout]"));
        assert!(joined.contains("-map [vout] -map 0:a"));
        assert!(joined.contains("-c:a aac"));
        assert!(joined.contains("-t 4.000"));
        assert_eq!(args.last().unwrap(), "/out/x.mp4");
        assert!(plan.graph.dangling_labels(&plan.sinks()).is_empty());
    }

    #[test]
    fn test_video_only_plan_drops_audio() {
        let mut plan = RenderPlan::new(Pad::video(0), 2.0);
        plan.add_input(InputSpec::new("/media/a.mp4"));
        let args = plan
            .to_command("/out/x.mp4", &EncodingConfig::default())
            .build_args();
        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"-filter_complex".to_string()));
    }
}
