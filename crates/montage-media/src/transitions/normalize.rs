//! Stream normalization before joining sources.

use montage_models::Resolution;

use crate::graph::{Filter, FilterGraph, Pad};

pub const AUDIO_SAMPLE_RATE: u32 = 44_100;
pub const AUDIO_LAYOUT: &str = "stereo";

/// Filters that letterbox a video stream into `target` at a fixed frame rate.
pub fn video_filters(target: Resolution, fps: u32) -> Vec<Filter> {
    vec![
        Filter::new("scale")
            .opt("w", target.width)
            .opt("h", target.height)
            .opt("force_original_aspect_ratio", "decrease"),
        Filter::new("pad")
            .opt("w", target.width)
            .opt("h", target.height)
            .opt("x", "(ow-iw)/2")
            .opt("y", "(oh-ih)/2"),
        Filter::new("setsar").arg(1),
        Filter::new("fps").arg(fps),
        Filter::new("format").arg("yuv420p"),
    ]
}

/// Common sample format for audio streams.
pub fn audio_format() -> Filter {
    Filter::new("aformat")
        .opt("sample_rates", AUDIO_SAMPLE_RATE)
        .opt("channel_layouts", AUDIO_LAYOUT)
}

/// Letterbox `input` into `target`.
pub fn normalize_video(graph: &mut FilterGraph, input: Pad, target: Resolution, fps: u32) -> Pad {
    graph.chain(vec![input], video_filters(target, fps), "nv")
}

/// Resample `input` to the common format.
pub fn normalize_audio(graph: &mut FilterGraph, input: Pad) -> Pad {
    graph.chain(
        vec![input],
        vec![audio_format(), Filter::new("asetpts").arg("PTS-STARTPTS")],
        "na",
    )
}

/// Generated silence of `duration` seconds.
pub fn silence(graph: &mut FilterGraph, duration: f64) -> Pad {
    graph.chain(
        vec![],
        vec![
            Filter::new("anullsrc")
                .opt("r", AUDIO_SAMPLE_RATE)
                .opt("cl", AUDIO_LAYOUT),
            Filter::new("atrim").num("end", duration),
        ],
        "sil",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterbox_chain() {
        let mut graph = FilterGraph::new();
        let out = normalize_video(&mut graph, Pad::video(1), Resolution::new(1280, 720), 30);
        assert_eq!(
            graph.to_filter_complex(),
            format!(
                "[1:v]scale=w=1280:h=720:force_original_aspect_ratio=decrease,\
                 pad=w=1280:h=720:x=(ow-iw)/2:y=(oh-ih)/2,setsar=1,fps=30,format=yuv420p{}",
                out
            )
        );
    }

    #[test]
    fn test_silence_is_a_source_chain() {
        let mut graph = FilterGraph::new();
        silence(&mut graph, 2.5);
        let text = graph.to_filter_complex();
        assert!(text.starts_with("anullsrc=r=44100:cl=stereo,atrim=end=2.5["));
    }
}
