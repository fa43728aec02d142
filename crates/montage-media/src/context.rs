//! Collaborators shared by every render operation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use montage_models::EncodingConfig;

use crate::command::{CommandExecutor, FfmpegRunner};
use crate::probe::{FfprobeProbe, MediaProbe};
use crate::resolver::MediaResolver;

/// Resolver, probe and encoder used by render operations, plus the encoding
/// defaults and a scratch directory for intermediates.
#[derive(Clone)]
pub struct MediaContext {
    pub resolver: Arc<dyn MediaResolver>,
    pub probe: Arc<dyn MediaProbe>,
    pub executor: Arc<dyn CommandExecutor>,
    pub encoding: EncodingConfig,
    pub scratch_dir: PathBuf,
}

impl MediaContext {
    pub fn new(
        resolver: Arc<dyn MediaResolver>,
        probe: Arc<dyn MediaProbe>,
        executor: Arc<dyn CommandExecutor>,
        encoding: EncodingConfig,
        scratch_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            resolver,
            probe,
            executor,
            encoding,
            scratch_dir: scratch_dir.as_ref().to_path_buf(),
        }
    }

    /// Context backed by the `ffprobe`/`ffmpeg` binaries.
    pub fn with_ffmpeg(
        resolver: Arc<dyn MediaResolver>,
        encoding: EncodingConfig,
        scratch_dir: impl AsRef<Path>,
        encode_timeout_secs: u64,
    ) -> Self {
        Self::new(
            resolver,
            Arc::new(FfprobeProbe),
            Arc::new(FfmpegRunner::new().with_timeout(encode_timeout_secs)),
            encoding,
            scratch_dir,
        )
    }
}

impl fmt::Debug for MediaContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaContext")
            .field("encoding", &self.encoding)
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}
