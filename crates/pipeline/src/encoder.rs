//! The video encoder seam and its ffmpeg implementation.

use std::path::PathBuf;

use async_trait::async_trait;

use blockreel_core::ffmpeg::{self, FfmpegError};

/// Everything the encoder needs to assemble one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeJob {
    pub frames_dir: PathBuf,
    /// Frames actually written, in index order. Skipped indices are absent.
    pub frames: Vec<PathBuf>,
    pub fps: u32,
    pub output: PathBuf,
}

#[async_trait]
pub trait VideoEncoder: Send + Sync {
    /// Fails if the encoder cannot be run at all.
    async fn check_available(&self) -> Result<(), FfmpegError>;

    async fn encode(&self, job: &EncodeJob) -> Result<(), FfmpegError>;
}

/// Encodes with an external `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg_path: String,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn check_available(&self) -> Result<(), FfmpegError> {
        ffmpeg::check_available(&self.ffmpeg_path).await
    }

    async fn encode(&self, job: &EncodeJob) -> Result<(), FfmpegError> {
        tracing::info!(
            ffmpeg = %self.ffmpeg_path,
            frames = job.frames.len(),
            fps = job.fps,
            output = %job.output.display(),
            "Running ffmpeg",
        );
        ffmpeg::encode_frames(&self.ffmpeg_path, &job.frames_dir, job.fps, &job.output).await
    }
}
