use blockreel_core::ffmpeg::FfmpegError;
use blockreel_store::StoreError;

/// Job-fatal failures. Per-frame failures never become one of these.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The encoder binary could not be run during the pre-flight check.
    #[error("{0}")]
    EncoderUnavailable(FfmpegError),

    /// The encoder ran but did not produce a video.
    #[error("{0}")]
    Encode(FfmpegError),

    #[error("no frames were rendered")]
    NoFrames,

    #[error("render gate closed")]
    GateClosed,

    #[error("job task panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Text written to the job's error marker.
    pub fn diagnostic(&self) -> String {
        match self {
            PipelineError::Encode(FfmpegError::ExecutionFailed { stderr, .. }) => {
                format!("FFmpeg failed: {stderr}")
            }
            PipelineError::Encode(other) => format!("FFmpeg failed: {other}"),
            other => format!("Generation failed: {other}"),
        }
    }
}
