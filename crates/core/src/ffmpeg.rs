//! FFmpeg command utilities for assembling frame sequences into video.

use std::path::Path;
use std::process::Stdio;

/// Glob matching the frame files written by the worker.
pub const FRAME_GLOB: &str = "frame_*.png";

/// Constant rate factor passed to libx264.
pub const DEFAULT_CRF: u8 = 18;

/// Error type for FFmpeg operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// File name of frame `index` inside a job's frames directory.
pub fn frame_file_name(index: u64) -> String {
    format!("frame_{index:06}.png")
}

/// Check that the ffmpeg binary at `ffmpeg` can be spawned.
///
/// Runs `{ffmpeg} -version`. Only a failure to spawn counts as missing; the
/// exit status is not inspected.
pub async fn check_available(ffmpeg: &str) -> Result<(), FfmpegError> {
    tokio::process::Command::new(ffmpeg)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(FfmpegError::NotFound)?;
    Ok(())
}

/// Build the argument list that encodes every `frame_*.png` in the working
/// directory into an H.264 MP4 at `output`.
///
/// A glob input is used rather than a `%06d` sequence: the image2 sequence
/// reader stops at the first missing index, which would drop every frame
/// after a skipped one. The pattern is relative so metacharacters in the
/// job directory path are never expanded. The muxer is named explicitly
/// because `output` may not end in `.mp4`.
pub fn build_encode_args(fps: u32, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-framerate".into(),
        fps.to_string(),
        "-pattern_type".into(),
        "glob".into(),
        "-i".into(),
        FRAME_GLOB.into(),
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-crf".into(),
        DEFAULT_CRF.to_string(),
        "-f".into(),
        "mp4".into(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Encode the frames in `frames_dir` into `output` at `fps`.
///
/// ffmpeg runs inside `frames_dir`; a relative `output` is resolved against
/// the current directory first.
pub async fn encode_frames(
    ffmpeg: &str,
    frames_dir: &Path,
    fps: u32,
    output: &Path,
) -> Result<(), FfmpegError> {
    let output = std::path::absolute(output)?;
    let result = tokio::process::Command::new(ffmpeg)
        .args(build_encode_args(fps, &output))
        .current_dir(frames_dir)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound if !frames_dir.is_dir() => FfmpegError::IoError(e),
            _ => FfmpegError::NotFound(e),
        })?;

    if !result.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: result.status.code(),
            stderr: String::from_utf8_lossy(&result.stderr).to_string(),
        });
    }

    Ok(())
}
