//! Writer handle for a single job directory.
//!
//! A [`JobDir`] is owned by exactly one worker. It tracks the current status
//! in memory so every transition can be checked against the state machine
//! before the marker file is rewritten.

use std::path::{Path, PathBuf};

use blockreel_core::error::CoreError;
use blockreel_core::ffmpeg::frame_file_name;
use blockreel_core::progress::ProgressRecord;
use blockreel_core::status::JobStatus;
use blockreel_core::types::JobId;

use crate::models::JobMeta;
use crate::{
    StoreError, ERROR_FILE, FRAMES_DIR, META_FILE, OUTPUT_FILE, PARTIAL_OUTPUT_FILE,
    PROGRESS_FILE, STATUS_FILE,
};

#[derive(Debug)]
pub struct JobDir {
    job_id: JobId,
    path: PathBuf,
    status: JobStatus,
}

impl JobDir {
    /// Load the handle, reading the current status marker.
    pub(crate) async fn load(job_id: JobId, path: PathBuf) -> Result<Self, StoreError> {
        let raw = tokio::fs::read_to_string(path.join(STATUS_FILE)).await?;
        let status = raw.parse::<JobStatus>()?;
        Ok(Self {
            job_id,
            path,
            status,
        })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.path.join(FRAMES_DIR)
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.frames_dir().join(frame_file_name(index))
    }

    pub fn output_path(&self) -> PathBuf {
        self.path.join(OUTPUT_FILE)
    }

    /// Encoder target. Hidden from listings and never served.
    pub fn partial_output_path(&self) -> PathBuf {
        self.path.join(PARTIAL_OUTPUT_FILE)
    }

    pub async fn read_meta(&self) -> Result<JobMeta, StoreError> {
        let raw = tokio::fs::read(self.path.join(META_FILE)).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Move to `next`, rejecting backward or post-terminal transitions.
    pub async fn set_status(&mut self, next: JobStatus) -> Result<(), StoreError> {
        let next = self.status.transition(next)?;
        write_atomic(&self.path.join(STATUS_FILE), next.as_str().as_bytes()).await?;
        tracing::debug!(job_id = %self.job_id, from = %self.status, to = %next, "Job status changed");
        self.status = next;
        Ok(())
    }

    /// Overwrite the progress record.
    pub async fn write_progress(&self, record: &ProgressRecord) -> Result<(), StoreError> {
        write_atomic(&self.path.join(PROGRESS_FILE), &serde_json::to_vec(record)?).await
    }

    /// Record `message` in the error marker and move to `error`.
    ///
    /// A job that already reached a terminal status is left untouched.
    pub async fn fail(&mut self, message: &str) -> Result<(), StoreError> {
        if self.status.is_terminal() {
            tracing::warn!(
                job_id = %self.job_id,
                status = %self.status,
                error = message,
                "Ignoring failure for job in terminal status",
            );
            return Ok(());
        }
        write_atomic(&self.path.join(ERROR_FILE), message.as_bytes()).await?;
        self.set_status(JobStatus::Error).await
    }

    pub async fn create_frames_dir(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(self.frames_dir()).await?;
        Ok(())
    }

    /// Persist frame `index` and return its path.
    pub async fn write_frame(&self, index: u64, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.frame_path(index);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Move the finished encode into place as the downloadable video.
    ///
    /// The rename is the only way `output.mp4` comes to exist, so a reader
    /// never sees a partial file.
    pub async fn publish_output(&self) -> Result<(), StoreError> {
        tokio::fs::rename(self.partial_output_path(), self.output_path()).await?;
        Ok(())
    }

    /// Drop whatever a failed encode left behind.
    pub async fn discard_partial_output(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.partial_output_path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the frames directory and everything in it.
    pub async fn remove_frames(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_dir_all(self.frames_dir()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write `bytes` to `path` via a hidden temp file and rename, so readers
/// never observe a partially written record.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| CoreError::Internal(format!("not a file path: {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
