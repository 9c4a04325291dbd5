//! Filesystem-backed job store.
//!
//! Each job owns one directory under the store root, keyed by its id:
//!
//! ```text
//! <root>/<job_id>/
//!   meta.json       generation parameters + derived total_frames
//!   status.txt      current JobStatus
//!   progress.json   latest ProgressRecord (optional)
//!   error.txt       free-text diagnostic (optional)
//!   frames/         rendered frames (removed after a successful encode)
//!   output.mp4      final video
//! ```
//!
//! The API creates the directory and then only reads it. Everything after
//! creation is written by the job's single worker through [`JobDir`].

pub mod job_dir;
pub mod models;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use blockreel_core::error::CoreError;
use blockreel_core::generation::GenerationParams;
use blockreel_core::status::JobStatus;
use blockreel_core::types::{is_valid_job_id, new_job_id, JobId};

pub use job_dir::JobDir;
pub use models::{JobMeta, JobSnapshot};

pub const META_FILE: &str = "meta.json";
pub const STATUS_FILE: &str = "status.txt";
pub const PROGRESS_FILE: &str = "progress.json";
pub const ERROR_FILE: &str = "error.txt";
pub const FRAMES_DIR: &str = "frames";
pub const OUTPUT_FILE: &str = "output.mp4";
/// Where the encoder writes before the video is published as [`OUTPUT_FILE`].
pub const PARTIAL_OUTPUT_FILE: &str = ".output.mp4.tmp";

/// Status reported when the marker file is missing.
pub const UNKNOWN_STATUS: &str = "unknown";

/// Attempts at finding an unused id before giving up.
const MAX_ID_ATTEMPTS: usize = 5;

/// Errors from the job store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Root of all job directories.
#[derive(Debug, Clone)]
pub struct JobStore {
    root: PathBuf,
}

impl JobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Directory path for `job_id`, or `None` if the id is not a safe name.
    pub fn job_path(&self, job_id: &str) -> Option<PathBuf> {
        is_valid_job_id(job_id).then(|| self.root.join(job_id))
    }

    /// Create a new job: fresh id, `meta.json`, and a `starting` status marker.
    pub async fn create(&self, params: GenerationParams) -> Result<JobMeta, StoreError> {
        self.ensure_root().await?;

        let (job_id, path) = self.reserve_dir().await?;
        let meta = JobMeta::new(job_id, params);

        job_dir::write_atomic(&path.join(META_FILE), &serde_json::to_vec_pretty(&meta)?).await?;
        job_dir::write_atomic(&path.join(STATUS_FILE), JobStatus::Starting.as_str().as_bytes())
            .await?;

        tracing::debug!(job_id = %meta.job_id, total_frames = meta.total_frames, "Job directory created");
        Ok(meta)
    }

    /// Create a directory under a fresh, previously unused id.
    async fn reserve_dir(&self) -> Result<(JobId, PathBuf), StoreError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let job_id = new_job_id();
            let path = self.root.join(&job_id);
            match tokio::fs::create_dir(&path).await {
                Ok(()) => return Ok((job_id, path)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(CoreError::Internal("could not allocate a unique job id".into()).into())
    }

    /// Open an existing job directory for writing by its worker.
    pub async fn open(&self, job_id: &str) -> Result<JobDir, StoreError> {
        let path = self.job_path(job_id).ok_or_else(|| not_found(job_id))?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(not_found(job_id).into());
        }
        JobDir::load(job_id.to_string(), path).await
    }

    /// Read-only snapshot of a job, or `None` if the job does not exist.
    pub async fn snapshot(&self, job_id: &str) -> Result<Option<JobSnapshot>, StoreError> {
        let Some(path) = self.job_path(job_id) else {
            return Ok(None);
        };
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }

        let ready = tokio::fs::try_exists(path.join(OUTPUT_FILE)).await?;
        let error_message = read_optional(&path.join(ERROR_FILE)).await?;
        let status = read_optional(&path.join(STATUS_FILE))
            .await?
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| UNKNOWN_STATUS.to_string());
        let progress = read_progress_map(&path.join(PROGRESS_FILE)).await;
        let files = list_files(&path).await?;

        Ok(Some(JobSnapshot {
            ready,
            error: error_message.is_some(),
            error_message,
            status,
            progress,
            files,
        }))
    }

    /// Path of the finished video, or `None` if it has not been produced.
    pub async fn output_file(&self, job_id: &str) -> Result<Option<PathBuf>, StoreError> {
        let Some(path) = self.job_path(job_id) else {
            return Ok(None);
        };
        let output = path.join(OUTPUT_FILE);
        if tokio::fs::try_exists(&output).await? {
            Ok(Some(output))
        } else {
            Ok(None)
        }
    }
}

fn not_found(job_id: &str) -> CoreError {
    CoreError::NotFound {
        entity: "Job",
        id: job_id.to_string(),
    }
}

/// Read a text file, mapping "not found" to `None`.
async fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read the progress record as a loose JSON object.
///
/// A missing, unreadable, or malformed file yields an empty map; status
/// polling must never fail because of a half-written progress record.
async fn read_progress_map(path: &Path) -> serde_json::Map<String, serde_json::Value> {
    let Ok(bytes) = tokio::fs::read(path).await else {
        return serde_json::Map::new();
    };
    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            tracing::debug!(path = %path.display(), "Ignoring malformed progress record");
            serde_json::Map::new()
        }
    }
}

/// Sorted entry names of `dir`, skipping in-progress temp files.
async fn list_files(dir: &Path) -> Result<Vec<String>, StoreError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use blockreel_core::generation::GenerationRequest;
    use blockreel_core::progress::ProgressRecord;

    use super::*;

    fn castle_params() -> GenerationParams {
        let mut req = GenerationRequest::with_prompt("castle");
        req.length_seconds = 4;
        req.fps = 2;
        req.validate().unwrap()
    }

    #[tokio::test]
    async fn create_writes_meta_and_starting_status() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = JobStore::new(dir.path().join("outputs"));

        let meta = store.create(castle_params()).await.unwrap();
        assert_eq!(meta.total_frames, 8);

        let job_path = store.job_path(&meta.job_id).unwrap();
        let status = tokio::fs::read_to_string(job_path.join(STATUS_FILE)).await.unwrap();
        assert_eq!(status, "starting");

        let raw = tokio::fs::read(job_path.join(META_FILE)).await.unwrap();
        let stored: JobMeta = serde_json::from_slice(&raw).unwrap();
        assert_eq!(stored, meta);
        assert_eq!(stored.params.prompt, "castle");
    }

    #[tokio::test]
    async fn create_assigns_distinct_ids() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = JobStore::new(dir.path());
        let a = store.create(castle_params()).await.unwrap();
        let b = store.create(castle_params()).await.unwrap();
        assert_ne!(a.job_id, b.job_id);
    }

    #[tokio::test]
    async fn snapshot_of_missing_job_is_none() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = JobStore::new(dir.path());
        assert!(store.snapshot("doesnotexist").await.unwrap().is_none());
        assert!(store.snapshot("../escape").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshot_of_fresh_job() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = JobStore::new(dir.path());
        let meta = store.create(castle_params()).await.unwrap();

        let snap = store.snapshot(&meta.job_id).await.unwrap().unwrap();
        assert!(!snap.ready);
        assert!(!snap.error);
        assert_eq!(snap.status, "starting");
        assert!(snap.progress.is_empty());
        assert_eq!(snap.files, vec![META_FILE.to_string(), STATUS_FILE.to_string()]);
    }

    #[tokio::test]
    async fn snapshot_tolerates_malformed_progress() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = JobStore::new(dir.path());
        let meta = store.create(castle_params()).await.unwrap();
        let path = store.job_path(&meta.job_id).unwrap();

        tokio::fs::write(path.join(PROGRESS_FILE), b"{not json").await.unwrap();
        let snap = store.snapshot(&meta.job_id).await.unwrap().unwrap();
        assert!(snap.progress.is_empty());

        tokio::fs::write(path.join(PROGRESS_FILE), b"[1, 2, 3]").await.unwrap();
        let snap = store.snapshot(&meta.job_id).await.unwrap().unwrap();
        assert!(snap.progress.is_empty());
    }

    #[tokio::test]
    async fn snapshot_reports_progress_and_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = JobStore::new(dir.path());
        let meta = store.create(castle_params()).await.unwrap();

        let mut job = store.open(&meta.job_id).await.unwrap();
        job.write_progress(&ProgressRecord::rendering(3, 8)).await.unwrap();
        job.fail("Generation failed: boom").await.unwrap();

        let snap = store.snapshot(&meta.job_id).await.unwrap().unwrap();
        assert!(snap.error);
        assert_eq!(snap.error_message.as_deref(), Some("Generation failed: boom"));
        assert_eq!(snap.status, "error");
        assert_eq!(snap.progress["frames_generated"], 3);
        assert_eq!(snap.progress["progress_percent"], 37.5);
    }

    #[tokio::test]
    async fn unknown_status_when_marker_missing() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = JobStore::new(dir.path());
        let meta = store.create(castle_params()).await.unwrap();
        let path = store.job_path(&meta.job_id).unwrap();
        tokio::fs::remove_file(path.join(STATUS_FILE)).await.unwrap();

        let snap = store.snapshot(&meta.job_id).await.unwrap().unwrap();
        assert_eq!(snap.status, UNKNOWN_STATUS);
    }

    #[tokio::test]
    async fn output_file_appears_only_once_written() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = JobStore::new(dir.path());
        let meta = store.create(castle_params()).await.unwrap();
        assert!(store.output_file(&meta.job_id).await.unwrap().is_none());

        let job = store.open(&meta.job_id).await.unwrap();
        tokio::fs::write(job.output_path(), b"mp4").await.unwrap();
        let output = store.output_file(&meta.job_id).await.unwrap().unwrap();
        assert_eq!(output, job.output_path());

        let snap = store.snapshot(&meta.job_id).await.unwrap().unwrap();
        assert!(snap.ready);
    }

    #[tokio::test]
    async fn open_missing_job_is_not_found() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = JobStore::new(dir.path());
        assert_matches!(
            store.open("abc123").await,
            Err(StoreError::Core(CoreError::NotFound { .. }))
        );
        assert_matches!(
            store.open("../abc").await,
            Err(StoreError::Core(CoreError::NotFound { .. }))
        );
    }
}
