//! Records persisted in (or read back from) a job directory.

use blockreel_core::generation::GenerationParams;
use blockreel_core::types::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contents of `meta.json`.
///
/// `total_frames` is derived once at creation and read back by the worker;
/// it is never recomputed from the other fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMeta {
    pub job_id: JobId,
    #[serde(flatten)]
    pub params: GenerationParams,
    pub total_frames: u64,
    pub created_at: DateTime<Utc>,
}

impl JobMeta {
    pub fn new(job_id: JobId, params: GenerationParams) -> Self {
        let total_frames = params.total_frames();
        Self {
            job_id,
            params,
            total_frames,
            created_at: Utc::now(),
        }
    }
}

/// Read-only view of a job directory, as served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    /// Whether the output video exists.
    pub ready: bool,
    /// Whether an error marker exists.
    pub error: bool,
    /// Contents of the error marker, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Raw status marker, or `"unknown"` when missing.
    pub status: String,
    /// Latest progress record; empty when missing or unreadable.
    pub progress: serde_json::Map<String, serde_json::Value>,
    /// Sorted names of the entries in the job directory.
    pub files: Vec<String>,
}
