//! Handlers for job submission, status polling, and video download.
//!
//! Routes:
//! - `GET  /`                    info page
//! - `POST /generate`            submit a job
//! - `GET  /status/{job_id}`     job status, progress, and file listing
//! - `GET  /download/{job_id}`   finished MP4

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use blockreel_core::error::CoreError;
use blockreel_core::generation::GenerationRequest;
use blockreel_pipeline::spawn_job;
use blockreel_store::{JobSnapshot, StoreError};
use serde::Serialize;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Response to a successful submission.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub job_id: String,
    pub status_url: String,
    pub download_url: String,
    pub estimated_time_minutes: u64,
}

/// Response to a status query. Only `job_id` and `exists` are present for
/// an unknown job.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub job_id: String,
    pub exists: bool,
    #[serde(flatten)]
    pub snapshot: Option<JobSnapshot>,
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>blockreel</title></head>
<body>
<h1>blockreel</h1>
<p>Blocky prompt-to-video generation.</p>
<ul>
<li><code>POST /generate</code> submit a job</li>
<li><code>GET /status/{job_id}</code> job status and progress</li>
<li><code>GET /download/{job_id}</code> download the finished video</li>
<li><code>GET /health</code> service health</li>
</ul>
</body>
</html>
"#;

/// GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// POST /generate
///
/// Creates the job directory and starts the worker in the background.
/// Returns before any frame is rendered.
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> AppResult<Json<GenerateResponse>> {
    let Some(ctx) = state.generation.clone() else {
        return Err(CoreError::Unavailable("Model not loaded".into()).into());
    };

    let Json(input) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let params = input.validate()?;
    let estimated_time_minutes = params.estimated_time_minutes();

    let meta = state.store.create(params).await?;
    tracing::info!(
        job_id = %meta.job_id,
        total_frames = meta.total_frames,
        "Job submitted",
    );

    spawn_job(ctx, meta.job_id.clone());

    Ok(Json(GenerateResponse {
        status_url: format!("/status/{}", meta.job_id),
        download_url: format!("/download/{}", meta.job_id),
        job_id: meta.job_id,
        estimated_time_minutes,
    }))
}

/// GET /status/{job_id}
pub async fn status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<StatusResponse>> {
    let snapshot = state.store.snapshot(&job_id).await?;

    Ok(Json(StatusResponse {
        job_id,
        exists: snapshot.is_some(),
        snapshot,
    }))
}

/// GET /download/{job_id}
///
/// Streams `output.mp4` as an attachment; 404 until the video exists.
pub async fn download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Response> {
    let path = state
        .store
        .output_file(&job_id)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "Video",
            id: job_id.clone(),
        })?;

    let file = tokio::fs::File::open(&path).await.map_err(StoreError::from)?;
    let len = file.metadata().await.map_err(StoreError::from)?.len();

    let headers = [
        (header::CONTENT_TYPE, "video/mp4".to_string()),
        (header::CONTENT_LENGTH, len.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"blockreel_{job_id}.mp4\""),
        ),
    ];

    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}
