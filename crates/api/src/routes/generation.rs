use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Job routes, mounted at the root.
///
/// ```text
/// /                      info page
/// /generate              submit a job (POST)
/// /status/{job_id}       job status and progress
/// /download/{job_id}     finished video
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(generation::index))
        .route("/generate", post(generation::generate))
        .route("/status/{job_id}", get(generation::status))
        .route("/download/{job_id}", get(generation::download))
}
