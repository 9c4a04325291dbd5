use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when no model backend is connected.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether generation requests are accepted.
    pub model_available: bool,
}

/// GET /health -- returns service and model backend health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_available = state.model_available();

    let status = if model_available { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        model_available,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
