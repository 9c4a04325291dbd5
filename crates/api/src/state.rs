use std::sync::Arc;

use blockreel_pipeline::GenerationContext;
use blockreel_store::JobStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Job directories under `OUTPUT_DIR`.
    pub store: JobStore,
    /// Renderer, encoder, and render gate. `None` when the model backend
    /// could not be reached at startup; generation requests are refused.
    pub generation: Option<GenerationContext>,
}

impl AppState {
    pub fn model_available(&self) -> bool {
        self.generation.is_some()
    }
}
