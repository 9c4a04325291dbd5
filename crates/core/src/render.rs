//! The model handle seam.
//!
//! [`ImageRenderer`] is the single narrow capability the worker needs from
//! the diffusion model. It is constructed once at startup and passed around
//! as `Arc<dyn ImageRenderer>`.

use async_trait::async_trait;

/// Parameters for rendering one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub seed: u64,
}

/// Errors returned by an [`ImageRenderer`].
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The model backend could not be reached.
    #[error("model backend unreachable: {0}")]
    Unavailable(String),

    /// The backend accepted the request but failed to produce an image.
    #[error("render failed: {0}")]
    Failed(String),

    /// The backend finished without returning any image output.
    #[error("render produced no image")]
    NoOutput,
}

/// A loaded generative image model.
#[async_trait]
pub trait ImageRenderer: Send + Sync {
    /// Render one image and return its encoded bytes (PNG).
    async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError>;

    /// Release transient device memory between batches.
    async fn release_memory(&self) -> Result<(), RenderError> {
        Ok(())
    }
}
