//! [`ImageRenderer`] backed by a ComfyUI instance.
//!
//! Each frame follows the same round trip: open a WebSocket under a fresh
//! client id, queue the txt2img workflow, wait for the prompt to finish,
//! then look up the output in the history and download it. The wait has no
//! deadline; a stuck backend stalls the job.

use async_trait::async_trait;

use blockreel_core::render::{ImageRenderer, RenderError, RenderRequest};

use crate::api::{ComfyUIApi, ComfyUIApiError};
use crate::client::{derive_ws_url, ComfyUIClient};
use crate::processor::wait_for_completion;
use crate::reconnect::{connect_with_backoff, ReconnectConfig};
use crate::workflow::{first_image_output, txt2img};

pub const DEFAULT_CHECKPOINT: &str = "v1-5-pruned-emaonly.safetensors";

/// Where to find ComfyUI and which checkpoint to load.
#[derive(Debug, Clone)]
pub struct ComfyUIConfig {
    pub api_url: String,
    pub ws_url: String,
    pub checkpoint: String,
    pub connect_attempts: u32,
}

impl ComfyUIConfig {
    /// Config for `api_url` with the WebSocket URL derived from it.
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into();
        Self {
            ws_url: derive_ws_url(&api_url),
            api_url,
            checkpoint: DEFAULT_CHECKPOINT.to_string(),
            connect_attempts: ReconnectConfig::default().max_attempts,
        }
    }
}

#[derive(Debug)]
pub struct ComfyUIRenderer {
    api: ComfyUIApi,
    client: ComfyUIClient,
    checkpoint: String,
}

impl ComfyUIRenderer {
    /// Probe the instance and return a renderer if it answers.
    pub async fn connect(config: ComfyUIConfig) -> Result<Self, RenderError> {
        let api = ComfyUIApi::new(config.api_url);
        let reconnect = ReconnectConfig {
            max_attempts: config.connect_attempts,
            ..Default::default()
        };

        connect_with_backoff(&api, &reconnect)
            .await
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        Ok(Self {
            api,
            client: ComfyUIClient::new(config.ws_url),
            checkpoint: config.checkpoint,
        })
    }

    pub fn checkpoint(&self) -> &str {
        &self.checkpoint
    }

    async fn render_once(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        let mut conn = self
            .client
            .connect()
            .await
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        let workflow = txt2img(request, &self.checkpoint);
        let submitted = self
            .api
            .submit_workflow(&workflow, &conn.client_id)
            .await
            .map_err(api_error)?;

        tracing::debug!(
            prompt_id = %submitted.prompt_id,
            queue_position = submitted.number,
            seed = request.seed,
            "Queued frame",
        );

        wait_for_completion(&mut conn.ws_stream, &submitted.prompt_id).await?;

        let history = self
            .api
            .get_history(&submitted.prompt_id)
            .await
            .map_err(api_error)?;
        let image = first_image_output(&history, &submitted.prompt_id).ok_or(RenderError::NoOutput)?;

        let bytes = self.api.view_image(&image).await.map_err(api_error)?;

        if let Err(e) = conn.ws_stream.close(None).await {
            tracing::trace!(error = %e, "Ignoring WebSocket close error");
        }

        Ok(bytes)
    }
}

fn api_error(e: ComfyUIApiError) -> RenderError {
    match e {
        ComfyUIApiError::Request(e) => RenderError::Unavailable(e.to_string()),
        other => RenderError::Failed(other.to_string()),
    }
}

#[async_trait]
impl ImageRenderer for ComfyUIRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        self.render_once(request).await
    }

    async fn release_memory(&self) -> Result<(), RenderError> {
        self.api.free_memory().await.map_err(api_error)
    }
}
