#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use blockreel_api::config::{LogFormat, ServerConfig};
use blockreel_api::router::build_app_router;
use blockreel_api::state::AppState;
use blockreel_core::ffmpeg::FfmpegError;
use blockreel_core::render::{ImageRenderer, RenderError, RenderRequest};
use blockreel_pipeline::{EncodeJob, GenerationContext, RenderGate, VideoEncoder};
use blockreel_store::JobStore;

/// Build a test `ServerConfig` rooted at `output_dir`.
pub fn test_config(output_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        output_dir: output_dir.to_path_buf(),
        static_dir: output_dir.join("static"),
        ffmpeg_path: "ffmpeg".to_string(),
        comfyui_url: "http://127.0.0.1:8188".to_string(),
        comfyui_ws_url: "ws://127.0.0.1:8188".to_string(),
        sd_model: "test.safetensors".to_string(),
        comfyui_connect_attempts: 1,
        max_concurrent_renders: 1,
        log_format: LogFormat::Text,
    }
}

/// Renders an 8x8 black PNG for every frame.
pub struct StubRenderer;

#[async_trait]
impl ImageRenderer for StubRenderer {
    async fn render(&self, _request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        let img = image::RgbImage::new(8, 8);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| RenderError::Failed(e.to_string()))?;
        Ok(out.into_inner())
    }
}

/// Writes a fixed byte string as the "video".
pub struct StubEncoder;

pub const FAKE_VIDEO: &[u8] = b"\x00\x00\x00\x18ftypmp42 blockreel test video";

#[async_trait]
impl VideoEncoder for StubEncoder {
    async fn check_available(&self) -> Result<(), FfmpegError> {
        Ok(())
    }

    async fn encode(&self, job: &EncodeJob) -> Result<(), FfmpegError> {
        tokio::fs::write(&job.output, FAKE_VIDEO).await?;
        Ok(())
    }
}

/// Full application router with a stub model backend.
pub fn build_test_app(output_dir: &Path) -> Router {
    let config = test_config(output_dir);
    let store = JobStore::new(output_dir);
    let generation = GenerationContext {
        store: store.clone(),
        renderer: Arc::new(StubRenderer),
        encoder: Arc::new(StubEncoder),
        gate: RenderGate::default(),
    };
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        generation: Some(generation),
    };
    build_app_router(state, &config)
}

/// Full application router with no model backend connected.
pub fn build_test_app_without_model(output_dir: &Path) -> Router {
    let config = test_config(output_dir);
    let state = AppState {
        config: Arc::new(config.clone()),
        store: JobStore::new(output_dir),
        generation: None,
    };
    build_app_router(state, &config)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Job directories currently under `output_dir`.
pub fn job_dirs(output_dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(output_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Poll `/status/{job_id}` until the job has failed, or has completed and
/// its final progress record is in place.
pub async fn wait_for_terminal(app: &Router, job_id: &str) -> serde_json::Value {
    for _ in 0..500 {
        let json = body_json(get(app.clone(), &format!("/status/{job_id}")).await).await;
        let finished = json["status"] == "completed" && json["progress"]["progress_percent"] == 100.0;
        if finished || json["status"] == "error" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not finish");
}
