use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blockreel_api::config::{LogFormat, ServerConfig};
use blockreel_api::router::build_app_router;
use blockreel_api::state::AppState;
use blockreel_comfyui::ComfyUIRenderer;
use blockreel_core::ffmpeg;
use blockreel_pipeline::{FfmpegEncoder, GenerationContext, RenderGate};
use blockreel_store::JobStore;

const DEFAULT_LOG_FILTER: &str = "blockreel_api=debug,blockreel_pipeline=debug,tower_http=debug";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Job store ---
    let store = JobStore::new(&config.output_dir);
    store
        .ensure_root()
        .await
        .expect("Failed to create output directory");
    tracing::info!(output_dir = %config.output_dir.display(), "Job store ready");

    if let Err(e) = ffmpeg::check_available(&config.ffmpeg_path).await {
        tracing::warn!(ffmpeg = %config.ffmpeg_path, error = %e, "ffmpeg not available; jobs will fail");
    }

    // --- Model backend ---
    let generation = match ComfyUIRenderer::connect(config.comfyui()).await {
        Ok(renderer) => {
            tracing::info!(
                comfyui_url = %config.comfyui_url,
                checkpoint = renderer.checkpoint(),
                "Model backend connected",
            );
            Some(GenerationContext {
                store: store.clone(),
                renderer: Arc::new(renderer),
                encoder: Arc::new(FfmpegEncoder::new(config.ffmpeg_path.clone())),
                gate: RenderGate::new(config.max_concurrent_renders),
            })
        }
        Err(e) => {
            tracing::error!(
                comfyui_url = %config.comfyui_url,
                error = %e,
                "Model backend unavailable; generation requests will be refused",
            );
            None
        }
    };

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        generation,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete; in-flight jobs are abandoned");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
