//! Per-job generation loop.
//!
//! [`spawn_job`] runs [`run_job`] on a background task. The job walks the
//! status machine forward, renders frames in batches through the shared
//! renderer, then assembles the video. Frame failures are logged and
//! skipped; anything else ends the job in `error` with a diagnostic in the
//! error marker.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};

use blockreel_core::generation::{
    frame_batches, frame_seed, resolve_base_seed, style_prompt, temporal_fraction, BATCH_SIZE,
};
use blockreel_core::progress::ProgressRecord;
use blockreel_core::render::{ImageRenderer, RenderError, RenderRequest};
use blockreel_core::scene::{scene_prompts, select_scene_prompt};
use blockreel_core::status::JobStatus;
use blockreel_core::types::JobId;
use blockreel_store::job_dir::JobDir;
use blockreel_store::{JobStore, StoreError};

use crate::encoder::{EncodeJob, VideoEncoder};
use crate::error::PipelineError;
use crate::gate::RenderGate;

/// Everything a job needs, shared by all jobs of one server.
#[derive(Clone)]
pub struct GenerationContext {
    pub store: JobStore,
    pub renderer: Arc<dyn ImageRenderer>,
    pub encoder: Arc<dyn VideoEncoder>,
    pub gate: RenderGate,
}

/// Why a single frame was skipped.
#[derive(Debug, thiserror::Error)]
enum FrameError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("rendered bytes are not an image: {0}")]
    Decode(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Run `job_id` on a background task.
///
/// A panic inside the job is caught here and recorded as a job failure.
pub fn spawn_job(ctx: GenerationContext, job_id: JobId) -> JoinHandle<()> {
    tokio::spawn(async move {
        let inner = tokio::spawn(run_job(ctx.clone(), job_id.clone()));
        if let Err(join_err) = inner.await {
            let err = PipelineError::Panicked(panic_reason(join_err));
            tracing::error!(job_id = %job_id, error = %err, "Generation task aborted");
            match ctx.store.open(&job_id).await {
                Ok(mut job) => record_failure(&mut job, &err).await,
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to reopen job after panic");
                }
            }
        }
    })
}

/// Run a job to completion. Never returns an error: failures are written
/// into the job directory.
pub async fn run_job(ctx: GenerationContext, job_id: JobId) {
    let mut job = match ctx.store.open(&job_id).await {
        Ok(job) => job,
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Failed to open job directory");
            return;
        }
    };

    match generate(&ctx, &mut job).await {
        Ok(()) => tracing::info!(job_id = %job_id, "Video generation completed"),
        Err(e) => record_failure(&mut job, &e).await,
    }
}

async fn record_failure(job: &mut JobDir, err: &PipelineError) {
    let diagnostic = err.diagnostic();
    tracing::error!(job_id = %job.job_id(), error = %diagnostic, "Video generation failed");
    if let Err(e) = job.fail(&diagnostic).await {
        tracing::error!(job_id = %job.job_id(), error = %e, "Failed to record job failure");
    }
}

fn panic_reason(err: JoinError) -> String {
    if err.is_cancelled() {
        return "task was cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Job steps
// ---------------------------------------------------------------------------

async fn generate(ctx: &GenerationContext, job: &mut JobDir) -> Result<(), PipelineError> {
    let meta = job.read_meta().await?;
    let params = &meta.params;
    let total = meta.total_frames;

    job.set_status(JobStatus::CheckingFfmpeg).await?;
    ctx.encoder
        .check_available()
        .await
        .map_err(PipelineError::EncoderUnavailable)?;

    job.set_status(JobStatus::Initializing).await?;
    let base_seed = resolve_base_seed(params.seed);
    let prompt = style_prompt(&params.prompt);
    tracing::info!(
        job_id = %meta.job_id,
        total_frames = total,
        length_seconds = params.length_seconds,
        fps = params.fps,
        base_seed,
        "Generating frames",
    );

    job.set_status(JobStatus::GeneratingFrames).await?;
    job.create_frames_dir().await?;

    let mut frames = Vec::new();
    for batch in frame_batches(total, BATCH_SIZE) {
        let scene_progress = temporal_fraction(batch.start, total);
        let prompts = scene_prompts(&prompt);
        tracing::debug!(
            job_id = %meta.job_id,
            batch_start = batch.start,
            batch_end = batch.end,
            scene_progress,
            "Generating batch",
        );

        for index in batch {
            let request = RenderRequest {
                prompt: select_scene_prompt(&prompts, temporal_fraction(index, total)).to_string(),
                width: params.width,
                height: params.height,
                steps: params.num_inference_steps,
                seed: frame_seed(base_seed, index),
            };

            let rendered = {
                let _permit = ctx.gate.acquire().await?;
                ctx.renderer.render(&request).await
            };

            match store_frame(job, index, rendered).await {
                Ok(path) => {
                    frames.push(path);
                    tracing::info!(job_id = %meta.job_id, frame = index + 1, total_frames = total, "Generated frame");
                    if let Err(e) = job.write_progress(&ProgressRecord::rendering(index + 1, total)).await {
                        tracing::warn!(job_id = %meta.job_id, frame = index, error = %e, "Failed to write progress");
                    }
                }
                Err(e) => {
                    tracing::warn!(job_id = %meta.job_id, frame = index, error = %e, "Skipping frame");
                }
            }
        }

        if let Err(e) = ctx.renderer.release_memory().await {
            tracing::warn!(job_id = %meta.job_id, error = %e, "Failed to release model memory");
        }
    }

    job.set_status(JobStatus::AssemblingVideo).await?;
    if frames.is_empty() {
        return Err(PipelineError::NoFrames);
    }

    let encode = EncodeJob {
        frames_dir: job.frames_dir(),
        frames,
        fps: params.fps,
        output: job.partial_output_path(),
    };
    if let Err(e) = ctx.encoder.encode(&encode).await {
        if let Err(cleanup) = job.discard_partial_output().await {
            tracing::warn!(job_id = %meta.job_id, error = %cleanup, "Failed to remove partial video");
        }
        return Err(PipelineError::Encode(e));
    }
    job.publish_output().await?;

    job.remove_frames().await?;
    job.set_status(JobStatus::Completed).await?;
    job.write_progress(&ProgressRecord::completed(total)).await?;
    Ok(())
}

/// Check that the rendered bytes decode as an image, then persist them.
async fn store_frame(
    job: &JobDir,
    index: u64,
    rendered: Result<Vec<u8>, RenderError>,
) -> Result<PathBuf, FrameError> {
    let bytes = rendered?;
    let (width, height) = image::ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|e| FrameError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| FrameError::Decode(e.to_string()))?;
    tracing::trace!(job_id = %job.job_id(), frame = index, width, height, "Frame decoded");

    Ok(job.write_frame(index, &bytes).await?)
}
