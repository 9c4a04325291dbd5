//! Generation worker for blockreel jobs.
//!
//! A job is run by [`worker::spawn_job`] on its own task: frames are rendered
//! one at a time through the shared [`RenderGate`](gate::RenderGate), written
//! into the job directory, then handed to a [`VideoEncoder`](encoder::VideoEncoder).

pub mod encoder;
pub mod error;
pub mod gate;
pub mod worker;

pub use encoder::{EncodeJob, FfmpegEncoder, VideoEncoder};
pub use error::PipelineError;
pub use gate::RenderGate;
pub use worker::{run_job, spawn_job, GenerationContext};
