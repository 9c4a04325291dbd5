//! Generation request validation, defaults, and frame scheduling helpers.
//!
//! A [`GenerationRequest`] is what callers send; [`GenerationRequest::validate`]
//! turns it into [`GenerationParams`], which is what the job store persists
//! and the worker consumes.

use std::ops::Range;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_LENGTH_SECONDS: i64 = 20;
pub const DEFAULT_FPS: i64 = 8;
pub const DEFAULT_WIDTH: i64 = 512;
pub const DEFAULT_HEIGHT: i64 = 512;
pub const DEFAULT_INFERENCE_STEPS: i64 = 20;

/// Width and height must be multiples of this (latent space downsampling).
pub const DIMENSION_MULTIPLE: i64 = 8;

/// Frames rendered between device memory releases.
pub const BATCH_SIZE: u64 = 4;

/// Stylistic qualifier prefixed to every user prompt.
pub const STYLE_PREFIX: &str = "minecraft style, voxel art, blocky, pixelated, ";

/// Rough throughput used for the submit-time estimate (frames per minute).
const ESTIMATE_FRAMES_PER_MINUTE: u64 = 10;

fn default_length_seconds() -> i64 {
    DEFAULT_LENGTH_SECONDS
}

fn default_fps() -> i64 {
    DEFAULT_FPS
}

fn default_width() -> i64 {
    DEFAULT_WIDTH
}

fn default_height() -> i64 {
    DEFAULT_HEIGHT
}

fn default_steps() -> i64 {
    DEFAULT_INFERENCE_STEPS
}

// ---------------------------------------------------------------------------
// Request / params
// ---------------------------------------------------------------------------

/// Unvalidated generation request as received from a caller.
///
/// Numeric fields are signed so that zero and negative values reach
/// [`validate`](Self::validate) and are reported as validation errors
/// instead of deserialization failures.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default = "default_length_seconds")]
    pub length_seconds: i64,
    #[serde(default = "default_fps")]
    pub fps: i64,
    #[serde(default = "default_width")]
    pub width: i64,
    #[serde(default = "default_height")]
    pub height: i64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_steps")]
    pub num_inference_steps: i64,
}

/// Validated generation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub prompt: String,
    pub length_seconds: u32,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub seed: Option<u64>,
    pub num_inference_steps: u32,
}

impl GenerationRequest {
    /// A request with every optional field at its default.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            length_seconds: DEFAULT_LENGTH_SECONDS,
            fps: DEFAULT_FPS,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            seed: None,
            num_inference_steps: DEFAULT_INFERENCE_STEPS,
        }
    }

    /// Check timing, dimensions, and prompt, producing [`GenerationParams`].
    pub fn validate(&self) -> Result<GenerationParams, CoreError> {
        if self.length_seconds <= 0 || self.fps <= 0 {
            return Err(CoreError::Validation(
                "length_seconds and fps must be > 0".into(),
            ));
        }
        if self.width % DIMENSION_MULTIPLE != 0 || self.height % DIMENSION_MULTIPLE != 0 {
            return Err(CoreError::Validation(format!(
                "width/height should be multiples of {DIMENSION_MULTIPLE}"
            )));
        }
        if self.width <= 0 || self.height <= 0 {
            return Err(CoreError::Validation("width and height must be > 0".into()));
        }
        if self.num_inference_steps <= 0 {
            return Err(CoreError::Validation(
                "num_inference_steps must be > 0".into(),
            ));
        }
        if self.prompt.trim().is_empty() {
            return Err(CoreError::Validation("prompt must not be empty".into()));
        }

        Ok(GenerationParams {
            prompt: self.prompt.clone(),
            length_seconds: to_u32("length_seconds", self.length_seconds)?,
            fps: to_u32("fps", self.fps)?,
            width: to_u32("width", self.width)?,
            height: to_u32("height", self.height)?,
            seed: self.seed,
            num_inference_steps: to_u32("num_inference_steps", self.num_inference_steps)?,
        })
    }
}

fn to_u32(field: &str, value: i64) -> Result<u32, CoreError> {
    u32::try_from(value)
        .map_err(|_| CoreError::Validation(format!("{field} is too large: {value}")))
}

impl GenerationParams {
    /// Total number of frames: `length_seconds * fps`.
    pub fn total_frames(&self) -> u64 {
        u64::from(self.length_seconds) * u64::from(self.fps)
    }

    /// Whole minutes the job is expected to take, as reported at submit time.
    pub fn estimated_time_minutes(&self) -> u64 {
        self.total_frames() / ESTIMATE_FRAMES_PER_MINUTE
    }
}

// ---------------------------------------------------------------------------
// Prompt / seed / batch helpers
// ---------------------------------------------------------------------------

/// Prefix the user prompt with [`STYLE_PREFIX`].
pub fn style_prompt(prompt: &str) -> String {
    format!("{STYLE_PREFIX}{prompt}")
}

/// The caller's seed, or a fresh draw from the full 32-bit range.
pub fn resolve_base_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| u64::from(rand::rng().random::<u32>()))
}

/// Seed used for frame `index`: `base_seed + index`.
///
/// Wraps on overflow so seeds near `u64::MAX` stay deterministic.
pub fn frame_seed(base_seed: u64, index: u64) -> u64 {
    base_seed.wrapping_add(index)
}

/// Split `[0, total_frames)` into consecutive ranges of at most `batch_size`.
pub fn frame_batches(total_frames: u64, batch_size: u64) -> impl Iterator<Item = Range<u64>> {
    let batch_size = batch_size.max(1);
    (0..total_frames)
        .step_by(batch_size as usize)
        .map(move |start| start..(start + batch_size).min(total_frames))
}

/// Fraction of the video elapsed at frame `index`, in `[0, 1)`.
pub fn temporal_fraction(index: u64, total_frames: u64) -> f64 {
    if total_frames == 0 {
        return 0.0;
    }
    index as f64 / total_frames as f64
}
