//! ComfyUI-backed model handle.
//!
//! Provides typed WebSocket message parsing, HTTP API wrappers, startup
//! connection backoff, the txt2img workflow template, and
//! [`ComfyUIRenderer`], the production [`ImageRenderer`] implementation.
//!
//! [`ImageRenderer`]: blockreel_core::render::ImageRenderer

pub mod api;
pub mod client;
pub mod messages;
pub mod processor;
pub mod reconnect;
pub mod renderer;
pub mod workflow;

pub use renderer::{ComfyUIConfig, ComfyUIRenderer};
