//! Domain types and pure logic for the blockreel prompt-to-video service.
//!
//! Nothing in this crate touches the network. Filesystem access is limited
//! to the ffmpeg helpers, which shell out to the encoder binary.

pub mod error;
pub mod ffmpeg;
pub mod generation;
pub mod progress;
pub mod render;
pub mod scene;
pub mod status;
pub mod types;
