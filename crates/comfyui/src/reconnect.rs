//! Exponential-backoff probing of a ComfyUI instance at startup.
//!
//! The API process calls [`connect_with_backoff`] once before it starts
//! serving. If every attempt fails the service still starts, but without
//! a model handle, and generation requests are refused.

use std::time::Duration;

use crate::api::{ComfyUIApi, ComfyUIApiError};

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: 3,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Probe `GET /system_stats` until it answers or attempts run out.
///
/// Returns the last error when every attempt failed.
pub async fn connect_with_backoff(
    api: &ComfyUIApi,
    config: &ReconnectConfig,
) -> Result<serde_json::Value, ComfyUIApiError> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match api.system_stats().await {
            Ok(stats) => {
                tracing::info!(api_url = api.api_url(), attempt, "Connected to ComfyUI");
                return Ok(stats);
            }
            Err(e) if attempt >= config.max_attempts.max(1) => {
                tracing::error!(
                    api_url = api.api_url(),
                    attempt,
                    error = %e,
                    "Giving up on ComfyUI",
                );
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    api_url = api.api_url(),
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "ComfyUI probe attempt {attempt} failed",
                );
            }
        }

        tokio::time::sleep(delay).await;
        delay = next_delay(delay, config);
    }
}
