//! Render gate shared by every job.
//!
//! The model backend holds one model on one device. Workers take a permit
//! for each frame, so concurrent jobs interleave frame by frame instead of
//! submitting to the backend at the same time.

use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::PipelineError;

pub const DEFAULT_RENDER_PERMITS: usize = 1;

#[derive(Debug, Clone)]
pub struct RenderGate {
    permits: Arc<Semaphore>,
}

impl RenderGate {
    /// A gate admitting `permits` renders at once (at least one).
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(permits.max(1))),
        }
    }

    /// Wait for a render slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, PipelineError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| PipelineError::GateClosed)
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for RenderGate {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_PERMITS)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn zero_permits_is_raised_to_one() {
        assert_eq!(RenderGate::new(0).available(), 1);
    }

    #[tokio::test]
    async fn second_render_waits_for_the_first() {
        let gate = RenderGate::default();
        let permit = gate.acquire().await.unwrap();

        let other = gate.clone();
        let waiting = tokio::time::timeout(Duration::from_millis(50), async move {
            other.acquire().await.map(|_| ())
        })
        .await;
        assert!(waiting.is_err(), "second acquire should block");

        drop(permit);
        assert_eq!(gate.available(), 1);
    }
}
