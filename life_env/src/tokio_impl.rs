//! `LifeContext` for real deployments, on top of tokio and the OS clock.

use crate::LifeContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wall-clock context. `now()` counts from construction.
#[derive(Debug, Clone, Copy)]
pub struct TokioContext {
    started_at: Instant,
}

impl TokioContext {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifeContext for TokioContext {
    fn now(&self) -> Duration {
        self.started_at.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }

    /// Deployments are never seeded.
    fn seed(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_moves_monotonic_clock() {
        let ctx = TokioContext::shared();
        let before = ctx.now();
        ctx.sleep(Duration::from_millis(5)).await;
        assert!(ctx.now() >= before + Duration::from_millis(5));
        assert_eq!(ctx.seed(), 0);
    }
}
