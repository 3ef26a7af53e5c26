//! Virtual-clock context for simulated workers.

use async_trait::async_trait;
use life_env::LifeContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// `LifeContext` whose clock only moves when the harness moves it.
///
/// Clones share one clock, so the world and every worker agree on the
/// time. `sleep` returns immediately after advancing the clock.
#[derive(Debug, Clone)]
pub struct SimContext {
    seed: u64,
    elapsed_ns: Arc<AtomicU64>,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            elapsed_ns: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Moves the clock forward by `duration`.
    pub fn advance_time(&self, duration: Duration) {
        self.elapsed_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Virtual nanoseconds since the start of the run.
    pub fn time_ns(&self) -> u64 {
        self.elapsed_ns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LifeContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    async fn sleep(&self, duration: Duration) {
        self.advance_time(duration);
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_only_moves_when_advanced() {
        let ctx = SimContext::new(3);
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_millis(40));
        ctx.advance_time(Duration::from_millis(60));
        assert_eq!(ctx.time_ns(), 100_000_000);
        assert_eq!(ctx.seed(), 3);
    }

    #[tokio::test]
    async fn test_sleep_is_instant_and_advances() {
        let ctx = SimContext::new(7);
        ctx.sleep(Duration::from_secs(3600)).await;
        assert_eq!(ctx.now(), Duration::from_secs(3600));
    }

    #[test]
    fn test_clones_share_one_clock() {
        let world = SimContext::new(1);
        let worker = world.clone();

        world.advance_time(Duration::from_secs(2));
        assert_eq!(worker.now(), Duration::from_secs(2));
    }
}
