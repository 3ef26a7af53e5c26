//! Clock abstraction for Life workers.

use async_trait::async_trait;
use std::time::Duration;

/// Everything a worker needs from its host besides the transport.
///
/// A worker never reads the OS clock or sleeps on tokio directly, so the
/// same pipeline runs unchanged on a real runtime and inside the lock-step
/// simulator.
///
/// # Implementations
///
/// - `TokioContext`: OS clock, `tokio::time::sleep`
/// - `SimContext` (life_sim): virtual clock moved by the harness
#[async_trait]
pub trait LifeContext: Send + Sync + 'static {
    /// Time elapsed since the context was created. Drives tick pacing.
    fn now(&self) -> Duration;

    /// Waits out the rest of a tick frame. The simulator advances its
    /// clock instead of blocking.
    async fn sleep(&self, duration: Duration);

    /// Seed the run is reproducible from; 0 outside simulation. Logged at
    /// worker start-up.
    fn seed(&self) -> u64;
}
