//! Transport abstraction between a Life worker and the deployment runtime.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{OutboundUpdate, TransportOp, WorkerId};
use std::time::Duration;

/// Abstraction for the publish/subscribe channel a worker is attached to.
///
/// # Implementations
///
/// - **Production**: wraps the deployment runtime's connection
/// - **Simulation**: channel-based with per-worker delivery latency
///
/// # Op Flow
///
/// ```text
/// Worker A                   Runtime                    Worker B
///   |                           |                          |
///   |-- send(update) ---------->|                          |
///   |                           |-- [latency] ------------>|
///   |                           |                          |-- poll_ops() -> [CellUpdated]
///   |<-- [echo] ----------------|                          |
/// ```
///
/// Delivery is reliable and ordered per worker, but may lag arbitrarily.
#[async_trait]
pub trait WorkerTransport: Send + Sync + 'static {
    /// Drains every op that is currently pending, in arrival order.
    ///
    /// If nothing is pending, waits at most `max_wait` for the first op to
    /// arrive. Returns an empty list when the wait expires.
    async fn poll_ops(&self, max_wait: Duration) -> Vec<TransportOp>;

    /// Queues an outbound field update.
    ///
    /// # Returns
    /// * `Ok(())` - Update queued for the runtime
    /// * `Err(EnvError::TransportClosed)` - The runtime is gone
    async fn send(&self, update: OutboundUpdate) -> Result<(), EnvError>;

    /// Returns this worker's ID.
    fn worker_id(&self) -> WorkerId;
}

/// Control surface over delivery latency in simulation.
pub trait LatencyController: Send + Sync {
    /// Sets how many ticks ops take to reach `worker`.
    fn set_worker_latency(&mut self, worker: WorkerId, ticks: u64);

    /// Returns the configured latency for `worker` (default 0).
    fn worker_latency(&self, worker: WorkerId) -> u64;
}
