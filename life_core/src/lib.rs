//! Life Core - generation-synchronised Game of Life across cooperating workers
//!
//! Each worker is authoritative for a disjoint subset of cells but reads
//! neighbours owned by others. This library keeps those workers in
//! lock-step with one generation of slack:
//! 1. **Cell Store**: local replica of every visible cell, with double-buffered liveness
//! 2. **Advancement Engine**: per-cell eligibility check and B3/S23 transition
//! 3. **Commit Batcher**: gates a worker's commits on the slowest neighbour it can see

pub mod advancement;
pub mod batcher;
pub mod cell_store;
pub mod config;
pub mod error;
pub mod rules;
pub mod stats;
pub mod worker;

// Re-export key types for convenience
pub use advancement::{AdvancementScan, Candidate, Eligibility, GenerationBounds, IneligibleReason};
pub use batcher::{CommitBatcher, CommitDecision};
pub use cell_store::{CellRecord, CellStore, LivenessBuffers};
pub use config::{CreationPolicy, WorkerConfig};
pub use error::{CellError, CoreError, CoreResult};
pub use rules::next_alive;
pub use stats::{TickPhase, TickReport, WorkerStats};
pub use worker::{IngestSummary, LifeWorker, Shutdown, TickOutcome};
