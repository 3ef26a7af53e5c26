//! Life Deterministic Simulation Harness
//!
//! Runs any number of `LifeWorker`s against an in-process stand-in for the
//! publish/subscribe runtime, entirely on a virtual clock.
//!
//! # Core Principle: Lock-step Ticks
//!
//! All sources of non-determinism are controlled:
//! - **Time**: the virtual clock advances one frame per world tick
//! - **Delivery**: per-worker latency in ticks, seeded jitter, FIFO per worker
//! - **Randomness**: soups and jitter derive from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimRuntime (canonical cells, write ACL, latency)     │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │ ▲                      │ ▲                          │
//! │  ┌────▼─┴──┐              ┌────▼─┴──┐                       │
//! │  │ Worker  │              │ Worker  │     ...               │
//! │  │   #0    │              │   #1    │                       │
//! │  └─────────┘              └─────────┘                       │
//! │                                                             │
//! │  ┌───────────────────────────────────┐                      │
//! │  │            Oracle                 │                      │
//! │  │  (lock-step reference stepper)    │                      │
//! │  └───────────────────────────────────┘                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use life_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).with_generations(20).run(ScenarioId::Glider);
//! assert!(result.passed);
//! ```

mod context;
mod oracle;
mod runner;
mod runtime;
pub mod scenarios;
mod snapshot;
mod transport;
mod world;

pub use context::SimContext;
pub use oracle::Oracle;
pub use runner::{
    check_oracle, check_skew, RunError, ScenarioMetrics, ScenarioResult, ScenarioRunner,
    SNAPSHOT_RUN,
};
pub use runtime::{AuthorityLayout, RuntimeMetrics, SimRuntime};
pub use snapshot::{GridSnapshot, SnapshotError, Topology, CLASSIC_SEED};
pub use transport::{RoutedUpdate, SimTransport};
pub use world::{SimConfig, SimWorld};
