//! Life Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" boundary between a Life worker and
//! the outside world, allowing the same worker code to run against a
//! real deployment runtime (tokio) or inside the deterministic simulator.
//!
//! # Core Concept: The Transport Collaborator
//!
//! A worker never talks to sockets directly. Everything it learns about
//! the grid arrives as a [`TransportOp`]:
//! - **Creation**: a cell enters the worker's view (`CellCreated`)
//! - **Replication**: some fields of a cell changed (`CellUpdated`)
//! - **Authority**: write-ownership of a cell moved (`AuthorityChanged`)
//! - **Lifecycle**: log lines and the final `Disconnect`
//!
//! Everything it says goes out as an [`OutboundUpdate`].
//!
//! # Example
//!
//! ```ignore
//! use life_env::{LifeContext, WorkerTransport};
//!
//! async fn worker_loop<Ctx: LifeContext, Net: WorkerTransport>(
//!     ctx: &Ctx,
//!     net: &Net,
//! ) {
//!     loop {
//!         let ops = net.poll_ops(Duration::from_millis(100)).await;
//!         apply(ops);
//!         ctx.sleep(Duration::from_secs(1)).await;
//!     }
//! }
//! ```

mod context;
mod transport;
mod types;
mod error;
mod tokio_impl;

pub use context::LifeContext;
pub use transport::{WorkerTransport, LatencyController};
pub use types::{
    CellId, CellSnapshot, CellStatePatch, CellStatus, LogLevel, OutboundUpdate, Parity,
    TransportOp, WorkerId,
};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
