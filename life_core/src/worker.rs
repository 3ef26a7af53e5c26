//! Worker Runtime - the per-tick pipeline of a Life worker.
//!
//! This module wires the pure components (store, advancement engine,
//! batcher) to the environment abstraction (`LifeContext`, `WorkerTransport`).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        LifeWorker                           │
//! │                                                             │
//! │   transport.poll_ops()                                      │
//! │          │                                                  │
//! │   ┌──────▼──────┐   ┌──────────────┐   ┌────────────────┐   │
//! │   │ Cell Store  │──►│ Advancement  │──►│ Commit Batcher │   │
//! │   │  (ingest)   │   │  (scan)      │   │  (gate, emit)  │   │
//! │   └─────────────┘   └──────────────┘   └───────┬────────┘   │
//! │                                                │            │
//! │                                   transport.send()          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Data only flows downward. The store changes exclusively during ingest;
//! a worker's own commits come back to it as replicated updates.
//!
//! # Usage
//!
//! ```ignore
//! use life_core::{LifeWorker, WorkerConfig};
//! use life_env::TokioContext;
//!
//! let mut worker = LifeWorker::new(TokioContext::shared(), transport, WorkerConfig::default());
//! let shutdown = worker.run().await?;
//! ```

use crate::advancement::{self, AdvancementScan};
use crate::batcher::{CommitBatcher, CommitDecision};
use crate::cell_store::CellStore;
use crate::config::WorkerConfig;
use crate::error::{CellError, CoreResult};
use crate::stats::{TickPhase, TickReport, WorkerStats};
use life_env::{
    CellId, CellStatePatch, CellStatus, EnvError, LifeContext, LogLevel, OutboundUpdate, Parity,
    TransportOp, WorkerId, WorkerTransport,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why a worker stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shutdown {
    /// The transport reported a disconnect
    Disconnected(String),

    /// The runtime sent a fatal log message
    Fatal(String),

    /// The transport refused a send because it has shut down
    TransportClosed,
}

/// Result of one call to [`LifeWorker::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Continue(TickReport),
    Stopped(Shutdown),
}

/// Result of applying one batch of inbound ops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub applied: usize,
    pub errors: Vec<CellError>,
    pub shutdown: Option<Shutdown>,
}

/// A Life worker.
///
/// Generic over the context and transport implementations, allowing the
/// same worker code to run against a real runtime or the simulator.
pub struct LifeWorker<Ctx, Net>
where
    Ctx: LifeContext,
    Net: WorkerTransport,
{
    pub worker_id: WorkerId,
    context: Arc<Ctx>,
    transport: Arc<Net>,
    config: WorkerConfig,
    store: CellStore,
    batcher: CommitBatcher,
    view_complete: bool,
    seeds_sent: BTreeSet<CellId>,
    seeded: bool,
    stats: WorkerStats,
    tick_count: u64,
}

impl<Ctx, Net> LifeWorker<Ctx, Net>
where
    Ctx: LifeContext,
    Net: WorkerTransport,
{
    pub fn new(context: Arc<Ctx>, transport: Arc<Net>, config: WorkerConfig) -> Self {
        Self {
            worker_id: transport.worker_id(),
            store: CellStore::with_creation_policy(config.creation_policy),
            context,
            transport,
            config,
            batcher: CommitBatcher::new(),
            view_complete: false,
            seeds_sent: BTreeSet::new(),
            seeded: false,
            stats: WorkerStats::default(),
            tick_count: 0,
        }
    }

    pub fn store(&self) -> &CellStore {
        &self.store
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn is_view_complete(&self) -> bool {
        self.view_complete
    }

    /// Every seed has landed and advancement is running.
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Applies inbound ops to the store, in order.
    ///
    /// Store errors are logged and collected; they never stop the batch.
    /// Ops after a `Disconnect` or `Fatal` log are not applied.
    pub fn ingest(&mut self, ops: Vec<TransportOp>) -> IngestSummary {
        let mut summary = IngestSummary::default();

        for op in ops {
            let result = match op {
                TransportOp::CellCreated(snapshot) => self.store.upsert_initial(&snapshot),
                TransportOp::CellUpdated { id, patch } => {
                    self.store.apply_replicated_update(id, &patch)
                }
                TransportOp::AuthorityChanged { id, authoritative } => {
                    self.store.set_authority(id, authoritative)
                }
                TransportOp::LogMessage { level, message } => {
                    match level {
                        LogLevel::Debug => debug!(worker = %self.worker_id, "runtime: {}", message),
                        LogLevel::Info => info!(worker = %self.worker_id, "runtime: {}", message),
                        LogLevel::Warn => warn!(worker = %self.worker_id, "runtime: {}", message),
                        LogLevel::Error | LogLevel::Fatal => {
                            error!(worker = %self.worker_id, "runtime: {}", message)
                        }
                    }
                    if level == LogLevel::Fatal {
                        summary.shutdown = Some(Shutdown::Fatal(message));
                        break;
                    }
                    continue;
                }
                TransportOp::Disconnect { reason } => {
                    warn!(worker = %self.worker_id, "[disconnect] {}", reason);
                    summary.shutdown = Some(Shutdown::Disconnected(reason));
                    break;
                }
            };

            match result {
                Ok(()) => summary.applied += 1,
                Err(e) => {
                    warn!(worker = %self.worker_id, "Dropped inbound op: {}", e);
                    summary.errors.push(e);
                }
            }
        }

        summary
    }

    /// Marks the view complete once the expected number of cells is known.
    fn update_view(&mut self) {
        if self.view_complete {
            return;
        }
        self.view_complete = match self.config.expected_cells {
            Some(expected) => self.store.len() >= expected,
            None => true,
        };
        if self.view_complete {
            info!(
                worker = %self.worker_id,
                "View complete: {} cells, {} authoritative",
                self.store.len(),
                self.store.authoritative_count()
            );
        }
    }

    /// True once every configured seed cell shows up alive at generation 0
    /// in the local store, or has already moved past it.
    ///
    /// Seed writes carry no generation, so this is the only way to know the
    /// generation-0 slots are final. Seed cells outside the view count as
    /// landed; they are reported when seeding starts.
    pub fn seeds_landed(&self) -> bool {
        self.config
            .seed_cells
            .iter()
            .all(|&id| match self.store.get(id) {
                Some(cell) => cell.generation() > 0 || cell.liveness().get(Parity::Even),
                None => true,
            })
    }

    /// Switches on every configured seed cell this worker owns that is
    /// still dead at generation 0. Each cell is sent at most once; a cell
    /// whose authority has not arrived yet is retried next tick.
    ///
    /// Every worker must be given the same seed list, since a seed is only
    /// ever sent by its owner.
    async fn send_seeds(&mut self, report: &mut TickReport) -> Result<(), Shutdown> {
        let pending: Vec<CellId> = self
            .config
            .seed_cells
            .iter()
            .copied()
            .filter(|id| !self.seeds_sent.contains(id))
            .collect();
        let mut switched = 0;

        for id in pending {
            let Some(cell) = self.store.get(id) else {
                warn!(worker = %self.worker_id, "Seed cell {} unknown", id);
                self.seeds_sent.insert(id);
                continue;
            };
            if !cell.is_authoritative() {
                continue;
            }
            let generation = cell.generation();
            let already_alive = cell.liveness().get(Parity::Even);
            if generation != 0 {
                warn!(
                    worker = %self.worker_id,
                    "Seed cell {} already at generation {}, skipping",
                    id,
                    generation
                );
                self.seeds_sent.insert(id);
                continue;
            }
            if already_alive {
                self.seeds_sent.insert(id);
                continue;
            }

            let liveness = OutboundUpdate::new(id, CellStatePatch::liveness(Parity::Even, true));
            if !self.send(liveness, report).await? {
                continue;
            }
            let label = OutboundUpdate::new(id, CellStatePatch::status(CellStatus::Alive));
            self.send(label, report).await?;
            self.seeds_sent.insert(id);
            switched += 1;
        }

        if switched > 0 {
            info!(worker = %self.worker_id, "Seeded {} cells", switched);
        }
        Ok(())
    }

    /// Sends one update. `Ok(false)` means the send failed but the tick can
    /// carry on: the store is unchanged, so the next tick recomputes and
    /// resends. A closed transport stops the worker.
    async fn send(&self, update: OutboundUpdate, report: &mut TickReport) -> Result<bool, Shutdown> {
        match self.transport.send(update).await {
            Ok(()) => {
                report.updates_sent += 1;
                Ok(true)
            }
            Err(EnvError::TransportClosed) => {
                warn!(worker = %self.worker_id, "Transport closed while sending");
                Err(Shutdown::TransportClosed)
            }
            Err(e) => {
                warn!(worker = %self.worker_id, "Dropped outbound update: {}", e);
                report.send_failures += 1;
                Ok(false)
            }
        }
    }

    /// Runs the advancement engine and batcher against the current store.
    ///
    /// A generation spread is logged and the trailing cells still commit,
    /// so the lagging part of the grid can catch up.
    pub fn plan(&self) -> (AdvancementScan, CommitDecision, bool) {
        let scan = advancement::scan(&self.store);

        for (id, reason) in scan.ineligible() {
            match reason {
                advancement::IneligibleReason::MissingRecord => {
                    error!(worker = %self.worker_id, "Could not find cell {}", id)
                }
                _ => debug!(worker = %self.worker_id, "{}", CellError::Ineligible { id, reason }),
            }
        }

        match self.batcher.decide(&scan) {
            Ok(decision) => (scan, decision, false),
            Err(e) => {
                error!(worker = %self.worker_id, "{}", e);
                let min_auth = scan.bounds.min_auth.unwrap_or_default();
                let candidates = scan.candidates().copied().collect();
                let decision = CommitBatcher::trailing(candidates, min_auth);
                (scan, decision, true)
            }
        }
    }

    /// Executes one tick: ingest, view/seed bookkeeping, advance, emit.
    pub async fn tick(&mut self) -> CoreResult<TickOutcome> {
        let ops = self.transport.poll_ops(self.config.poll_timeout()).await;
        let summary = self.ingest(ops);
        if let Some(shutdown) = summary.shutdown {
            return Ok(TickOutcome::Stopped(shutdown));
        }

        self.tick_count += 1;
        self.update_view();
        if self.view_complete && !self.seeded && self.seeds_landed() {
            self.seeded = true;
            if !self.config.seed_cells.is_empty() {
                info!(worker = %self.worker_id, "All {} seeds landed", self.config.seed_cells.len());
            }
        }

        let phase = if !self.view_complete {
            TickPhase::WaitingForView
        } else if !self.seeded {
            TickPhase::Seeding
        } else {
            TickPhase::Advanced
        };

        let mut report = TickReport::new(self.tick_count, phase);
        report.ops_applied = summary.applied;
        report.ingest_errors = summary.errors.len();

        let sent = match phase {
            TickPhase::WaitingForView => {
                debug!(
                    worker = %self.worker_id,
                    "Waiting for view: {}/{:?} cells",
                    self.store.len(),
                    self.config.expected_cells
                );
                Ok(())
            }
            TickPhase::Seeding => self.send_seeds(&mut report).await,
            TickPhase::Advanced => self.advance(&mut report).await,
        };

        self.stats.record(&report);
        match sent {
            Ok(()) => Ok(TickOutcome::Continue(report)),
            Err(shutdown) => Ok(TickOutcome::Stopped(shutdown)),
        }
    }

    async fn advance(&mut self, report: &mut TickReport) -> Result<(), Shutdown> {
        let (scan, decision, spread_violation) = self.plan();
        report.candidates = scan.candidate_count();
        report.ineligible = scan.evaluations.len() - report.candidates;
        report.committed = decision.commits().len();
        report.withheld = decision.withheld();
        report.decision = Some(decision.kind());
        report.spread_violation = spread_violation;

        for update in CommitBatcher::emit(decision.commits()) {
            self.send(update, report).await?;
        }

        debug!(
            worker = %self.worker_id,
            "** Tick {} ** {} | candidates={} committed={} withheld={} send_failures={}",
            self.tick_count,
            decision.kind(),
            report.candidates,
            report.committed,
            report.withheld,
            report.send_failures
        );
        Ok(())
    }

    /// Ticks at `tick_rate_hz` until the transport disconnects.
    pub async fn run(&mut self) -> CoreResult<Shutdown> {
        self.config.validate()?;
        let frame = self.config.frame();
        info!(
            worker = %self.worker_id,
            seed = self.context.seed(),
            "Worker '{}' starting at {} Hz",
            self.config.name,
            self.config.tick_rate_hz
        );

        loop {
            let started = self.context.now();
            if let TickOutcome::Stopped(shutdown) = self.tick().await? {
                info!(worker = %self.worker_id, "Worker stopped after {} ticks", self.tick_count);
                return Ok(shutdown);
            }

            let elapsed = self.context.now().saturating_sub(started);
            if let Some(remaining) = frame.checked_sub(elapsed) {
                self.context.sleep(remaining).await;
            }
        }
    }
}
