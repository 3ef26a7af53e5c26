//! In-process stand-in for the publish/subscribe runtime.
//!
//! The runtime owns the canonical copy of every cell. Workers never touch
//! it directly: they send [`OutboundUpdate`]s through their
//! [`SimTransport`], the runtime checks the write ACL, applies the patch
//! and fans the accepted update out to every worker (the sender included)
//! after that worker's link latency.
//!
//! ```text
//!   worker A ──send──► router ──ACL──► canonical state
//!                                          │
//!                       ┌──────────────────┼──────────────────┐
//!                 [latency A]        [latency B]        [latency C]
//!                       ▼                  ▼                  ▼
//!                   worker A           worker B           worker C
//! ```
//!
//! Per-worker delivery is FIFO. Jitter delays ops but never lets a later
//! op overtake an earlier one on the same link.

use crate::snapshot::GridSnapshot;
use crate::transport::{RoutedUpdate, SimTransport};
use life_env::{
    CellId, CellSnapshot, CellStatePatch, CellStatus, LatencyController, LogLevel,
    OutboundUpdate, TransportOp, WorkerId,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::str::FromStr;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How cells are split between workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityLayout {
    /// Worker 0 owns everything
    Single,

    /// Contiguous column bands, one per worker
    Stripes,

    /// Cells dealt out in id order
    RoundRobin,
}

impl AuthorityLayout {
    /// Index of the worker owning `(x, y)`.
    pub fn owner_index(&self, x: usize, y: usize, snapshot: &GridSnapshot, workers: usize) -> usize {
        if workers <= 1 {
            return 0;
        }
        match self {
            AuthorityLayout::Single => 0,
            AuthorityLayout::Stripes => (x * workers / snapshot.width.max(1)).min(workers - 1),
            AuthorityLayout::RoundRobin => (x * snapshot.height + y) % workers,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthorityLayout::Single => "single",
            AuthorityLayout::Stripes => "stripes",
            AuthorityLayout::RoundRobin => "round_robin",
        }
    }
}

impl FromStr for AuthorityLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(AuthorityLayout::Single),
            "stripes" => Ok(AuthorityLayout::Stripes),
            "round_robin" | "roundrobin" => Ok(AuthorityLayout::RoundRobin),
            _ => Err(format!("Unknown layout: {}", s)),
        }
    }
}

/// Counters kept by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeMetrics {
    /// Updates applied to canonical state and fanned out
    pub updates_accepted: u64,

    /// Recomputed commits identical to what is already published
    pub duplicates: u64,

    /// Same-generation commits disagreeing with the published value
    pub conflicts: u64,

    /// Writes from a worker without authority over the cell
    pub acl_violations: u64,

    /// Commits older than the published generation
    pub regressions: u64,

    /// Ops handed to worker inboxes
    pub ops_delivered: u64,
}

struct WorkerLink {
    id: WorkerId,
    inbox: mpsc::UnboundedSender<TransportOp>,
    latency: u64,
    pending: VecDeque<(u64, TransportOp)>,
    last_due: u64,
}

pub struct SimRuntime {
    cells: BTreeMap<CellId, CellSnapshot>,
    status: HashMap<CellId, CellStatus>,
    owners: HashMap<CellId, WorkerId>,
    links: Vec<WorkerLink>,
    router_tx: mpsc::UnboundedSender<RoutedUpdate>,
    router_rx: mpsc::UnboundedReceiver<RoutedUpdate>,
    jitter: u64,
    rng: ChaCha8Rng,
    tick: u64,
    metrics: RuntimeMetrics,
}

impl SimRuntime {
    /// Loads the canonical state from a snapshot.
    pub fn new(snapshot: &GridSnapshot, seed: u64) -> Self {
        let (router_tx, router_rx) = mpsc::unbounded_channel();
        Self {
            cells: snapshot.cells.iter().map(|c| (c.id, c.clone())).collect(),
            status: HashMap::new(),
            owners: HashMap::new(),
            links: Vec::new(),
            router_tx,
            router_rx,
            jitter: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
            metrics: RuntimeMetrics::default(),
        }
    }

    /// Adds up to `ticks` of random extra delay to every delivery.
    pub fn with_jitter(mut self, ticks: u64) -> Self {
        self.jitter = ticks;
        self
    }

    /// Attaches a worker and returns its transport.
    pub fn connect(&mut self, worker: WorkerId, latency: u64) -> SimTransport {
        let (inbox, rx) = mpsc::unbounded_channel();
        self.links.push(WorkerLink {
            id: worker,
            inbox,
            latency,
            pending: VecDeque::new(),
            last_due: 0,
        });
        SimTransport::new(worker, self.router_tx.clone(), rx)
    }

    /// Grants `worker` write access to `cell`.
    pub fn assign(&mut self, cell: CellId, worker: WorkerId) {
        self.owners.insert(cell, worker);
    }

    /// Splits every cell of `snapshot` between the connected workers.
    pub fn assign_layout(&mut self, snapshot: &GridSnapshot, layout: AuthorityLayout) {
        let workers: Vec<WorkerId> = self.links.iter().map(|l| l.id).collect();
        if workers.is_empty() {
            return;
        }
        for cell in &snapshot.cells {
            if let Some((x, y)) = snapshot.position_of(cell.id) {
                let owner = workers[layout.owner_index(x, y, snapshot, workers.len())];
                self.owners.insert(cell.id, owner);
            }
        }
    }

    /// Queues the initial view: every cell, then this worker's authority grants.
    pub fn announce(&mut self) {
        for index in 0..self.links.len() {
            let worker = self.links[index].id;
            let created: Vec<TransportOp> = self
                .cells
                .values()
                .map(|c| TransportOp::CellCreated(c.clone()))
                .collect();
            let grants: Vec<TransportOp> = self
                .cells
                .keys()
                .filter(|id| self.owners.get(id) == Some(&worker))
                .map(|&id| TransportOp::AuthorityChanged {
                    id,
                    authoritative: true,
                })
                .collect();
            for op in created.into_iter().chain(grants) {
                self.enqueue(index, op);
            }
        }
    }

    /// Sends a runtime log line to every worker.
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        for index in 0..self.links.len() {
            self.enqueue(
                index,
                TransportOp::LogMessage {
                    level,
                    message: message.clone(),
                },
            );
        }
    }

    /// Applies every update workers have sent so far. Returns how many
    /// were accepted.
    pub fn route(&mut self) -> usize {
        let mut accepted = 0;
        while let Ok(RoutedUpdate { from, update }) = self.router_rx.try_recv() {
            if self.apply(from, &update) {
                accepted += 1;
                for index in 0..self.links.len() {
                    self.enqueue(
                        index,
                        TransportOp::CellUpdated {
                            id: update.id,
                            patch: update.patch.clone(),
                        },
                    );
                }
            }
        }
        accepted
    }

    fn apply(&mut self, from: WorkerId, update: &OutboundUpdate) -> bool {
        let OutboundUpdate { id, patch } = update;

        if self.owners.get(id) != Some(&from) {
            self.metrics.acl_violations += 1;
            warn!("Refused write to {} from non-authoritative worker {}", id, from);
            return false;
        }
        let Some(cell) = self.cells.get_mut(id) else {
            self.metrics.acl_violations += 1;
            warn!("Refused write to unknown {}", id);
            return false;
        };

        if let Some(generation) = patch.generation {
            if generation < cell.generation {
                self.metrics.regressions += 1;
                warn!(
                    "Refused regression of {} from generation {} to {}",
                    id, cell.generation, generation
                );
                return false;
            }
            if generation == cell.generation {
                let agrees = patch.alive_even.map_or(true, |v| v == cell.alive_even)
                    && patch.alive_odd.map_or(true, |v| v == cell.alive_odd);
                if agrees {
                    self.metrics.duplicates += 1;
                    debug!("Duplicate commit of {} at generation {}", id, generation);
                } else {
                    self.metrics.conflicts += 1;
                    warn!("Conflicting commit of {} at generation {}", id, generation);
                }
                return false;
            }
        } else if leaves_unchanged(cell, self.status.get(id).copied(), patch) {
            // Status labels resent alongside a duplicate commit land here.
            self.metrics.duplicates += 1;
            debug!("Duplicate write to {}", id);
            return false;
        }

        apply_patch(cell, patch);
        if let Some(status) = patch.status {
            self.status.insert(*id, status);
        }
        self.metrics.updates_accepted += 1;
        true
    }

    fn enqueue(&mut self, index: usize, op: TransportOp) {
        let extra = if self.jitter > 0 {
            self.rng.gen_range(0..=self.jitter)
        } else {
            0
        };
        let link = &mut self.links[index];
        // Earliest delivery is the next tick.
        let due = (self.tick + 1 + link.latency + extra).max(link.last_due);
        link.last_due = due;
        link.pending.push_back((due, op));
    }

    /// Hands every op whose latency has elapsed to its worker.
    pub fn deliver_due(&mut self) -> usize {
        let tick = self.tick;
        let mut delivered = 0;
        for link in &mut self.links {
            while link.pending.front().is_some_and(|(due, _)| *due <= tick) {
                if let Some((_, op)) = link.pending.pop_front() {
                    if link.inbox.send(op).is_err() {
                        debug!("Worker {} has gone, dropping op", link.id);
                    }
                    delivered += 1;
                }
            }
        }
        self.metrics.ops_delivered += delivered as u64;
        delivered
    }

    pub fn advance(&mut self) {
        self.tick += 1;
    }

    /// Flushes everything still in flight, then disconnects every worker.
    pub fn shutdown(&mut self, reason: &str) {
        for link in &mut self.links {
            let pending = link.pending.drain(..).map(|(_, op)| op);
            for op in pending.chain(std::iter::once(TransportOp::Disconnect {
                reason: reason.to_string(),
            })) {
                let _ = link.inbox.send(op);
                self.metrics.ops_delivered += 1;
            }
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn metrics(&self) -> &RuntimeMetrics {
        &self.metrics
    }

    pub fn cell(&self, id: CellId) -> Option<&CellSnapshot> {
        self.cells.get(&id)
    }

    pub fn cells(&self) -> impl Iterator<Item = &CellSnapshot> {
        self.cells.values()
    }

    pub fn status(&self, id: CellId) -> Option<CellStatus> {
        self.status.get(&id).copied()
    }

    pub fn owner(&self, id: CellId) -> Option<WorkerId> {
        self.owners.get(&id).copied()
    }

    /// Ops queued but not yet delivered, across all workers.
    pub fn in_flight(&self) -> usize {
        self.links.iter().map(|l| l.pending.len()).sum()
    }

    /// Slowest and fastest canonical generation.
    pub fn generation_range(&self) -> Option<(u64, u64)> {
        let min = self.cells.values().map(|c| c.generation).min()?;
        let max = self.cells.values().map(|c| c.generation).max()?;
        Some((min, max))
    }
}

fn leaves_unchanged(cell: &CellSnapshot, status: Option<CellStatus>, patch: &CellStatePatch) -> bool {
    patch.alive_even.map_or(true, |v| v == cell.alive_even)
        && patch.alive_odd.map_or(true, |v| v == cell.alive_odd)
        && patch.status.map_or(true, |s| status == Some(s))
}

fn apply_patch(cell: &mut CellSnapshot, patch: &CellStatePatch) {
    if let Some(generation) = patch.generation {
        cell.generation = generation;
    }
    if let Some(alive) = patch.alive_even {
        cell.alive_even = alive;
    }
    if let Some(alive) = patch.alive_odd {
        cell.alive_odd = alive;
    }
}

impl LatencyController for SimRuntime {
    fn set_worker_latency(&mut self, worker: WorkerId, ticks: u64) {
        if let Some(link) = self.links.iter_mut().find(|l| l.id == worker) {
            link.latency = ticks;
        }
    }

    fn worker_latency(&self, worker: WorkerId) -> u64 {
        self.links
            .iter()
            .find(|l| l.id == worker)
            .map(|l| l.latency)
            .unwrap_or(0)
    }
}
