//! Per-tick reports and cumulative worker statistics.

use serde::Serialize;

/// Where a tick stopped in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPhase {
    /// Still waiting for the configured number of cells to arrive
    WaitingForView,

    /// Seeds sent or still in flight; advancement waits until all have landed
    Seeding,

    /// Scan and batch ran
    Advanced,
}

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub phase: TickPhase,

    /// Inbound ops applied to the store
    pub ops_applied: usize,

    /// Inbound ops rejected by the store
    pub ingest_errors: usize,

    pub candidates: usize,
    pub ineligible: usize,
    pub committed: usize,
    pub withheld: usize,

    /// Batcher decision kind, when the batcher ran
    pub decision: Option<&'static str>,

    /// Authoritative cells spanned two or more generations
    pub spread_violation: bool,

    /// Outbound updates sent this tick
    pub updates_sent: usize,

    /// Outbound updates the transport failed to take
    pub send_failures: usize,
}

impl TickReport {
    pub fn new(tick: u64, phase: TickPhase) -> Self {
        Self {
            tick,
            phase,
            ops_applied: 0,
            ingest_errors: 0,
            candidates: 0,
            ineligible: 0,
            committed: 0,
            withheld: 0,
            decision: None,
            spread_violation: false,
            updates_sent: 0,
            send_failures: 0,
        }
    }
}

/// Running totals over a worker's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub ticks: u64,
    pub ops_applied: u64,
    pub ingest_errors: u64,
    pub commits: u64,
    pub withheld: u64,
    pub idle_ticks: u64,
    pub gated_ticks: u64,
    pub ineligible_evaluations: u64,
    pub spread_violations: u64,
    pub updates_sent: u64,
    pub send_failures: u64,
}

impl WorkerStats {
    pub fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.ops_applied += report.ops_applied as u64;
        self.ingest_errors += report.ingest_errors as u64;
        self.commits += report.committed as u64;
        self.withheld += report.withheld as u64;
        self.ineligible_evaluations += report.ineligible as u64;
        self.updates_sent += report.updates_sent as u64;
        self.send_failures += report.send_failures as u64;
        if report.spread_violation {
            self.spread_violations += 1;
        }
        match report.decision {
            Some("idle") => self.idle_ticks += 1,
            Some("gated") => self.gated_ticks += 1,
            _ => {}
        }
    }
}
