//! Common types for the Life environment abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one cell of the grid.
///
/// Opaque to the protocol: only equality, ordering and hashing are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub u64);

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// Unique identifier for a worker process.
///
/// Uses UUID v4 for global uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub Uuid);

impl WorkerId {
    /// Creates a new random WorkerId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic WorkerId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Which of the two liveness slots a generation reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    /// Parity of `generation`.
    pub fn of(generation: u64) -> Self {
        if generation % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }

    /// The other slot.
    pub fn flip(self) -> Self {
        match self {
            Parity::Even => Parity::Odd,
            Parity::Odd => Parity::Even,
        }
    }
}

/// Cosmetic liveness label published for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellStatus {
    Alive,
    Dead,
}

impl CellStatus {
    pub fn from_alive(alive: bool) -> Self {
        if alive {
            CellStatus::Alive
        } else {
            CellStatus::Dead
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CellStatus::Alive => "alive",
            CellStatus::Dead => "dead",
        }
    }
}

/// Full state of a cell as announced when it enters a worker's view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub id: CellId,

    /// Up to 8 adjacent cells, fixed for the lifetime of the run
    pub neighbours: Vec<CellId>,

    pub generation: u64,
    pub alive_even: bool,
    pub alive_odd: bool,
}

impl CellSnapshot {
    /// Creates a dead generation-0 cell.
    pub fn new(id: CellId, neighbours: Vec<CellId>) -> Self {
        Self {
            id,
            neighbours,
            generation: 0,
            alive_even: false,
            alive_odd: false,
        }
    }

    /// Liveness for the cell's current generation.
    pub fn is_alive(&self) -> bool {
        match Parity::of(self.generation) {
            Parity::Even => self.alive_even,
            Parity::Odd => self.alive_odd,
        }
    }
}

/// A partial set of cell fields. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellStatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alive_even: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alive_odd: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CellStatus>,
}

impl CellStatePatch {
    /// Publishes `generation` together with the liveness written into the
    /// `parity` slot.
    pub fn transition(generation: u64, parity: Parity, alive: bool) -> Self {
        let mut patch = Self {
            generation: Some(generation),
            ..Self::default()
        };
        patch.set_liveness(parity, alive);
        patch
    }

    /// Writes only the liveness slot, leaving the generation untouched.
    pub fn liveness(parity: Parity, alive: bool) -> Self {
        let mut patch = Self::default();
        patch.set_liveness(parity, alive);
        patch
    }

    /// Cosmetic label update.
    pub fn status(status: CellStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    fn set_liveness(&mut self, parity: Parity, alive: bool) {
        match parity {
            Parity::Even => self.alive_even = Some(alive),
            Parity::Odd => self.alive_odd = Some(alive),
        }
    }

    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.generation.is_none()
            && self.alive_even.is_none()
            && self.alive_odd.is_none()
            && self.status.is_none()
    }
}

/// Severity of a log line forwarded by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Everything the runtime can tell a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportOp {
    /// A cell entered the worker's view.
    CellCreated(CellSnapshot),

    /// Some fields of a known cell changed.
    CellUpdated { id: CellId, patch: CellStatePatch },

    /// Write-ownership of a cell was granted or revoked.
    AuthorityChanged { id: CellId, authoritative: bool },

    /// A log line from the runtime. `Fatal` ends the worker.
    LogMessage { level: LogLevel, message: String },

    /// The connection is gone. Ends the worker.
    Disconnect { reason: String },
}

/// A field update the worker asks the runtime to apply and replicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundUpdate {
    pub id: CellId,
    pub patch: CellStatePatch,
}

impl OutboundUpdate {
    pub fn new(id: CellId, patch: CellStatePatch) -> Self {
        Self { id, patch }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_follows_generation() {
        assert_eq!(Parity::of(0), Parity::Even);
        assert_eq!(Parity::of(7), Parity::Odd);
        assert_eq!(Parity::of(7).flip(), Parity::Even);
    }

    #[test]
    fn test_transition_patch_writes_single_slot() {
        let patch = CellStatePatch::transition(5, Parity::Odd, true);
        assert_eq!(patch.generation, Some(5));
        assert_eq!(patch.alive_odd, Some(true));
        assert_eq!(patch.alive_even, None);
        assert_eq!(patch.status, None);
    }

    #[test]
    fn test_snapshot_reads_current_slot() {
        let mut snapshot = CellSnapshot::new(CellId(1), vec![]);
        snapshot.alive_odd = true;
        assert!(!snapshot.is_alive());

        snapshot.generation = 1;
        assert!(snapshot.is_alive());
    }

    #[test]
    fn test_worker_id_from_seed_is_stable() {
        assert_eq!(WorkerId::from_seed(3), WorkerId::from_seed(3));
        assert_ne!(WorkerId::from_seed(3), WorkerId::from_seed(4));
    }

    #[test]
    fn test_patch_json_omits_absent_fields() {
        let patch = CellStatePatch::status(CellStatus::Dead);
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"status":"Dead"}"#);
    }
}
