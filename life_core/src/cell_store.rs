//! The Cell Store - local replica of every cell this worker can see.
//!
//! Mutation is funnelled through three entry points, each driven by one
//! kind of transport op:
//! - [`CellStore::upsert_initial`] for `CellCreated`
//! - [`CellStore::apply_replicated_update`] for `CellUpdated`
//! - [`CellStore::set_authority`] for `AuthorityChanged`
//!
//! Everything else is read-only.

use crate::config::CreationPolicy;
use crate::error::CellError;
use life_env::{CellId, CellSnapshot, CellStatePatch, CellStatus, Parity};
use std::collections::{BTreeSet, HashMap};

/// The two liveness slots of a cell.
///
/// The slot matching the parity of the cell's generation is the published
/// value; the other one is staging for the next transition. A writer only
/// ever touches the staging slot, so readers computing the same transition
/// never observe a half-written value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivenessBuffers {
    pub even: bool,
    pub odd: bool,
}

impl LivenessBuffers {
    pub fn new(even: bool, odd: bool) -> Self {
        Self { even, odd }
    }

    pub fn get(&self, parity: Parity) -> bool {
        match parity {
            Parity::Even => self.even,
            Parity::Odd => self.odd,
        }
    }

    pub fn set(&mut self, parity: Parity, alive: bool) {
        match parity {
            Parity::Even => self.even = alive,
            Parity::Odd => self.odd = alive,
        }
    }

    /// Published liveness at `generation`.
    pub fn at(&self, generation: u64) -> bool {
        self.get(Parity::of(generation))
    }
}

/// Replicated state of one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRecord {
    neighbours: Vec<CellId>,
    generation: u64,
    liveness: LivenessBuffers,
    authoritative: bool,
    status: Option<CellStatus>,
}

impl CellRecord {
    fn from_snapshot(snapshot: &CellSnapshot) -> Self {
        Self {
            neighbours: snapshot.neighbours.clone(),
            generation: snapshot.generation,
            liveness: LivenessBuffers::new(snapshot.alive_even, snapshot.alive_odd),
            authoritative: false,
            status: None,
        }
    }

    pub fn neighbours(&self) -> &[CellId] {
        &self.neighbours
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn liveness(&self) -> LivenessBuffers {
        self.liveness
    }

    /// Liveness at the cell's own current generation.
    pub fn is_alive(&self) -> bool {
        self.liveness.at(self.generation)
    }

    pub fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    /// Last cosmetic label seen, if any.
    pub fn status(&self) -> Option<CellStatus> {
        self.status
    }
}

/// Owned table of cell records keyed by identity.
#[derive(Debug, Default)]
pub struct CellStore {
    cells: HashMap<CellId, CellRecord>,
    authoritative: BTreeSet<CellId>,
    creation_policy: CreationPolicy,
}

impl CellStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_creation_policy(policy: CreationPolicy) -> Self {
        Self {
            creation_policy: policy,
            ..Self::default()
        }
    }

    /// Inserts a newly announced cell.
    ///
    /// Under [`CreationPolicy::Reject`] a repeated announcement fails with
    /// [`CellError::DuplicateCell`] and the stored record is left as is.
    /// Under [`CreationPolicy::Merge`] it is applied like a replicated update
    /// of generation and liveness; the neighbour list is never replaced.
    pub fn upsert_initial(&mut self, snapshot: &CellSnapshot) -> Result<(), CellError> {
        if self.cells.contains_key(&snapshot.id) {
            return match self.creation_policy {
                CreationPolicy::Reject => Err(CellError::DuplicateCell(snapshot.id)),
                CreationPolicy::Merge => {
                    let patch = CellStatePatch {
                        generation: Some(snapshot.generation),
                        alive_even: Some(snapshot.alive_even),
                        alive_odd: Some(snapshot.alive_odd),
                        status: None,
                    };
                    self.apply_replicated_update(snapshot.id, &patch)
                }
            };
        }

        self.cells.insert(snapshot.id, CellRecord::from_snapshot(snapshot));
        Ok(())
    }

    /// Merges the fields present in `patch` into an existing record.
    ///
    /// The patch is all-or-nothing: a generation lower than the stored one
    /// rejects the whole patch, liveness included.
    pub fn apply_replicated_update(
        &mut self,
        id: CellId,
        patch: &CellStatePatch,
    ) -> Result<(), CellError> {
        let record = self.cells.get_mut(&id).ok_or(CellError::UnknownCell(id))?;

        if let Some(incoming) = patch.generation {
            if incoming < record.generation {
                return Err(CellError::GenerationRegression {
                    id,
                    current: record.generation,
                    incoming,
                });
            }
            record.generation = incoming;
        }
        if let Some(alive) = patch.alive_even {
            record.liveness.set(Parity::Even, alive);
        }
        if let Some(alive) = patch.alive_odd {
            record.liveness.set(Parity::Odd, alive);
        }
        if let Some(status) = patch.status {
            record.status = Some(status);
        }
        Ok(())
    }

    /// Grants or revokes local write-authority. Idempotent.
    pub fn set_authority(&mut self, id: CellId, authoritative: bool) -> Result<(), CellError> {
        let record = self.cells.get_mut(&id).ok_or(CellError::UnknownCell(id))?;
        record.authoritative = authoritative;
        if authoritative {
            self.authoritative.insert(id);
        } else {
            self.authoritative.remove(&id);
        }
        Ok(())
    }

    pub fn get(&self, id: CellId) -> Option<&CellRecord> {
        self.cells.get(&id)
    }

    /// Cells this worker currently owns, in ascending id order.
    pub fn authoritative_ids(&self) -> &BTreeSet<CellId> {
        &self.authoritative
    }

    pub fn authoritative_count(&self) -> usize {
        self.authoritative.len()
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.cells.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellId, &CellRecord)> {
        self.cells.iter().map(|(id, record)| (*id, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: u64, neighbours: &[u64]) -> CellSnapshot {
        CellSnapshot::new(CellId(id), neighbours.iter().map(|n| CellId(*n)).collect())
    }

    #[test]
    fn test_upsert_then_get() {
        let mut store = CellStore::new();
        store.upsert_initial(&snapshot(1, &[2, 3])).unwrap();

        let record = store.get(CellId(1)).unwrap();
        assert_eq!(record.neighbours(), &[CellId(2), CellId(3)]);
        assert_eq!(record.generation(), 0);
        assert!(!record.is_authoritative());
        assert!(store.get(CellId(2)).is_none());
    }

    #[test]
    fn test_duplicate_creation_rejected_by_default() {
        let mut store = CellStore::new();
        let mut first = snapshot(1, &[2]);
        first.alive_even = true;
        store.upsert_initial(&first).unwrap();

        let err = store.upsert_initial(&snapshot(1, &[9])).unwrap_err();
        assert_eq!(err, CellError::DuplicateCell(CellId(1)));

        let record = store.get(CellId(1)).unwrap();
        assert!(record.is_alive());
        assert_eq!(record.neighbours(), &[CellId(2)]);
    }

    #[test]
    fn test_duplicate_creation_merges_state_but_not_neighbours() {
        let mut store = CellStore::with_creation_policy(CreationPolicy::Merge);
        store.upsert_initial(&snapshot(1, &[2])).unwrap();

        let mut again = snapshot(1, &[9]);
        again.generation = 2;
        again.alive_even = true;
        store.upsert_initial(&again).unwrap();

        let record = store.get(CellId(1)).unwrap();
        assert_eq!(record.generation(), 2);
        assert!(record.is_alive());
        assert_eq!(record.neighbours(), &[CellId(2)]);
    }

    #[test]
    fn test_update_unknown_cell() {
        let mut store = CellStore::new();
        let patch = CellStatePatch::transition(1, Parity::Odd, true);
        assert_eq!(
            store.apply_replicated_update(CellId(4), &patch),
            Err(CellError::UnknownCell(CellId(4)))
        );
    }

    #[test]
    fn test_partial_update_leaves_other_fields() {
        let mut store = CellStore::new();
        let mut s = snapshot(1, &[]);
        s.alive_even = true;
        store.upsert_initial(&s).unwrap();

        store
            .apply_replicated_update(CellId(1), &CellStatePatch::transition(1, Parity::Odd, false))
            .unwrap();

        let record = store.get(CellId(1)).unwrap();
        assert_eq!(record.generation(), 1);
        assert_eq!(record.liveness(), LivenessBuffers::new(true, false));
        assert!(!record.is_alive());

        store
            .apply_replicated_update(CellId(1), &CellStatePatch::status(CellStatus::Dead))
            .unwrap();
        assert_eq!(store.get(CellId(1)).unwrap().status(), Some(CellStatus::Dead));
        assert_eq!(store.get(CellId(1)).unwrap().generation(), 1);
    }

    #[test]
    fn test_generation_regression_rejects_whole_patch() {
        let mut store = CellStore::new();
        let mut s = snapshot(1, &[]);
        s.generation = 4;
        store.upsert_initial(&s).unwrap();

        let patch = CellStatePatch::transition(3, Parity::Odd, true);
        assert_eq!(
            store.apply_replicated_update(CellId(1), &patch),
            Err(CellError::GenerationRegression {
                id: CellId(1),
                current: 4,
                incoming: 3
            })
        );
        assert!(!store.get(CellId(1)).unwrap().liveness().odd);

        // Same generation again is a harmless duplicate
        let echo = CellStatePatch::transition(4, Parity::Even, true);
        store.apply_replicated_update(CellId(1), &echo).unwrap();
        assert!(store.get(CellId(1)).unwrap().is_alive());
    }

    #[test]
    fn test_authority_is_idempotent() {
        let mut store = CellStore::new();
        store.upsert_initial(&snapshot(1, &[])).unwrap();
        store.upsert_initial(&snapshot(2, &[])).unwrap();

        store.set_authority(CellId(2), true).unwrap();
        store.set_authority(CellId(2), true).unwrap();
        store.set_authority(CellId(1), false).unwrap();

        assert_eq!(store.authoritative_count(), 1);
        assert!(store.get(CellId(2)).unwrap().is_authoritative());

        store.set_authority(CellId(2), false).unwrap();
        assert!(store.authoritative_ids().is_empty());

        assert_eq!(
            store.set_authority(CellId(3), true),
            Err(CellError::UnknownCell(CellId(3)))
        );
    }

    #[test]
    fn test_liveness_buffers_by_generation() {
        let buffers = LivenessBuffers::new(true, false);
        assert!(buffers.at(0));
        assert!(!buffers.at(1));
        assert!(buffers.at(10));
    }
}
