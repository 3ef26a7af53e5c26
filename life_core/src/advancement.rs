//! The Generation Advancement Engine.
//!
//! Decides, per locally-authoritative cell, whether the neighbour data in
//! the store is consistent enough to compute the next generation, and if
//! so computes it. Pure: reads the store, never writes it.
//!
//! # Eligibility
//!
//! A cell at generation `G` may advance only if every neighbour is known
//! and sits at `G` or `G + 1`. A neighbour at `G + 1` has already written
//! its `G + 1` value into its other slot, so its slot for parity `G` still
//! holds the value at `G`. A neighbour at `G + 2` may have overwritten it,
//! and one behind `G` has not published it yet.
//!
//! ```text
//!   neighbour gen:   G-1      G        G+1      G+2
//!   eligible:        no       yes      yes      no
//! ```

use crate::cell_store::CellStore;
use crate::rules::next_alive;
use life_env::{CellId, CellStatePatch, Parity};
use std::fmt;

/// A computed transition waiting for the batcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: CellId,

    /// Generation the cell is at before the transition
    pub from_generation: u64,

    /// Live neighbours counted in the parity-`from_generation` slots
    pub live_neighbours: usize,

    /// Liveness at `from_generation + 1`
    pub alive: bool,
}

impl Candidate {
    /// Generation the cell moves to.
    pub fn generation(&self) -> u64 {
        self.from_generation + 1
    }

    /// Slot the new liveness is written into.
    pub fn written_parity(&self) -> Parity {
        Parity::of(self.from_generation).flip()
    }

    /// The generation + liveness update request for this transition.
    pub fn transition_patch(&self) -> CellStatePatch {
        CellStatePatch::transition(self.generation(), self.written_parity(), self.alive)
    }
}

/// Why a cell cannot advance this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibleReason {
    /// The cell is marked authoritative but has no record.
    MissingRecord,

    /// A neighbour has not been announced yet.
    UnknownNeighbour(CellId),

    /// A neighbour is too far behind or ahead.
    GenerationSkew {
        neighbour: CellId,
        own: u64,
        theirs: u64,
    },
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IneligibleReason::MissingRecord => write!(f, "no record for authoritative cell"),
            IneligibleReason::UnknownNeighbour(n) => write!(f, "neighbour {} unknown", n),
            IneligibleReason::GenerationSkew {
                neighbour,
                own,
                theirs,
            } => write!(
                f,
                "neighbour {} at generation {} (own generation {})",
                neighbour, theirs, own
            ),
        }
    }
}

/// Outcome of evaluating one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible(Candidate),
    Ineligible(IneligibleReason),
}

impl Eligibility {
    pub fn candidate(&self) -> Option<&Candidate> {
        match self {
            Eligibility::Eligible(candidate) => Some(candidate),
            Eligibility::Ineligible(_) => None,
        }
    }

    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible(_))
    }
}

/// Generation range over the authoritative cells and their known neighbours.
///
/// Every field is `None` when there is nothing to measure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationBounds {
    pub min_auth: Option<u64>,
    pub max_auth: Option<u64>,
    pub min_neighbour: Option<u64>,
    pub max_neighbour: Option<u64>,
}

impl GenerationBounds {
    fn observe_auth(&mut self, generation: u64) {
        self.min_auth = Some(self.min_auth.map_or(generation, |g| g.min(generation)));
        self.max_auth = Some(self.max_auth.map_or(generation, |g| g.max(generation)));
    }

    fn observe_neighbour(&mut self, generation: u64) {
        self.min_neighbour = Some(self.min_neighbour.map_or(generation, |g| g.min(generation)));
        self.max_neighbour = Some(self.max_neighbour.map_or(generation, |g| g.max(generation)));
    }

    /// `max_auth - min_auth`, or 0 when there are no authoritative cells.
    pub fn auth_spread(&self) -> u64 {
        match (self.min_auth, self.max_auth) {
            (Some(min), Some(max)) => max - min,
            _ => 0,
        }
    }
}

/// Result of one pass over all authoritative cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvancementScan {
    /// One entry per authoritative id, in ascending id order
    pub evaluations: Vec<(CellId, Eligibility)>,
    pub bounds: GenerationBounds,
}

impl AdvancementScan {
    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.evaluations.iter().filter_map(|(_, e)| e.candidate())
    }

    pub fn ineligible(&self) -> impl Iterator<Item = (CellId, IneligibleReason)> + '_ {
        self.evaluations.iter().filter_map(|(id, e)| match e {
            Eligibility::Ineligible(reason) => Some((*id, *reason)),
            Eligibility::Eligible(_) => None,
        })
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates().count()
    }
}

/// Evaluates a single cell against the current store contents.
pub fn evaluate(store: &CellStore, id: CellId) -> Eligibility {
    let Some(cell) = store.get(id) else {
        return Eligibility::Ineligible(IneligibleReason::MissingRecord);
    };

    let own = cell.generation();
    let read = Parity::of(own);
    let mut live_neighbours = 0;

    for &neighbour_id in cell.neighbours() {
        let Some(neighbour) = store.get(neighbour_id) else {
            return Eligibility::Ineligible(IneligibleReason::UnknownNeighbour(neighbour_id));
        };

        let theirs = neighbour.generation();
        if theirs != own && theirs != own + 1 {
            return Eligibility::Ineligible(IneligibleReason::GenerationSkew {
                neighbour: neighbour_id,
                own,
                theirs,
            });
        }

        if neighbour.liveness().get(read) {
            live_neighbours += 1;
        }
    }

    Eligibility::Eligible(Candidate {
        id,
        from_generation: own,
        live_neighbours,
        alive: next_alive(cell.liveness().get(read), live_neighbours),
    })
}

/// Evaluates every authoritative cell and measures the generation bounds.
pub fn scan(store: &CellStore) -> AdvancementScan {
    let mut result = AdvancementScan::default();

    for &id in store.authoritative_ids() {
        if let Some(cell) = store.get(id) {
            result.bounds.observe_auth(cell.generation());
            for neighbour in cell.neighbours() {
                if let Some(record) = store.get(*neighbour) {
                    result.bounds.observe_neighbour(record.generation());
                }
            }
        }
        result.evaluations.push((id, evaluate(store, id)));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use life_env::CellSnapshot;

    /// Builds a store from `(id, neighbours, generation, even, odd, authoritative)`.
    fn store_of(cells: &[(u64, &[u64], u64, bool, bool, bool)]) -> CellStore {
        let mut store = CellStore::new();
        for &(id, neighbours, generation, even, odd, _) in cells {
            store
                .upsert_initial(&CellSnapshot {
                    id: CellId(id),
                    neighbours: neighbours.iter().map(|n| CellId(*n)).collect(),
                    generation,
                    alive_even: even,
                    alive_odd: odd,
                })
                .unwrap();
        }
        for &(id, _, _, _, _, auth) in cells {
            if auth {
                store.set_authority(CellId(id), true).unwrap();
            }
        }
        store
    }

    #[test]
    fn test_unknown_neighbour_is_ineligible() {
        let store = store_of(&[(1, &[2, 3], 0, true, false, true), (2, &[1], 0, true, false, false)]);
        assert_eq!(
            evaluate(&store, CellId(1)),
            Eligibility::Ineligible(IneligibleReason::UnknownNeighbour(CellId(3)))
        );
    }

    #[test]
    fn test_neighbour_two_ahead_is_ineligible() {
        let store = store_of(&[(1, &[2], 3, false, false, true), (2, &[1], 5, false, false, false)]);
        assert_eq!(
            evaluate(&store, CellId(1)),
            Eligibility::Ineligible(IneligibleReason::GenerationSkew {
                neighbour: CellId(2),
                own: 3,
                theirs: 5
            })
        );
    }

    #[test]
    fn test_neighbour_behind_is_ineligible() {
        let store = store_of(&[(1, &[2], 3, false, false, true), (2, &[1], 2, false, false, false)]);
        assert!(!evaluate(&store, CellId(1)).is_eligible());
    }

    #[test]
    fn test_neighbour_one_ahead_is_eligible() {
        let store = store_of(&[(1, &[2], 3, false, false, true), (2, &[1], 4, false, false, false)]);
        assert!(evaluate(&store, CellId(1)).is_eligible());
    }

    #[test]
    fn test_missing_record_is_ineligible() {
        let store = CellStore::new();
        assert_eq!(
            evaluate(&store, CellId(9)),
            Eligibility::Ineligible(IneligibleReason::MissingRecord)
        );
    }

    #[test]
    fn test_parity_slot_selected_by_reader_generation() {
        // Three neighbours whose slots disagree: even=alive, odd=dead.
        let even_reader = store_of(&[
            (1, &[2, 3, 4], 2, false, false, true),
            (2, &[1], 2, true, false, false),
            (3, &[1], 3, true, false, false),
            (4, &[1], 2, true, false, false),
        ]);
        let candidate = *evaluate(&even_reader, CellId(1)).candidate().unwrap();
        assert_eq!(candidate.live_neighbours, 3);
        assert!(candidate.alive);

        // Same neighbour slots, reader at an odd generation reads the odd slots.
        let odd_reader = store_of(&[
            (1, &[2, 3, 4], 1, false, false, true),
            (2, &[1], 1, true, false, false),
            (3, &[1], 2, true, false, false),
            (4, &[1], 1, true, false, false),
        ]);
        let candidate = *evaluate(&odd_reader, CellId(1)).candidate().unwrap();
        assert_eq!(candidate.live_neighbours, 0);
        assert!(!candidate.alive);
    }

    #[test]
    fn test_own_liveness_read_from_current_slot() {
        // Own odd slot says alive but generation is even: counts as dead.
        let store = store_of(&[
            (1, &[2, 3], 0, false, true, true),
            (2, &[1], 0, true, false, false),
            (3, &[1], 0, true, false, false),
        ]);
        let candidate = *evaluate(&store, CellId(1)).candidate().unwrap();
        assert_eq!(candidate.live_neighbours, 2);
        assert!(!candidate.alive);
    }

    #[test]
    fn test_candidate_writes_opposite_slot() {
        let store = store_of(&[(1, &[], 4, true, false, true)]);
        let candidate = *evaluate(&store, CellId(1)).candidate().unwrap();

        assert_eq!(candidate.generation(), 5);
        assert_eq!(candidate.written_parity(), Parity::Odd);
        let patch = candidate.transition_patch();
        assert_eq!(patch.generation, Some(5));
        assert_eq!(patch.alive_odd, Some(false));
        assert_eq!(patch.alive_even, None);
    }

    #[test]
    fn test_scan_bounds_cover_ineligible_cells() {
        let store = store_of(&[
            (1, &[2], 3, false, false, true),
            (2, &[1], 4, false, false, true),
            (3, &[2], 6, false, false, false),
            (4, &[3, 9], 4, false, false, true),
        ]);
        let result = scan(&store);

        assert_eq!(result.evaluations.len(), 3);
        assert_eq!(result.bounds.min_auth, Some(3));
        assert_eq!(result.bounds.max_auth, Some(4));
        assert_eq!(result.bounds.min_neighbour, Some(3));
        assert_eq!(result.bounds.max_neighbour, Some(6));
        assert_eq!(result.bounds.auth_spread(), 1);

        let ineligible: Vec<_> = result.ineligible().map(|(id, _)| id).collect();
        assert_eq!(ineligible, vec![CellId(2), CellId(4)]);
    }

    #[test]
    fn test_scan_is_pure() {
        let store = store_of(&[
            (1, &[2], 0, true, false, true),
            (2, &[1], 0, true, false, true),
        ]);
        assert_eq!(scan(&store), scan(&store));
    }
}
