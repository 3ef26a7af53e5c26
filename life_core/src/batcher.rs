//! The Synchronized Commit Batcher.
//!
//! Takes every candidate produced in one tick and decides which of them
//! leave the worker:
//!
//! 1. No candidates: nothing to do.
//! 2. Gate: the slowest authoritative cell must not be ahead of the slowest
//!    known neighbour (`min_auth <= min_neighbour`), otherwise nothing is
//!    committed and the worker waits for the rest of the grid.
//! 3. All authoritative cells on one generation: commit everything.
//! 4. Authoritative cells one generation apart: commit only the trailing
//!    cells, i.e. candidates moving to `min_auth + 1`. The leading cells'
//!    results are dropped and recomputed on a later tick.
//!
//! Authoritative cells two or more generations apart cannot happen under
//! this protocol and are reported as [`CoreError::GenerationSpread`].

use crate::advancement::{AdvancementScan, Candidate};
use crate::error::CoreError;
use life_env::{CellStatePatch, CellStatus, OutboundUpdate};

/// What the batcher decided for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitDecision {
    /// No cell was eligible.
    Idle,

    /// Authoritative cells are ahead of the slowest neighbour.
    Gated { min_auth: u64, min_neighbour: u64 },

    /// All authoritative cells share a generation; every candidate commits.
    CommitAll(Vec<Candidate>),

    /// Only the trailing generation commits.
    CommitTrailing {
        /// Generation the committed cells move to
        generation: u64,
        commits: Vec<Candidate>,
        withheld: usize,
    },
}

impl CommitDecision {
    /// Candidates that will be emitted.
    pub fn commits(&self) -> &[Candidate] {
        match self {
            CommitDecision::CommitAll(commits) => commits,
            CommitDecision::CommitTrailing { commits, .. } => commits,
            CommitDecision::Idle | CommitDecision::Gated { .. } => &[],
        }
    }

    pub fn withheld(&self) -> usize {
        match self {
            CommitDecision::CommitTrailing { withheld, .. } => *withheld,
            _ => 0,
        }
    }

    /// Short name for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            CommitDecision::Idle => "idle",
            CommitDecision::Gated { .. } => "gated",
            CommitDecision::CommitAll(_) => "commit_all",
            CommitDecision::CommitTrailing { .. } => "commit_trailing",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommitBatcher;

impl CommitBatcher {
    pub fn new() -> Self {
        Self
    }

    /// Applies the gating and batching rules to one tick's scan.
    pub fn decide(&self, scan: &AdvancementScan) -> Result<CommitDecision, CoreError> {
        let candidates: Vec<Candidate> = scan.candidates().copied().collect();
        if candidates.is_empty() {
            return Ok(CommitDecision::Idle);
        }

        let bounds = scan.bounds;
        let (min_auth, max_auth) = match (bounds.min_auth, bounds.max_auth) {
            (Some(min), Some(max)) => (min, max),
            // Candidates only come from authoritative cells with records.
            _ => return Ok(CommitDecision::Idle),
        };

        if let Some(min_neighbour) = bounds.min_neighbour {
            if min_auth > min_neighbour {
                return Ok(CommitDecision::Gated {
                    min_auth,
                    min_neighbour,
                });
            }
        }

        match max_auth - min_auth {
            0 => Ok(CommitDecision::CommitAll(candidates)),
            1 => Ok(Self::trailing(candidates, min_auth)),
            _ => Err(CoreError::GenerationSpread {
                min: min_auth,
                max: max_auth,
            }),
        }
    }

    /// Keeps only candidates leaving `min_auth`.
    ///
    /// Used for the one-generation skew, and by the worker to keep the
    /// lagging cells moving after a [`CoreError::GenerationSpread`].
    pub fn trailing(candidates: Vec<Candidate>, min_auth: u64) -> CommitDecision {
        let total = candidates.len();
        let commits: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| c.generation() == min_auth + 1)
            .collect();

        CommitDecision::CommitTrailing {
            generation: min_auth + 1,
            withheld: total - commits.len(),
            commits,
        }
    }

    /// Turns committed candidates into outbound field updates.
    ///
    /// Each cell yields two independent updates: the generation/liveness
    /// request, then the cosmetic status label.
    pub fn emit(commits: &[Candidate]) -> Vec<OutboundUpdate> {
        commits
            .iter()
            .flat_map(|candidate| {
                [
                    OutboundUpdate::new(candidate.id, candidate.transition_patch()),
                    OutboundUpdate::new(
                        candidate.id,
                        CellStatePatch::status(CellStatus::from_alive(candidate.alive)),
                    ),
                ]
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advancement::{scan, Eligibility, GenerationBounds};
    use crate::cell_store::CellStore;
    use life_env::{CellId, CellSnapshot, Parity};

    fn candidate(id: u64, from_generation: u64) -> Candidate {
        Candidate {
            id: CellId(id),
            from_generation,
            live_neighbours: 0,
            alive: false,
        }
    }

    fn scan_of(candidates: &[Candidate], bounds: GenerationBounds) -> AdvancementScan {
        AdvancementScan {
            evaluations: candidates
                .iter()
                .map(|c| (c.id, Eligibility::Eligible(*c)))
                .collect(),
            bounds,
        }
    }

    fn bounds(min_auth: u64, max_auth: u64, min_neighbour: u64) -> GenerationBounds {
        GenerationBounds {
            min_auth: Some(min_auth),
            max_auth: Some(max_auth),
            min_neighbour: Some(min_neighbour),
            max_neighbour: Some(max_auth + 1),
        }
    }

    #[test]
    fn test_no_candidates_is_idle() {
        let decision = CommitBatcher::new()
            .decide(&scan_of(&[], bounds(3, 3, 3)))
            .unwrap();
        assert_eq!(decision, CommitDecision::Idle);
        assert!(decision.commits().is_empty());
    }

    #[test]
    fn test_gate_blocks_when_ahead_of_slowest_neighbour() {
        let decision = CommitBatcher::new()
            .decide(&scan_of(&[candidate(1, 4)], bounds(4, 4, 3)))
            .unwrap();
        assert_eq!(
            decision,
            CommitDecision::Gated {
                min_auth: 4,
                min_neighbour: 3
            }
        );
    }

    #[test]
    fn test_single_generation_commits_all() {
        let all = [candidate(1, 3), candidate(2, 3), candidate(3, 3)];
        let decision = CommitBatcher::new()
            .decide(&scan_of(&all, bounds(3, 3, 3)))
            .unwrap();
        assert_eq!(decision, CommitDecision::CommitAll(all.to_vec()));
    }

    #[test]
    fn test_skew_commits_only_trailing() {
        let decision = CommitBatcher::new()
            .decide(&scan_of(&[candidate(1, 3), candidate(2, 4)], bounds(3, 4, 3)))
            .unwrap();
        assert_eq!(
            decision,
            CommitDecision::CommitTrailing {
                generation: 4,
                commits: vec![candidate(1, 3)],
                withheld: 1,
            }
        );
    }

    #[test]
    fn test_wide_spread_is_reported() {
        let err = CommitBatcher::new()
            .decide(&scan_of(&[candidate(1, 3)], bounds(3, 5, 3)))
            .unwrap_err();
        assert!(matches!(err, CoreError::GenerationSpread { min: 3, max: 5 }));
    }

    #[test]
    fn test_no_known_neighbours_passes_gate() {
        let decision = CommitBatcher::new()
            .decide(&scan_of(
                &[candidate(1, 0)],
                GenerationBounds {
                    min_auth: Some(0),
                    max_auth: Some(0),
                    ..GenerationBounds::default()
                },
            ))
            .unwrap();
        assert_eq!(decision.commits().len(), 1);
    }

    #[test]
    fn test_emit_produces_state_and_label() {
        let mut c = candidate(7, 2);
        c.alive = true;
        let updates = CommitBatcher::emit(&[c]);

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].id, CellId(7));
        assert_eq!(updates[0].patch, CellStatePatch::transition(3, Parity::Odd, true));
        assert_eq!(updates[1].patch, CellStatePatch::status(CellStatus::Alive));
    }

    #[test]
    fn test_gate_uses_ineligible_cells_for_bounds() {
        // Cell 1 (gen 4) is eligible, cell 2 (gen 4) is blocked by a neighbour
        // at gen 2 that also drags min_neighbour below min_auth.
        let mut store = CellStore::new();
        for (id, neighbours, generation) in [
            (1u64, vec![3u64], 4u64),
            (2, vec![4], 4),
            (3, vec![1], 4),
            (4, vec![2], 2),
        ] {
            let mut s = CellSnapshot::new(CellId(id), neighbours.into_iter().map(CellId).collect());
            s.generation = generation;
            store.upsert_initial(&s).unwrap();
        }
        store.set_authority(CellId(1), true).unwrap();
        store.set_authority(CellId(2), true).unwrap();

        let decision = CommitBatcher::new().decide(&scan(&store)).unwrap();
        assert_eq!(
            decision,
            CommitDecision::Gated {
                min_auth: 4,
                min_neighbour: 2
            }
        );
    }
}
