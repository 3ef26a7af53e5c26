//! Ground truth oracle for simulation.
//!
//! The Oracle steps the whole grid in lock-step, one generation at a time,
//! from the same snapshot the workers start from. Whatever generation a
//! cell has reached in the distributed run, its published liveness must
//! match the oracle's value for that cell at that generation.

use crate::snapshot::GridSnapshot;
use life_core::next_alive;
use life_env::CellId;
use std::collections::HashMap;

pub struct Oracle {
    index: HashMap<CellId, usize>,
    neighbours: Vec<Vec<usize>>,

    /// Liveness per generation, indexed like `neighbours`
    history: Vec<Vec<bool>>,
}

impl Oracle {
    pub fn new(snapshot: &GridSnapshot) -> Self {
        let index: HashMap<CellId, usize> = snapshot
            .cells
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, i))
            .collect();
        let neighbours = snapshot
            .cells
            .iter()
            .map(|c| c.neighbours.iter().filter_map(|n| index.get(n).copied()).collect())
            .collect();
        let initial = snapshot.cells.iter().map(|c| c.alive_even).collect();

        Self {
            index,
            neighbours,
            history: vec![initial],
        }
    }

    /// Computes one more generation.
    pub fn step(&mut self) {
        let Some(current) = self.history.last() else {
            return;
        };
        let next = self
            .neighbours
            .iter()
            .enumerate()
            .map(|(i, ns)| {
                let live = ns.iter().filter(|&&n| current[n]).count();
                next_alive(current[i], live)
            })
            .collect();
        self.history.push(next);
    }

    /// Latest generation computed so far.
    pub fn generation(&self) -> u64 {
        self.history.len() as u64 - 1
    }

    /// Liveness of `id` at `generation`, stepping forward as needed.
    /// `None` for a cell outside the snapshot.
    pub fn alive_at(&mut self, id: CellId, generation: u64) -> Option<bool> {
        let &i = self.index.get(&id)?;
        while self.generation() < generation {
            self.step();
        }
        Some(self.history[generation as usize][i])
    }

    pub fn live_count_at(&mut self, generation: u64) -> usize {
        while self.generation() < generation {
            self.step();
        }
        self.history[generation as usize].iter().filter(|&&a| a).count()
    }
}
