//! Grid snapshot generation and persistence.
//!
//! A snapshot is the initial world: every cell, its fixed Moore
//! neighbourhood and its generation-0 liveness. Ids are assigned
//! column-major starting at 1, so cell `(x, y)` on a grid of height `h`
//! is `x * h + y + 1`.

use life_env::{CellId, CellSnapshot};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// The original three-cell seed: a vertical blinker on a 10x10 grid.
pub const CLASSIC_SEED: [CellId; 3] = [CellId(12), CellId(13), CellId(14)];

/// Edge handling for the neighbourhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Edge cells have fewer than 8 neighbours
    Bounded,

    /// Edges wrap around
    Toroidal,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Position ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    #[error("Not a generation-0 grid: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub width: usize,
    pub height: usize,
    pub topology: Topology,

    /// Ordered by id
    pub cells: Vec<CellSnapshot>,
}

impl GridSnapshot {
    /// Builds an all-dead grid at generation 0.
    pub fn generate(width: usize, height: usize, topology: Topology) -> Self {
        let mut cells = Vec::with_capacity(width * height);
        for x in 0..width {
            for y in 0..height {
                let neighbours = moore(x, y, width, height, topology)
                    .into_iter()
                    .map(|(nx, ny)| id_of(nx, ny, height))
                    .collect();
                cells.push(CellSnapshot::new(id_of(x, y, height), neighbours));
            }
        }

        Self {
            width,
            height,
            topology,
            cells,
        }
    }

    /// Returns a copy with the given positions alive at generation 0.
    pub fn with_live(mut self, positions: &[(usize, usize)]) -> Result<Self, SnapshotError> {
        for &(x, y) in positions {
            let id = self.id_at(x, y).ok_or(SnapshotError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            })?;
            // Ids are dense and ordered, index is id - 1.
            self.cells[(id.0 - 1) as usize].alive_even = true;
        }
        Ok(self)
    }

    pub fn id_at(&self, x: usize, y: usize) -> Option<CellId> {
        (x < self.width && y < self.height).then(|| id_of(x, y, self.height))
    }

    pub fn position_of(&self, id: CellId) -> Option<(usize, usize)> {
        let index = id.0.checked_sub(1)? as usize;
        if index >= self.cells.len() {
            return None;
        }
        Some((index / self.height, index % self.height))
    }

    pub fn cell(&self, id: CellId) -> Option<&CellSnapshot> {
        let (x, y) = self.position_of(id)?;
        self.cells.get(x * self.height + y)
    }

    /// Positions alive at generation 0.
    pub fn live_positions(&self) -> Vec<(usize, usize)> {
        self.cells
            .iter()
            .filter(|c| c.alive_even)
            .filter_map(|c| self.position_of(c.id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Loads a grid written by [`GridSnapshot::save_json`]. Only complete
    /// generation-0 grids in id order are accepted.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let raw = std::fs::read_to_string(path)?;
        let grid: Self = serde_json::from_str(&raw)?;
        grid.validate()?;
        Ok(grid)
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        if self.cells.len() != self.width * self.height {
            return Err(SnapshotError::Invalid(format!(
                "{} cells for a {}x{} grid",
                self.cells.len(),
                self.width,
                self.height
            )));
        }
        for (index, cell) in self.cells.iter().enumerate() {
            if cell.id != CellId(index as u64 + 1) {
                return Err(SnapshotError::Invalid(format!(
                    "{} found where cell#{} belongs",
                    cell.id,
                    index + 1
                )));
            }
            if cell.generation != 0 {
                return Err(SnapshotError::Invalid(format!(
                    "{} is at generation {}",
                    cell.id, cell.generation
                )));
            }
        }
        Ok(())
    }
}

fn id_of(x: usize, y: usize, height: usize) -> CellId {
    CellId((x * height + y + 1) as u64)
}

fn moore(x: usize, y: usize, width: usize, height: usize, topology: Topology) -> Vec<(usize, usize)> {
    let mut out = Vec::with_capacity(8);
    for dx in [-1i64, 0, 1] {
        for dy in [-1i64, 0, 1] {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            let (nx, ny) = match topology {
                Topology::Bounded => {
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    (nx as usize, ny as usize)
                }
                Topology::Toroidal => (
                    nx.rem_euclid(width as i64) as usize,
                    ny.rem_euclid(height as i64) as usize,
                ),
            };
            // Tiny tori would otherwise list the same neighbour twice, or the cell itself.
            if (nx, ny) != (x, y) && !out.contains(&(nx, ny)) {
                out.push((nx, ny));
            }
        }
    }
    out
}
