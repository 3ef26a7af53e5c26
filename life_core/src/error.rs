//! Error types for the Life core.

use life_env::{CellId, EnvError};
use thiserror::Error;

/// Per-cell failures.
///
/// All of these are local: the offending op or cell is logged and skipped,
/// and the next tick re-evaluates from whatever the store holds by then.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    /// A creation event arrived for a cell that is already known.
    #[error("Cell {0} already exists")]
    DuplicateCell(CellId),

    /// An update, authority change or neighbour lookup named a cell that
    /// has not been created yet.
    #[error("Cell {0} is unknown")]
    UnknownCell(CellId),

    /// Not enough consistent neighbour data to advance this tick.
    #[error("Cell {id} is not eligible: {reason}")]
    Ineligible {
        id: CellId,
        reason: crate::advancement::IneligibleReason,
    },

    /// A replicated update tried to move a cell's generation backwards.
    #[error("Cell {id} generation regression: have {current}, got {incoming}")]
    GenerationRegression {
        id: CellId,
        current: u64,
        incoming: u64,
    },
}

/// Worker-level failures.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Cell(#[from] CellError),

    #[error("Transport error: {0}")]
    Transport(#[from] EnvError),

    /// Authoritative cells span more generations than the batcher can
    /// reconcile. The protocol never produces this on its own.
    #[error("Authoritative generations span {min}..={max}")]
    GenerationSpread { min: u64, max: u64 },

    #[error("Config error: {0}")]
    Config(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
