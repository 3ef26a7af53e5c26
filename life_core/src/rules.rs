//! The B3/S23 transition rule.

/// Liveness of a cell in the next generation.
///
/// A live cell survives with 2 or 3 live neighbours; a dead cell is born
/// with exactly 3. Everything else is dead.
#[inline]
pub fn next_alive(current_alive: bool, live_neighbours: usize) -> bool {
    if current_alive {
        live_neighbours == 2 || live_neighbours == 3
    } else {
        live_neighbours == 3
    }
}
