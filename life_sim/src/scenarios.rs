//! Simulation scenarios.

use crate::runtime::AuthorityLayout;
use crate::snapshot::{Topology, CLASSIC_SEED};
use life_env::CellId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// LIFE-001: the original single-worker blinker, seeded by the worker
    Blinker,

    /// LIFE-002: a glider crossing worker boundaries
    Glider,

    /// LIFE-003: random soup with interleaved ownership and jitter
    Soup,

    /// LIFE-004: one worker on a much slower link
    SlowLink,
}

/// Everything needed to build a world for one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioSetup {
    pub width: usize,
    pub height: usize,
    pub topology: Topology,
    pub workers: usize,
    pub layout: AuthorityLayout,
    pub latency_ticks: u64,
    pub jitter_ticks: u64,

    /// Per-worker latency overrides: (worker index, ticks)
    pub slow_workers: Vec<(usize, u64)>,

    /// Alive at generation 0 in the snapshot
    pub live: Vec<(usize, usize)>,

    /// Switched on by their owning worker once its view is complete
    pub seed_cells: Vec<CellId>,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Blinker,
            ScenarioId::Glider,
            ScenarioId::Soup,
            ScenarioId::SlowLink,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Blinker => "blinker",
            ScenarioId::Glider => "glider",
            ScenarioId::Soup => "soup",
            ScenarioId::SlowLink => "slow_link",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Blinker => "10x10 bounded grid, one worker, worker-seeded blinker",
            ScenarioId::Glider => "8x8 torus, two column stripes, glider crossing the seam",
            ScenarioId::Soup => "12x12 torus, three workers dealt round-robin, 35% soup, jittery links",
            ScenarioId::SlowLink => "12x12 torus, three stripes, one worker 4 ticks behind the rest",
        }
    }

    /// Builds the scenario's world layout. `seed` only matters for soups.
    pub fn setup(&self, seed: u64) -> ScenarioSetup {
        match self {
            ScenarioId::Blinker => ScenarioSetup {
                width: 10,
                height: 10,
                topology: Topology::Bounded,
                workers: 1,
                layout: AuthorityLayout::Single,
                latency_ticks: 0,
                jitter_ticks: 0,
                slow_workers: Vec::new(),
                live: Vec::new(),
                seed_cells: CLASSIC_SEED.to_vec(),
            },
            ScenarioId::Glider => ScenarioSetup {
                width: 8,
                height: 8,
                topology: Topology::Toroidal,
                workers: 2,
                layout: AuthorityLayout::Stripes,
                latency_ticks: 1,
                jitter_ticks: 0,
                slow_workers: Vec::new(),
                live: vec![(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)],
                seed_cells: Vec::new(),
            },
            ScenarioId::Soup => ScenarioSetup {
                width: 12,
                height: 12,
                topology: Topology::Toroidal,
                workers: 3,
                layout: AuthorityLayout::RoundRobin,
                latency_ticks: 1,
                jitter_ticks: 2,
                slow_workers: Vec::new(),
                live: soup(12, 12, 0.35, seed),
                seed_cells: Vec::new(),
            },
            ScenarioId::SlowLink => ScenarioSetup {
                width: 12,
                height: 12,
                topology: Topology::Toroidal,
                workers: 3,
                layout: AuthorityLayout::Stripes,
                latency_ticks: 0,
                jitter_ticks: 1,
                slow_workers: vec![(2, 4)],
                live: soup(12, 12, 0.3, seed),
                seed_cells: Vec::new(),
            },
        }
    }

    /// True when liveness is switched on by workers rather than the snapshot.
    pub fn is_worker_seeded(&self) -> bool {
        matches!(self, ScenarioId::Blinker)
    }
}

/// Random positions with the given density, reproducible from `seed`.
pub fn soup(width: usize, height: usize, density: f64, seed: u64) -> Vec<(usize, usize)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut live = Vec::new();
    for x in 0..width {
        for y in 0..height {
            if rng.gen_bool(density) {
                live.push((x, y));
            }
        }
    }
    live
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blinker" | "life-001" => Ok(ScenarioId::Blinker),
            "glider" | "life-002" => Ok(ScenarioId::Glider),
            "soup" | "life-003" => Ok(ScenarioId::Soup),
            "slow_link" | "slowlink" | "life-004" => Ok(ScenarioId::SlowLink),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
