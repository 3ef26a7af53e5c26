//! Worker configuration.

use crate::error::{CoreError, CoreResult};
use life_env::CellId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// What to do when a creation event names a cell that is already stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationPolicy {
    /// Report `DuplicateCell` and keep the stored record.
    #[default]
    Reject,

    /// Treat the repeated snapshot as a replicated update.
    Merge,
}

/// Configuration for a Life worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker's logical name (for logging)
    pub name: String,

    /// Ticks per second (default: 1)
    pub tick_rate_hz: u32,

    /// Bounded wait for inbound ops at the top of each tick (default: 100ms)
    pub poll_timeout_ms: u64,

    /// Number of cells the worker must see before it starts advancing.
    /// `None` starts immediately.
    pub expected_cells: Option<usize>,

    /// Cells switched on by the one-shot seeding pass, if owned locally.
    pub seed_cells: Vec<CellId>,

    pub creation_policy: CreationPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "life-worker".to_string(),
            tick_rate_hz: 1,
            poll_timeout_ms: 100,
            expected_cells: None,
            seed_cells: Vec::new(),
            creation_policy: CreationPolicy::Reject,
        }
    }
}

impl WorkerConfig {
    /// Loads a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CoreError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> CoreResult<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.tick_rate_hz == 0 {
            return Err(CoreError::Config("tick_rate_hz must be positive".to_string()));
        }
        Ok(())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_expected_cells(mut self, count: usize) -> Self {
        self.expected_cells = Some(count);
        self
    }

    pub fn with_seed_cells(mut self, cells: Vec<CellId>) -> Self {
        self.seed_cells = cells;
        self
    }

    pub fn with_creation_policy(mut self, policy: CreationPolicy) -> Self {
        self.creation_policy = policy;
        self
    }

    /// Duration of one tick frame.
    pub fn frame(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz.max(1) as f64)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}
