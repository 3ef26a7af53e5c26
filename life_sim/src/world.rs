//! SimWorld - The simulation harness container.

use crate::context::SimContext;
use crate::runtime::{AuthorityLayout, SimRuntime};
use crate::snapshot::GridSnapshot;
use crate::transport::SimTransport;

use life_core::{
    CoreError, CoreResult, LifeWorker, Shutdown, TickOutcome, TickReport, WorkerConfig,
    WorkerStats,
};
use life_env::{CellId, LifeContext, WorkerId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Number of workers to spawn
    pub workers: usize,

    pub layout: AuthorityLayout,

    /// Default link latency in ticks
    pub latency_ticks: u64,

    /// Maximum random extra delay per op, in ticks
    pub jitter_ticks: u64,

    /// Per-worker latency overrides: (worker index, ticks)
    pub slow_workers: Vec<(usize, u64)>,

    /// Cells the workers switch on once their view is complete
    pub seed_cells: Vec<CellId>,

    /// Base configuration every worker is derived from
    pub worker_template: WorkerConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            workers: 1,
            layout: AuthorityLayout::Stripes,
            latency_ticks: 0,
            jitter_ticks: 0,
            slow_workers: Vec::new(),
            seed_cells: Vec::new(),
            worker_template: WorkerConfig::default().with_tick_rate(30),
        }
    }
}

/// The SimWorld - runtime plus every worker, stepped in lock-step.
pub struct SimWorld {
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    runtime: SimRuntime,
    workers: Vec<LifeWorker<SimContext, SimTransport>>,

    /// Why each worker stopped, once it has
    stopped: Vec<Option<Shutdown>>,

    frame: Duration,
    tick_count: u64,
}

impl SimWorld {
    /// Builds the runtime from `snapshot` and attaches `config.workers` workers.
    pub fn new(config: SimConfig, snapshot: &GridSnapshot) -> CoreResult<Self> {
        if config.workers == 0 {
            return Err(CoreError::Config("at least one worker is required".to_string()));
        }
        config.worker_template.validate()?;

        // Derive separate seeds for different subsystems
        let context = SimContext::shared(config.seed);
        let mut runtime = SimRuntime::new(snapshot, config.seed.wrapping_mul(0x9e3779b97f4a7c15))
            .with_jitter(config.jitter_ticks);

        let mut workers = Vec::with_capacity(config.workers);
        for i in 0..config.workers {
            let latency = config
                .slow_workers
                .iter()
                .find(|(index, _)| *index == i)
                .map(|(_, ticks)| *ticks)
                .unwrap_or(config.latency_ticks);
            let transport = runtime.connect(WorkerId::from_seed(i as u64), latency);

            let mut worker_config = config
                .worker_template
                .clone()
                .with_name(format!("{}-{}", config.worker_template.name, i))
                .with_poll_timeout(Duration::ZERO)
                .with_seed_cells(config.seed_cells.clone());
            if worker_config.expected_cells.is_none() {
                worker_config = worker_config.with_expected_cells(snapshot.len());
            }

            workers.push(LifeWorker::new(
                Arc::clone(&context),
                Arc::new(transport),
                worker_config,
            ));
        }

        runtime.assign_layout(snapshot, config.layout);
        runtime.announce();

        info!(
            "World ready: {} cells, {} workers ({}), latency={} jitter={}",
            snapshot.len(),
            config.workers,
            config.layout.name(),
            config.latency_ticks,
            config.jitter_ticks
        );

        Ok(Self {
            frame: config.worker_template.frame(),
            stopped: vec![None; config.workers],
            config,
            context,
            runtime,
            workers,
            tick_count: 0,
        })
    }

    /// Advances the simulation by one tick.
    ///
    /// Due ops are delivered, every running worker ticks once (its updates
    /// are routed straight after), then the virtual clock moves one frame.
    pub async fn step(&mut self) -> CoreResult<Vec<TickReport>> {
        self.runtime.advance();
        self.runtime.deliver_due();

        let mut reports = Vec::with_capacity(self.workers.len());
        for (worker, stopped) in self.workers.iter_mut().zip(self.stopped.iter_mut()) {
            if stopped.is_some() {
                continue;
            }
            match worker.tick().await? {
                TickOutcome::Continue(report) => reports.push(report),
                TickOutcome::Stopped(shutdown) => {
                    info!(worker = %worker.worker_id, "Worker stopped: {:?}", shutdown);
                    *stopped = Some(shutdown);
                }
            }
            self.runtime.route();
        }

        self.context.advance_time(self.frame);
        self.tick_count += 1;
        debug!(
            "Tick {} | generations {:?} | in flight {}",
            self.tick_count,
            self.runtime.generation_range(),
            self.runtime.in_flight()
        );
        Ok(reports)
    }

    /// Steps until `done` holds or `max_ticks` more ticks have run.
    /// Returns whether `done` was reached.
    pub async fn run_until<F>(&mut self, mut done: F, max_ticks: u64) -> CoreResult<bool>
    where
        F: FnMut(&SimWorld) -> bool,
    {
        for _ in 0..max_ticks {
            if done(self) {
                return Ok(true);
            }
            self.step().await?;
        }
        Ok(done(self))
    }

    /// Disconnects every worker and lets each observe it.
    pub async fn shutdown(&mut self, reason: &str) -> CoreResult<Vec<Shutdown>> {
        self.runtime.shutdown(reason);
        for (worker, stopped) in self.workers.iter_mut().zip(self.stopped.iter_mut()) {
            while stopped.is_none() {
                if let TickOutcome::Stopped(shutdown) = worker.tick().await? {
                    *stopped = Some(shutdown);
                }
            }
        }
        self.runtime.route();
        Ok(self.stopped.iter().flatten().cloned().collect())
    }

    pub fn runtime(&self) -> &SimRuntime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut SimRuntime {
        &mut self.runtime
    }

    pub fn workers(&self) -> &[LifeWorker<SimContext, SimTransport>] {
        &self.workers
    }

    pub fn worker_stats(&self) -> impl Iterator<Item = &WorkerStats> {
        self.workers.iter().map(|w| w.stats())
    }

    pub fn is_stopped(&self, index: usize) -> bool {
        self.stopped.get(index).is_some_and(|s| s.is_some())
    }

    /// Slowest canonical generation.
    pub fn min_generation(&self) -> u64 {
        self.runtime.generation_range().map(|(min, _)| min).unwrap_or(0)
    }

    pub fn max_generation(&self) -> u64 {
        self.runtime.generation_range().map(|(_, max)| max).unwrap_or(0)
    }

    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    /// Returns the current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Topology;

    fn block_world(workers: usize) -> SimWorld {
        // A 2x2 block is a still life.
        let snapshot = GridSnapshot::generate(6, 6, Topology::Toroidal)
            .with_live(&[(2, 2), (2, 3), (3, 2), (3, 3)])
            .unwrap();
        let config = SimConfig {
            workers,
            ..SimConfig::default()
        };
        SimWorld::new(config, &snapshot).unwrap()
    }

    #[test]
    fn test_zero_workers_rejected() {
        let snapshot = GridSnapshot::generate(2, 2, Topology::Bounded);
        let config = SimConfig {
            workers: 0,
            ..SimConfig::default()
        };
        assert!(matches!(
            SimWorld::new(config, &snapshot),
            Err(CoreError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_step_advances_clock() {
        let mut world = block_world(1);
        assert_eq!(world.tick_count(), 0);
        assert_eq!(world.time(), 0.0);

        world.step().await.unwrap();

        assert_eq!(world.tick_count(), 1);
        assert!((world.time() - 1.0 / 30.0).abs() < 0.0001);
    }

    #[tokio::test]
    async fn test_two_workers_make_progress() {
        let mut world = block_world(2);
        let reached = world.run_until(|w| w.min_generation() >= 5, 100).await.unwrap();
        assert!(reached);
        assert!(world.max_generation() - world.min_generation() <= 1);
        assert_eq!(world.runtime().metrics().acl_violations, 0);

        for cell in world.runtime().cells() {
            let (x, y) = (((cell.id.0 - 1) / 6), ((cell.id.0 - 1) % 6));
            let in_block = (2..=3).contains(&x) && (2..=3).contains(&y);
            assert_eq!(cell.is_alive(), in_block, "{} at generation {}", cell.id, cell.generation);
        }
    }

    #[tokio::test]
    async fn test_shutdown_stops_everyone() {
        let mut world = block_world(3);
        world.step().await.unwrap();
        let reasons = world.shutdown("test over").await.unwrap();

        assert_eq!(reasons.len(), 3);
        assert!(reasons
            .iter()
            .all(|r| *r == Shutdown::Disconnected("test over".to_string())));
        assert!(world.is_stopped(2));

        // Stopped workers are skipped.
        assert!(world.step().await.unwrap().is_empty());
    }
}
