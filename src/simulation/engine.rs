//! Round-at-a-time simulation driver
//!
//! Owns the grid, the population counters and the scheduler. Workers are
//! spawned lazily on the first round (or by [`Simulation::start_workers`])
//! and live until [`Simulation::shutdown`].

use std::sync::Arc;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::agent::{AgentRecord, BehaviorRules};
use crate::core::config::WatorConfig;
use crate::core::error::{Result, WatorError};
use crate::core::types::Round;
use crate::simulation::events::RoundSummary;
use crate::simulation::gate::CancelToken;
use crate::simulation::phase::WorkerPlan;
use crate::simulation::population::PopulationCounters;
use crate::simulation::scheduler::{sweep_all, CancelHandle, Scheduler, SchedulerMode};
use crate::simulation::worker::WorkerShared;
use crate::world::{Census, Grid, Snapshot};

pub struct Simulation {
    config: WatorConfig,
    shared: WorkerShared,
    plan: WorkerPlan,
    mode: SchedulerMode,
    scheduler: Option<Scheduler>,
    cancel: CancelToken,
    order_rng: ChaCha8Rng,
    round: Round,
}

impl Simulation {
    /// Validate `config` and scatter the initial population.
    ///
    /// The population must leave at least one cell free
    /// ([`WatorConfig::check_capacity`]); that check is left to the caller.
    pub fn new(config: WatorConfig) -> Result<Self> {
        Self::with_mode(config, SchedulerMode::default())
    }

    pub fn with_mode(config: WatorConfig, mode: SchedulerMode) -> Result<Self> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let grid = Grid::initialize(&config, &mut rng)?;
        let order_rng = ChaCha8Rng::seed_from_u64(rng.gen());
        Ok(Self::assemble(config, grid, mode, order_rng))
    }

    /// Run over a prepared grid, e.g. one built with [`Grid::spawn`]
    pub fn from_grid(config: WatorConfig, grid: Grid, mode: SchedulerMode) -> Result<Self> {
        config.validate()?;
        if grid.width() != config.width || grid.height() != config.height {
            return Err(WatorError::InvalidDimensions {
                width: grid.width(),
                height: grid.height(),
            });
        }
        let order_rng = ChaCha8Rng::seed_from_u64(config.seed.unwrap_or(0));
        Ok(Self::assemble(config, grid, mode, order_rng))
    }

    fn assemble(
        config: WatorConfig,
        grid: Grid,
        mode: SchedulerMode,
        order_rng: ChaCha8Rng,
    ) -> Self {
        let counters = PopulationCounters::from_census(grid.census());
        let plan = WorkerPlan::for_host(grid.height(), config.worker_factor);
        Self {
            shared: WorkerShared {
                grid: Arc::new(grid),
                counters: Arc::new(counters),
                rules: BehaviorRules::from_config(&config),
            },
            config,
            plan,
            mode,
            scheduler: None,
            cancel: CancelToken::new(),
            order_rng,
            round: 0,
        }
    }

    /// Replace the host-derived worker plan. Takes effect on the next start.
    ///
    /// The plan must cover exactly the grid's rows.
    pub fn with_plan(mut self, plan: WorkerPlan) -> Result<Self> {
        let grid = self.shared.grid.height();
        if plan.height() != grid {
            return Err(WatorError::PlanMismatch { plan: plan.height(), grid });
        }
        self.plan = plan;
        Ok(self)
    }

    pub fn config(&self) -> &WatorConfig {
        &self.config
    }

    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }

    pub fn plan(&self) -> &WorkerPlan {
        &self.plan
    }

    /// Rounds completed so far
    pub fn round(&self) -> Round {
        self.round
    }

    pub fn grid(&self) -> &Grid {
        &self.shared.grid
    }

    pub fn counters(&self) -> &PopulationCounters {
        &self.shared.counters
    }

    /// Full-scan population count
    pub fn census(&self) -> Census {
        self.shared.grid.census()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.shared.grid.classify(self.round)
    }

    /// Every agent with its position, row-major
    pub fn agents(&self) -> Vec<AgentRecord> {
        // SAFETY: rounds need `&mut self`, so no worker is stepping now.
        unsafe { self.shared.grid.agent_records() }
    }

    pub fn workers_running(&self) -> bool {
        matches!(self.scheduler, Some(Scheduler::Phased(_)))
    }

    /// Spawn the worker pool if needed and return a handle that stops it
    pub fn start_workers(&mut self) -> Result<CancelHandle> {
        if self.scheduler.is_none() {
            let scheduler = Scheduler::start(self.mode, self.plan, &self.shared, &self.cancel)?;
            self.scheduler = Some(scheduler);
        }
        let handle = match &self.scheduler {
            Some(scheduler) => scheduler.cancel_handle(&self.cancel),
            None => CancelHandle::new(self.cancel.clone(), Vec::new()),
        };
        Ok(handle)
    }

    /// Run one full round: both phases, then the moved-flag sweep.
    ///
    /// If the pool is cancelled mid-round it is joined and the rest of the
    /// round finishes on this thread, so the grid never holds a partial round.
    pub fn step(&mut self) -> Result<RoundSummary> {
        self.step_with(|_| {})
    }

    /// [`Simulation::step`] with `between_phases` run after the first phase
    pub(crate) fn step_with<F>(&mut self, between_phases: F) -> Result<RoundSummary>
    where
        F: FnOnce(&CancelHandle),
    {
        if self.cancel.is_cancelled() {
            return Err(WatorError::Cancelled);
        }
        let handle = self.start_workers()?;

        let started = Instant::now();
        let round = self.round + 1;
        let outcome = match &self.scheduler {
            Some(scheduler) => scheduler.run_round(
                &self.shared,
                round,
                &mut self.order_rng,
                || between_phases(&handle),
            ),
            None => Ok(()),
        };

        if let Err(err) = outcome {
            warn!(round, error = %err, "round interrupted, finishing on control thread");
            self.stop_workers();
            // SAFETY: the pool has just been joined.
            unsafe {
                sweep_all(&self.shared, round);
            }
        }

        self.shared.grid.finish_round();
        self.round = round;

        let summary = RoundSummary {
            round,
            prey: self.shared.counters.prey(),
            predators: self.shared.counters.predators(),
            elapsed: started.elapsed(),
        };
        debug!(
            round,
            prey = summary.prey,
            predators = summary.predators,
            elapsed_ms = summary.elapsed_ms(),
            "round complete"
        );
        Ok(summary)
    }

    /// Run `rounds` rounds, returning every summary
    pub fn run(&mut self, rounds: usize) -> Result<Vec<RoundSummary>> {
        (0..rounds).map(|_| self.step()).collect()
    }

    fn stop_workers(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.shutdown();
        }
    }

    /// Join the pool and clear any pending cancel so the next round can run
    pub fn shutdown(&mut self) {
        self.stop_workers();
        self.cancel = CancelToken::new();
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("round", &self.round)
            .field("mode", &self.mode)
            .field("grid", &self.shared.grid)
            .field("workers_running", &self.workers_running())
            .finish()
    }
}
