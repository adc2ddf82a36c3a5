//! Round schedulers
//!
//! [`PhasedScheduler`] drives the two-phase worker pool. The sequential
//! variant steps the whole grid row-major on the calling thread and serves
//! as the reference for the parallel one.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::agent::behavior::{sweep_rows, StepContext};
use crate::core::error::Result;
use crate::core::types::Round;
use crate::simulation::gate::CancelToken;
use crate::simulation::phase::{Parity, Phase, PhaseSignals, WorkerPlan};
use crate::simulation::worker::WorkerShared;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerMode {
    #[default]
    Phased,
    Sequential,
}

/// Stops a running pool from any thread
#[derive(Clone)]
pub struct CancelHandle {
    token: CancelToken,
    phases: Vec<Arc<PhaseSignals>>,
}

impl CancelHandle {
    pub(crate) fn new(token: CancelToken, phases: Vec<Arc<PhaseSignals>>) -> Self {
        Self { token, phases }
    }

    /// Raise the cancel flag and wake every blocked worker and waiter
    pub fn cancel(&self) {
        self.token.cancel();
        for signals in &self.phases {
            signals.interrupt();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .field("phases", &self.phases.len())
            .finish()
    }
}

/// Even and odd phase over one fixed worker pool
pub struct PhasedScheduler {
    plan: WorkerPlan,
    // Indexed by `Parity::offset`
    phases: [Phase; 2],
}

impl PhasedScheduler {
    pub(crate) fn spawn(
        plan: WorkerPlan,
        shared: &WorkerShared,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let even = Phase::spawn(Parity::Even, &plan, shared, cancel.clone())?;
        let odd = Phase::spawn(Parity::Odd, &plan, shared, cancel.clone())?;
        tracing::debug!(
            workers = plan.overall(),
            rows_per_worker = plan.rows_per_worker(),
            "worker pool started"
        );
        Ok(Self { plan, phases: [even, odd] })
    }

    pub fn plan(&self) -> &WorkerPlan {
        &self.plan
    }

    pub fn phase(&self, parity: Parity) -> &Phase {
        &self.phases[parity.offset()]
    }

    /// Run both phases back to back, first phase drawn from `rng`.
    ///
    /// Returns the parity that ran first.
    pub(crate) fn run_round<R, F>(&self, round: Round, rng: &mut R, between: F) -> Result<Parity>
    where
        R: Rng + ?Sized,
        F: FnOnce(),
    {
        let first = if rng.gen::<bool>() { Parity::Even } else { Parity::Odd };
        self.phase(first).run(round)?;
        between();
        self.phase(first.other()).run(round)?;
        Ok(first)
    }

    pub(crate) fn signals(&self) -> Vec<Arc<PhaseSignals>> {
        self.phases.iter().map(Phase::signals).collect()
    }

    pub fn shutdown(&mut self) {
        for phase in &mut self.phases {
            phase.shutdown();
        }
    }
}

pub enum Scheduler {
    Phased(PhasedScheduler),
    Sequential,
}

impl Scheduler {
    pub(crate) fn start(
        mode: SchedulerMode,
        plan: WorkerPlan,
        shared: &WorkerShared,
        cancel: &CancelToken,
    ) -> Result<Self> {
        match mode {
            SchedulerMode::Phased => {
                PhasedScheduler::spawn(plan, shared, cancel).map(Scheduler::Phased)
            }
            SchedulerMode::Sequential => Ok(Scheduler::Sequential),
        }
    }

    pub fn mode(&self) -> SchedulerMode {
        match self {
            Scheduler::Phased(_) => SchedulerMode::Phased,
            Scheduler::Sequential => SchedulerMode::Sequential,
        }
    }

    /// Step every agent once for `round`, calling `between` after the first phase
    pub(crate) fn run_round<R, F>(
        &self,
        shared: &WorkerShared,
        round: Round,
        rng: &mut R,
        between: F,
    ) -> Result<()>
    where
        R: Rng + ?Sized,
        F: FnOnce(),
    {
        match self {
            Scheduler::Phased(phased) => phased.run_round(round, rng, between).map(|_| ()),
            Scheduler::Sequential => {
                // SAFETY: a sequential scheduler owns no worker threads.
                unsafe { sweep_all(shared, round) };
                Ok(())
            }
        }
    }

    pub fn cancel_handle(&self, token: &CancelToken) -> CancelHandle {
        let phases = match self {
            Scheduler::Phased(phased) => phased.signals(),
            Scheduler::Sequential => Vec::new(),
        };
        CancelHandle::new(token.clone(), phases)
    }

    pub fn shutdown(&mut self) {
        if let Scheduler::Phased(phased) = self {
            phased.shutdown();
        }
    }
}

/// Step every agent still waiting this round, row-major, on this thread.
///
/// # Safety
/// No worker thread may be stepping `shared.grid` during the call.
pub(crate) unsafe fn sweep_all(shared: &WorkerShared, round: Round) -> usize {
    let ctx = StepContext::new(&shared.grid, &shared.counters, &shared.rules, round);
    sweep_rows(&ctx, 0..shared.grid.height())
}
