//! Long-lived phase worker threads

use std::ops::Range;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::agent::behavior::{sweep_rows, BehaviorRules, StepContext};
use crate::core::error::{Result, WatorError};
use crate::simulation::gate::CancelToken;
use crate::simulation::phase::{Parity, PhaseSignals};
use crate::simulation::population::PopulationCounters;
use crate::world::Grid;

/// State every worker of a simulation shares
#[derive(Clone)]
pub struct WorkerShared {
    pub grid: Arc<Grid>,
    pub counters: Arc<PopulationCounters>,
    pub rules: BehaviorRules,
}

/// A thread bound to one row block for the lifetime of the pool
pub struct PhaseWorker {
    rows: Range<usize>,
    handle: Option<JoinHandle<()>>,
}

impl PhaseWorker {
    pub(crate) fn spawn(
        parity: Parity,
        slot: usize,
        rows: Range<usize>,
        signals: Arc<PhaseSignals>,
        shared: WorkerShared,
        cancel: CancelToken,
    ) -> Result<Self> {
        let name = format!("wator-{}-{}", parity.label(), slot);
        let worker_rows = rows.clone();
        // Read here so an opening that races the thread start still counts
        let go_seen = signals.go.epoch();
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                run(parity, slot, worker_rows, go_seen, &signals, &shared, &cancel)
            })
            .map_err(WatorError::WorkerSpawn)?;

        Ok(Self { rows, handle: Some(handle) })
    }

    pub fn rows(&self) -> Range<usize> {
        self.rows.clone()
    }

    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(rows = ?self.rows, "phase worker panicked");
            }
        }
    }
}

/// Cancels the pool if a sweep panics; this worker will never report ready
struct UnwindGuard<'a> {
    signals: &'a PhaseSignals,
    cancel: &'a CancelToken,
}

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.cancel.cancel();
            self.signals.interrupt();
        }
    }
}

fn run(
    parity: Parity,
    slot: usize,
    rows: Range<usize>,
    mut go_seen: u64,
    signals: &PhaseSignals,
    shared: &WorkerShared,
    cancel: &CancelToken,
) {
    debug!(phase = parity.label(), slot, ?rows, "worker started");
    let _unwind = UnwindGuard { signals, cancel };

    loop {
        match signals.go.wait_past(go_seen, cancel) {
            Some(epoch) => go_seen = epoch,
            None => break,
        }
        if !signals.active.load(Ordering::Acquire) || cancel.is_cancelled() {
            break;
        }

        let round = signals.round.load(Ordering::Acquire);
        let ctx = StepContext::new(&shared.grid, &shared.counters, &shared.rules, round);
        // SAFETY: this phase gives `rows` to this worker alone, the other
        // phase is parked, and same-phase blocks are far enough apart that
        // no two workers write the same cell; seam writes take the seam lock.
        unsafe {
            sweep_rows(&ctx, rows.clone());
        }

        let barrier_seen = signals.barrier.epoch();
        signals.ready.signal();
        if signals.barrier.wait_past(barrier_seen, cancel).is_none() {
            break;
        }
    }

    debug!(phase = parity.label(), slot, "worker exiting");
}
