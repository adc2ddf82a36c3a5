//! Checkerboard phases
//!
//! Rows are cut into `overall` contiguous blocks. Even blocks belong to the
//! even phase and odd blocks to the odd phase; the two phases run one after
//! the other, so workers that run together never own neighboring blocks.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crate::core::error::{Result, WatorError};
use crate::core::types::Round;
use crate::simulation::gate::{CancelToken, Countdown, Gate};
use crate::simulation::worker::{PhaseWorker, WorkerShared};

/// Fewest rows a block may hold once more than one worker shares a phase
pub const MIN_BLOCK_ROWS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub const BOTH: [Parity; 2] = [Parity::Even, Parity::Odd];

    pub fn offset(self) -> usize {
        match self {
            Parity::Even => 0,
            Parity::Odd => 1,
        }
    }

    pub fn other(self) -> Parity {
        match self {
            Parity::Even => Parity::Odd,
            Parity::Odd => Parity::Even,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Parity::Even => "even",
            Parity::Odd => "odd",
        }
    }
}

/// How many workers run and which rows each one owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPlan {
    height: usize,
    overall: usize,
    rows_per_worker: usize,
}

impl WorkerPlan {
    /// Size the pool for `processors` cores times `factor`.
    ///
    /// The total is rounded down to an even number (at least 2) and halved
    /// while blocks would be thinner than [`MIN_BLOCK_ROWS`].
    pub fn new(height: usize, processors: usize, factor: usize) -> Self {
        let even = |n: usize| (n / 2 * 2).max(2);

        let mut overall = even(processors.max(1).saturating_mul(factor.max(1)));
        while overall > 2 && height / overall < MIN_BLOCK_ROWS {
            overall = even(overall / 2);
        }

        Self {
            height,
            overall,
            rows_per_worker: height / overall,
        }
    }

    /// Plan for the cores this process may use
    pub fn for_host(height: usize, factor: usize) -> Self {
        let processors = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self::new(height, processors, factor)
    }

    pub fn overall(&self) -> usize {
        self.overall
    }

    pub fn per_phase(&self) -> usize {
        self.overall / 2
    }

    pub fn rows_per_worker(&self) -> usize {
        self.rows_per_worker
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Rows of block `block`; the last block runs to the bottom row
    pub fn block(&self, block: usize) -> Range<usize> {
        let start = block * self.rows_per_worker;
        let end = if block + 1 == self.overall {
            self.height
        } else {
            start + self.rows_per_worker
        };
        start..end
    }

    /// Row blocks owned by the workers of one phase
    pub fn ranges(&self, parity: Parity) -> Vec<Range<usize>> {
        (parity.offset()..self.overall)
            .step_by(2)
            .map(|block| self.block(block))
            .collect()
    }
}

/// Gates and counters one phase's workers listen to
pub struct PhaseSignals {
    pub(crate) go: Gate,
    pub(crate) barrier: Gate,
    pub(crate) ready: Countdown,
    pub(crate) round: AtomicU64,
    pub(crate) active: AtomicBool,
}

impl PhaseSignals {
    fn new(workers: usize) -> Self {
        Self {
            go: Gate::new(),
            barrier: Gate::new(),
            ready: Countdown::new(workers),
            round: AtomicU64::new(0),
            active: AtomicBool::new(true),
        }
    }

    /// Wake everything blocked on this phase
    pub(crate) fn interrupt(&self) {
        self.go.interrupt();
        self.barrier.interrupt();
        self.ready.interrupt();
    }
}

/// Half of the worker pool
pub struct Phase {
    parity: Parity,
    signals: Arc<PhaseSignals>,
    workers: Vec<PhaseWorker>,
    cancel: CancelToken,
}

impl Phase {
    pub(crate) fn spawn(
        parity: Parity,
        plan: &WorkerPlan,
        shared: &WorkerShared,
        cancel: CancelToken,
    ) -> Result<Self> {
        let ranges = plan.ranges(parity);
        let signals = Arc::new(PhaseSignals::new(ranges.len()));
        let mut phase = Self {
            parity,
            signals,
            workers: Vec::with_capacity(ranges.len()),
            cancel,
        };

        for (slot, rows) in ranges.into_iter().enumerate() {
            // On error `phase` drops and joins the workers spawned so far
            let worker = PhaseWorker::spawn(
                parity,
                slot,
                rows,
                Arc::clone(&phase.signals),
                shared.clone(),
                phase.cancel.clone(),
            )?;
            phase.workers.push(worker);
        }

        Ok(phase)
    }

    pub fn parity(&self) -> Parity {
        self.parity
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn worker_rows(&self) -> Vec<Range<usize>> {
        self.workers.iter().map(PhaseWorker::rows).collect()
    }

    pub(crate) fn signals(&self) -> Arc<PhaseSignals> {
        Arc::clone(&self.signals)
    }

    /// Release the workers into `round`
    pub(crate) fn start(&self, round: Round) {
        self.signals.round.store(round, Ordering::Release);
        self.signals.barrier.close();
        self.signals.go.open();
    }

    /// Block until every worker finished its rows, then park them on the barrier
    pub(crate) fn wait_for_end(&self) -> Result<()> {
        if !self.signals.ready.wait(&self.cancel) {
            return Err(WatorError::Cancelled);
        }
        self.signals.go.close();
        self.signals.barrier.open();
        self.signals.ready.reset();
        Ok(())
    }

    pub(crate) fn run(&self, round: Round) -> Result<()> {
        self.start(round);
        self.wait_for_end()
    }

    /// Stop and join every worker. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.signals.active.store(false, Ordering::Release);
        self.signals.go.open();
        self.signals.barrier.open();
        self.signals.interrupt();
        for worker in &mut self.workers {
            worker.join();
        }
        self.workers.clear();
        tracing::debug!(phase = self.parity.label(), "phase stopped");
    }
}

impl Drop for Phase {
    fn drop(&mut self) {
        self.shutdown();
    }
}
