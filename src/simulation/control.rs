//! Background control thread
//!
//! `SimulationLoop` moves the simulation onto a control thread while it runs
//! and takes it back on [`SimulationLoop::stop`], so the loop can be
//! restarted and inspected between runs. Events go out on an unbounded
//! channel and the loop never waits for the consumer.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::core::config::WatorConfig;
use crate::core::error::{Result, WatorError};
use crate::core::types::Round;
use crate::simulation::engine::Simulation;
use crate::simulation::events::SimulationEvent;
use crate::simulation::scheduler::CancelHandle;

/// State that travels to the control thread and back
struct Parked {
    simulation: Simulation,
    events: Sender<SimulationEvent>,
    round_limit: Option<Round>,
    extinct_reported: bool,
    listener_gone: bool,
}

impl Parked {
    fn publish(&mut self, event: SimulationEvent) {
        if self.events.send(event).is_err() && !self.listener_gone {
            tracing::warn!("event receiver dropped, rounds continue unobserved");
            self.listener_gone = true;
        }
    }
}

struct Running {
    handle: JoinHandle<Option<Parked>>,
    cancel: CancelHandle,
}

pub struct SimulationLoop {
    parked: Option<Parked>,
    running: Option<Running>,
    receiver: Option<Receiver<SimulationEvent>>,
}

impl SimulationLoop {
    pub fn new(config: WatorConfig) -> Result<Self> {
        Ok(Self::from_simulation(Simulation::new(config)?))
    }

    pub fn from_simulation(simulation: Simulation) -> Self {
        let (events, receiver) = mpsc::channel();
        Self {
            parked: Some(Parked {
                simulation,
                events,
                round_limit: None,
                extinct_reported: false,
                listener_gone: false,
            }),
            running: None,
            receiver: Some(receiver),
        }
    }

    /// Stop issuing rounds once `round` rounds have completed
    pub fn with_round_limit(mut self, round: Round) -> Self {
        if let Some(parked) = &mut self.parked {
            parked.round_limit = Some(round);
        }
        self
    }

    /// Receiver for every event the loop publishes. Only handed out once.
    pub fn events(&mut self) -> Option<Receiver<SimulationEvent>> {
        self.receiver.take()
    }

    /// Control thread is alive and issuing rounds
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map_or(false, |running| !running.handle.is_finished())
    }

    /// The simulation while the loop is parked
    pub fn simulation(&self) -> Option<&Simulation> {
        self.parked.as_ref().map(|parked| &parked.simulation)
    }

    pub fn simulation_mut(&mut self) -> Option<&mut Simulation> {
        self.parked.as_mut().map(|parked| &mut parked.simulation)
    }

    /// Spawn workers and the control thread. No-op while already running.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        // A loop that halted on its own still has to be reclaimed
        if self.running.is_some() {
            self.join()?;
        }

        let mut parked = self.parked.take().ok_or(WatorError::ControlThreadPanicked)?;
        let cancel = match parked.simulation.start_workers() {
            Ok(cancel) => cancel,
            Err(err) => {
                self.parked = Some(parked);
                return Err(err);
            }
        };

        let (handoff, inbox) = mpsc::channel::<Parked>();
        let thread_cancel = cancel.clone();
        let spawned = thread::Builder::new()
            .name("wator-control".into())
            .spawn(move || inbox.recv().ok().map(|parked| run_rounds(parked, &thread_cancel)));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                parked.simulation.shutdown();
                self.parked = Some(parked);
                return Err(WatorError::WorkerSpawn(err));
            }
        };
        if let Err(mpsc::SendError(parked)) = handoff.send(parked) {
            self.parked = Some(parked);
            return Err(WatorError::ControlThreadPanicked);
        }

        tracing::info!("simulation loop started");
        self.running = Some(Running { handle, cancel });
        Ok(())
    }

    /// Cancel the run and wait for every thread to exit
    pub fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.as_ref() else {
            return Ok(());
        };
        running.cancel.cancel();
        self.join()?;
        tracing::info!("simulation loop stopped");
        Ok(())
    }

    /// Wait for the control thread to finish on its own.
    ///
    /// Only returns once the loop halts (round limit or extinction) unless
    /// another thread calls [`SimulationLoop::stop`].
    pub fn join(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        let mut parked = running
            .handle
            .join()
            .ok()
            .flatten()
            .ok_or(WatorError::ControlThreadPanicked)?;
        parked.simulation.shutdown();
        self.parked = Some(parked);
        Ok(())
    }
}

impl Drop for SimulationLoop {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::error!(error = %err, "simulation loop did not shut down cleanly");
        }
    }
}

fn run_rounds(mut parked: Parked, cancel: &CancelHandle) -> Parked {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        if parked.round_limit.map_or(false, |limit| parked.simulation.round() >= limit) {
            tracing::info!(round = parked.simulation.round(), "round limit reached");
            break;
        }

        let summary = match parked.simulation.step() {
            Ok(summary) => summary,
            Err(WatorError::Cancelled) => break,
            Err(err) => {
                tracing::error!(error = %err, "round failed");
                break;
            }
        };

        parked.publish(SimulationEvent::RoundCompleted(summary));
        let snapshot = parked.simulation.snapshot();
        parked.publish(SimulationEvent::Snapshot(snapshot));

        if summary.population() == 0 {
            if !parked.extinct_reported {
                parked.extinct_reported = true;
                tracing::info!(round = summary.round, "all agents extinct");
                parked.publish(SimulationEvent::Extinct { round: summary.round });
            }
            if parked.simulation.config().halt_on_extinction {
                break;
            }
        }
    }
    parked
}
