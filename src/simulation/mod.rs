//! Round scheduling: phases, workers, the engine and its control loop

pub mod control;
pub mod engine;
pub mod events;
pub mod gate;
pub mod phase;
pub mod population;
pub mod scheduler;
pub mod worker;

pub use control::SimulationLoop;
pub use engine::Simulation;
pub use events::{RoundSummary, SimulationEvent};
pub use gate::{CancelToken, Countdown, Gate};
pub use phase::{Parity, Phase, WorkerPlan, MIN_BLOCK_ROWS};
pub use population::PopulationCounters;
pub use scheduler::{CancelHandle, PhasedScheduler, Scheduler, SchedulerMode};
pub use worker::{PhaseWorker, WorkerShared};
