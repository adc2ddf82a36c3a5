//! Wa-Tor - parallel predator-prey simulation on a torus
//!
//! Prey and predators live on a wrapping grid. Each round a fixed pool of
//! worker threads steps every agent once, split into an even and an odd
//! phase so that workers running together never touch neighboring rows.

pub mod agent;
pub mod core;
pub mod simulation;
pub mod world;

pub use crate::core::config::WatorConfig;
pub use crate::core::error::{Result, WatorError};
pub use crate::simulation::{RoundSummary, Simulation, SimulationEvent, SimulationLoop};
