//! Events published by the simulation loop

use std::time::Duration;

use serde::Serialize;

use crate::core::types::Round;
use crate::world::Snapshot;

/// Totals after one completed round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundSummary {
    pub round: Round,
    pub prey: usize,
    pub predators: usize,
    /// Wall time spent inside the round
    pub elapsed: Duration,
}

impl RoundSummary {
    pub fn population(&self) -> usize {
        self.prey + self.predators
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

#[derive(Debug, Serialize)]
pub enum SimulationEvent {
    RoundCompleted(RoundSummary),
    /// Classification of every cell, delivered right after its summary
    Snapshot(Snapshot),
    /// Sent once, on the first round that ends with no agents left
    Extinct { round: Round },
}

impl SimulationEvent {
    pub fn round(&self) -> Round {
        match self {
            SimulationEvent::RoundCompleted(summary) => summary.round,
            SimulationEvent::Snapshot(snapshot) => snapshot.round(),
            SimulationEvent::Extinct { round } => *round,
        }
    }
}
