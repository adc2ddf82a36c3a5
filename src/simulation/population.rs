//! Live population counters
//!
//! Workers adjust these on every birth, meal and starvation so the engine can
//! report totals without scanning the grid.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;

use crate::core::types::Kind;
use crate::world::Census;

#[derive(Debug, Default)]
pub struct PopulationCounters {
    prey: AtomicUsize,
    predators: AtomicUsize,
}

impl PopulationCounters {
    pub fn new(prey: usize, predators: usize) -> Self {
        Self {
            prey: AtomicUsize::new(prey),
            predators: AtomicUsize::new(predators),
        }
    }

    pub fn from_census(census: Census) -> Self {
        Self::new(census.prey, census.predators)
    }

    fn counter(&self, kind: Kind) -> &AtomicUsize {
        match kind {
            Kind::Prey => &self.prey,
            Kind::Predator => &self.predators,
        }
    }

    pub fn increment(&self, kind: Kind) {
        self.counter(kind).fetch_add(1, Ordering::AcqRel);
    }

    /// Saturates at zero. Returns `false` if the counter was already zero,
    /// which means it drifted from the grid.
    pub fn decrement(&self, kind: Kind) -> bool {
        let updated = self
            .counter(kind)
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if updated.is_err() {
            warn!(?kind, "population counter decremented below zero");
        }
        updated.is_ok()
    }

    pub fn get(&self, kind: Kind) -> usize {
        self.counter(kind).load(Ordering::Acquire)
    }

    pub fn prey(&self) -> usize {
        self.get(Kind::Prey)
    }

    pub fn predators(&self) -> usize {
        self.get(Kind::Predator)
    }

    pub fn total(&self) -> usize {
        self.prey() + self.predators()
    }

    /// No agent of either kind is left
    pub fn is_extinct(&self) -> bool {
        self.total() == 0
    }

    pub fn census(&self) -> Census {
        Census {
            prey: self.prey(),
            predators: self.predators(),
        }
    }
}
