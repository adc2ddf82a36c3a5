//! Agent values stored inside grid cells

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::core::types::{AgentId, Kind, Position, Round};

/// Kind-specific state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Species {
    Prey,
    /// `hunger` counts rounds since the last meal
    Predator { hunger: u32 },
}

impl Species {
    pub fn fresh(kind: Kind) -> Self {
        match kind {
            Kind::Prey => Species::Prey,
            Kind::Predator => Species::Predator { hunger: 0 },
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Species::Prey => Kind::Prey,
            Species::Predator { .. } => Kind::Predator,
        }
    }
}

/// A single prey or predator.
///
/// An agent is owned by exactly one cell and moves between cells by value,
/// so the cell it sits in is always its location. The per-round moved flag
/// lives in the owning cell's occupancy word rather than here, which lets the
/// end-of-round sweep run without touching agent payloads.
#[derive(Debug, Clone)]
pub struct Agent {
    id: AgentId,
    species: Species,
    age: u32,
    born_round: Round,
    rng: SmallRng,
}

impl Agent {
    pub fn new(id: AgentId, kind: Kind, born_round: Round, seed: u64) -> Self {
        Self {
            id,
            species: Species::fresh(kind),
            age: 0,
            born_round,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Builder: start at a given age
    pub fn with_age(mut self, age: u32) -> Self {
        self.age = age;
        self
    }

    /// Builder: start at a given hunger (ignored for prey)
    pub fn with_hunger(mut self, hunger: u32) -> Self {
        if let Species::Predator { hunger: h } = &mut self.species {
            *h = hunger;
        }
        self
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn kind(&self) -> Kind {
        self.species.kind()
    }

    pub fn species(&self) -> Species {
        self.species
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn hunger(&self) -> Option<u32> {
        match self.species {
            Species::Prey => None,
            Species::Predator { hunger } => Some(hunger),
        }
    }

    pub fn born_round(&self) -> Round {
        self.born_round
    }

    pub(crate) fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    pub(crate) fn grow_older(&mut self) {
        self.age = self.age.saturating_add(1);
    }

    /// Increase hunger by one round, returning the new value (0 for prey)
    pub(crate) fn go_hungry(&mut self) -> u32 {
        match &mut self.species {
            Species::Prey => 0,
            Species::Predator { hunger } => {
                *hunger = hunger.saturating_add(1);
                *hunger
            }
        }
    }

    pub(crate) fn feed(&mut self) {
        if let Species::Predator { hunger } = &mut self.species {
            *hunger = 0;
        }
    }

    /// Same-kind sibling at age 0, seeded from this agent's stream
    pub(crate) fn offspring(&mut self, id: AgentId, round: Round) -> Agent {
        let seed = self.rng.gen();
        Agent::new(id, self.kind(), round, seed)
    }

    pub fn record(&self, position: Position) -> AgentRecord {
        AgentRecord {
            id: self.id,
            position,
            kind: self.kind(),
            age: self.age,
            hunger: self.hunger(),
            born_round: self.born_round,
        }
    }
}

/// Read-only view of an agent and where it lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub position: Position,
    pub kind: Kind,
    pub age: u32,
    pub hunger: Option<u32>,
    pub born_round: Round,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_agent_is_fresh() {
        let prey = Agent::new(AgentId(1), Kind::Prey, 0, 9);
        assert_eq!(prey.age(), 0);
        assert_eq!(prey.hunger(), None);

        let predator = Agent::new(AgentId(2), Kind::Predator, 4, 9);
        assert_eq!(predator.hunger(), Some(0));
        assert_eq!(predator.born_round(), 4);
    }

    #[test]
    fn test_hunger_only_tracked_for_predators() {
        let mut prey = Agent::new(AgentId(1), Kind::Prey, 0, 1).with_hunger(5);
        assert_eq!(prey.go_hungry(), 0);
        assert_eq!(prey.hunger(), None);

        let mut predator = Agent::new(AgentId(2), Kind::Predator, 0, 1).with_hunger(5);
        assert_eq!(predator.go_hungry(), 6);
        predator.feed();
        assert_eq!(predator.hunger(), Some(0));
    }

    #[test]
    fn test_offspring_matches_kind_and_starts_young() {
        let mut parent = Agent::new(AgentId(1), Kind::Predator, 0, 3)
            .with_age(40)
            .with_hunger(7);
        let child = parent.offspring(AgentId(2), 12);

        assert_eq!(child.kind(), Kind::Predator);
        assert_eq!(child.age(), 0);
        assert_eq!(child.hunger(), Some(0));
        assert_eq!(child.born_round(), 12);
        // Parent keeps its age after breeding
        assert_eq!(parent.age(), 40);
    }

    #[test]
    fn test_offspring_stream_is_deterministic() {
        let mut a = Agent::new(AgentId(1), Kind::Prey, 0, 77);
        let mut b = Agent::new(AgentId(1), Kind::Prey, 0, 77);
        let mut child_a = a.offspring(AgentId(2), 1);
        let mut child_b = b.offspring(AgentId(2), 1);
        assert_eq!(child_a.rng().gen::<u64>(), child_b.rng().gen::<u64>());
    }
}
