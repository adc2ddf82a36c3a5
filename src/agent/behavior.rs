//! Per-round agent behavior
//!
//! One step of an agent:
//! age -> (predators) eat or go hungry, possibly starve -> breed or move -> mark moved
//!
//! Steps read neighbor occupancy through the atomic occupancy words and only
//! write payloads of the acting cell and one neighbor. Writes across the
//! torus seam take the seam lock for the target cell first.

use std::ops::Range;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::core::config::WatorConfig;
use crate::core::types::{CellState, Direction, Kind, Position, Round};
use crate::simulation::population::PopulationCounters;
use crate::world::Grid;

/// Thresholds that drive breeding and starvation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorRules {
    pub prey_breed_threshold: u32,
    pub predator_breed_threshold: u32,
    pub predator_starve_threshold: u32,
}

impl BehaviorRules {
    pub fn from_config(config: &WatorConfig) -> Self {
        Self {
            prey_breed_threshold: config.prey_breed_threshold,
            predator_breed_threshold: config.predator_breed_threshold,
            predator_starve_threshold: config.predator_starve_threshold,
        }
    }

    pub fn breed_threshold(&self, kind: Kind) -> u32 {
        match kind {
            Kind::Prey => self.prey_breed_threshold,
            Kind::Predator => self.predator_breed_threshold,
        }
    }
}

impl Default for BehaviorRules {
    fn default() -> Self {
        Self::from_config(&WatorConfig::default())
    }
}

/// What the breed-or-move stage did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Moved,
    Bred,
    /// No free neighbor (or it was claimed first)
    Blocked,
}

/// Result of stepping one agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Starved,
    Acted {
        ate: bool,
        action: Action,
        /// Where the agent ended the step
        at: Position,
    },
}

/// Everything a step needs besides the agent itself
pub struct StepContext<'a> {
    pub grid: &'a Grid,
    pub counters: &'a PopulationCounters,
    pub rules: &'a BehaviorRules,
    pub round: Round,
}

impl<'a> StepContext<'a> {
    pub fn new(
        grid: &'a Grid,
        counters: &'a PopulationCounters,
        rules: &'a BehaviorRules,
        round: Round,
    ) -> Self {
        Self { grid, counters, rules, round }
    }
}

/// Directions whose neighbor currently has a given state
struct Candidates {
    directions: [Direction; 4],
    len: usize,
}

impl Candidates {
    fn matching(grid: &Grid, from: usize, wanted: CellState) -> Self {
        let mut directions = [Direction::Up; 4];
        let mut len = 0;
        for direction in Direction::ALL {
            if grid.cell(grid.neighbor(from, direction)).state() == wanted {
                directions[len] = direction;
                len += 1;
            }
        }
        Self { directions, len }
    }

    fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Direction> {
        self.directions[..self.len].choose(rng).copied()
    }
}

enum Hunt {
    NoPrey,
    /// Prey vanished before the lock was taken
    Missed,
    Ate(usize),
}

/// Step the agent in cell `index`.
///
/// # Safety
/// For the duration of the call the caller must be the only thread touching
/// the payloads of cell `index` and of its four neighbors, except neighbors
/// across the seam, which the step guards with the seam lock.
pub(crate) unsafe fn step(ctx: &StepContext<'_>, index: usize) -> Option<StepOutcome> {
    let grid = ctx.grid;
    let kind = grid.cell(index).with_agent(|agent| {
        agent.grow_older();
        agent.kind()
    })?;

    let mut here = index;
    let mut ate = false;

    if kind == Kind::Predator {
        match hunt(ctx, index) {
            Hunt::Ate(at) => {
                here = at;
                ate = true;
            }
            Hunt::Missed => {}
            Hunt::NoPrey => {
                let hunger = grid.cell(index).with_agent(Agent::go_hungry).unwrap_or(0);
                if hunger > ctx.rules.predator_starve_threshold {
                    drop(grid.cell(index).take());
                    ctx.counters.decrement(Kind::Predator);
                    return Some(StepOutcome::Starved);
                }
            }
        }
    }

    let action = breed_or_move(ctx, &mut here);
    grid.cell(here).mark_moved();

    Some(StepOutcome::Acted {
        ate,
        action,
        at: grid.position(here),
    })
}

unsafe fn hunt(ctx: &StepContext<'_>, from: usize) -> Hunt {
    let grid = ctx.grid;
    let prey = Candidates::matching(grid, from, CellState::Prey);
    let picked = grid.cell(from).with_agent(|agent| prey.pick(agent.rng()));
    let Some(direction) = picked.flatten() else {
        return Hunt::NoPrey;
    };

    let target = grid.neighbor(from, direction);
    let _seam = grid.seam_guard(from, direction);
    let prey_cell = grid.cell(target);
    if prey_cell.state() != CellState::Prey {
        return Hunt::Missed;
    }

    let Some(mut predator) = grid.cell(from).take() else {
        return Hunt::Missed;
    };
    drop(prey_cell.take());
    ctx.counters.decrement(Kind::Prey);
    predator.feed();
    prey_cell.put(predator, false);

    Hunt::Ate(target)
}

unsafe fn breed_or_move(ctx: &StepContext<'_>, here: &mut usize) -> Action {
    let grid = ctx.grid;
    let from = *here;
    let cell = grid.cell(from);

    let free = Candidates::matching(grid, from, CellState::Water);
    let Some(direction) = cell.with_agent(|agent| free.pick(agent.rng())).flatten() else {
        return Action::Blocked;
    };

    let target = grid.neighbor(from, direction);
    let _seam = grid.seam_guard(from, direction);
    let target_cell = grid.cell(target);
    if !target_cell.is_free() {
        return Action::Blocked;
    }

    let offspring = cell
        .with_agent(|parent| {
            (parent.age() > ctx.rules.breed_threshold(parent.kind()))
                .then(|| parent.offspring(grid.allocate_id(), ctx.round))
        })
        .flatten();

    match offspring {
        Some(child) => {
            let kind = child.kind();
            // Newborns act from the next round on
            target_cell.put(child, true);
            ctx.counters.increment(kind);
            Action::Bred
        }
        None => {
            if let Some(agent) = cell.take() {
                target_cell.put(agent, false);
                *here = target;
            }
            Action::Moved
        }
    }
}

/// Step every waiting agent in `rows`, left to right, top to bottom.
///
/// # Safety
/// The caller must own `rows` and the rows directly above and below them for
/// the duration of the call (see [`step`]).
pub(crate) unsafe fn sweep_rows(ctx: &StepContext<'_>, rows: Range<usize>) -> usize {
    let width = ctx.grid.width();
    let mut stepped = 0;
    for y in rows {
        for x in 0..width {
            let index = y * width + x;
            if ctx.grid.cell(index).awaits_step() {
                step(ctx, index);
                stepped += 1;
            }
        }
    }
    stepped
}

/// Step the agent at `position` through exclusive grid access
pub fn step_agent_at(
    grid: &mut Grid,
    counters: &PopulationCounters,
    rules: &BehaviorRules,
    round: Round,
    position: Position,
) -> Option<StepOutcome> {
    let index = grid.try_index(position)?;
    let ctx = StepContext::new(grid, counters, rules, round);
    // SAFETY: `&mut Grid` means no other thread can reach any cell.
    unsafe { step(&ctx, index) }
}
