//! Grid cells and their occupancy word
//!
//! Occupancy (kind + moved flag) is an atomic byte so scans, sweeps and
//! snapshots never touch agent payloads. The payload itself sits in an
//! `UnsafeCell` and is only written by the worker that owns the cell's row
//! block for the current phase (or under a seam lock).

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::agent::Agent;
use crate::core::types::{CellState, Direction, Position};

const KIND_MASK: u8 = 0b011;
const MOVED_BIT: u8 = 0b100;

#[inline]
fn decode(word: u8) -> CellState {
    match word & KIND_MASK {
        1 => CellState::Prey,
        2 => CellState::Predator,
        _ => CellState::Water,
    }
}

#[inline]
fn encode(agent: &Agent, moved: bool) -> u8 {
    let kind = CellState::from(agent.kind()) as u8;
    if moved {
        kind | MOVED_BIT
    } else {
        kind
    }
}

pub struct Cell {
    position: Position,
    neighbors: [usize; 4],
    occupancy: AtomicU8,
    agent: UnsafeCell<Option<Agent>>,
}

// SAFETY: the payload is only accessed through the `unsafe` methods below,
// whose callers guarantee exclusive access: the phase scheduler hands every
// row block (plus its halo rows in the inactive phase) to exactly one worker,
// and seam-crossing writes additionally hold the seam lock for the target.
unsafe impl Sync for Cell {}

impl Cell {
    pub(crate) fn new(position: Position, neighbors: [usize; 4]) -> Self {
        Self {
            position,
            neighbors,
            occupancy: AtomicU8::new(0),
            agent: UnsafeCell::new(None),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    #[inline]
    pub fn neighbor(&self, direction: Direction) -> usize {
        self.neighbors[direction.index()]
    }

    pub fn neighbors(&self) -> [usize; 4] {
        self.neighbors
    }

    #[inline]
    pub fn state(&self) -> CellState {
        decode(self.occupancy.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        !self.state().is_occupied()
    }

    /// Occupant has already acted this round
    #[inline]
    pub fn is_moved(&self) -> bool {
        self.occupancy.load(Ordering::Acquire) & MOVED_BIT != 0
    }

    /// Occupied by an agent that has not acted yet this round
    #[inline]
    pub fn awaits_step(&self) -> bool {
        let word = self.occupancy.load(Ordering::Acquire);
        word & KIND_MASK != 0 && word & MOVED_BIT == 0
    }

    pub(crate) fn mark_moved(&self) {
        if self.state().is_occupied() {
            self.occupancy.fetch_or(MOVED_BIT, Ordering::AcqRel);
        }
    }

    pub(crate) fn clear_moved(&self) {
        self.occupancy.fetch_and(!MOVED_BIT, Ordering::AcqRel);
    }

    /// Exclusive access
    pub fn agent_mut(&mut self) -> Option<&mut Agent> {
        self.agent.get_mut().as_mut()
    }

    /// Place an agent through exclusive access, replacing any occupant
    pub(crate) fn insert(&mut self, agent: Agent, moved: bool) {
        *self.occupancy.get_mut() = encode(&agent, moved);
        *self.agent.get_mut() = Some(agent);
    }

    /// # Safety
    /// No other thread may access this cell's payload during the call.
    pub(crate) unsafe fn take(&self) -> Option<Agent> {
        self.occupancy.store(0, Ordering::Release);
        (*self.agent.get()).take()
    }

    /// # Safety
    /// No other thread may access this cell's payload during the call.
    pub(crate) unsafe fn put(&self, agent: Agent, moved: bool) {
        let word = encode(&agent, moved);
        *self.agent.get() = Some(agent);
        self.occupancy.store(word, Ordering::Release);
    }

    /// Run `f` against the occupant, if any.
    ///
    /// # Safety
    /// No other thread may access this cell's payload during the call.
    pub(crate) unsafe fn with_agent<R>(&self, f: impl FnOnce(&mut Agent) -> R) -> Option<R> {
        (*self.agent.get()).as_mut().map(f)
    }

    /// # Safety
    /// No thread may write this cell's payload while the reference lives.
    pub(crate) unsafe fn peek(&self) -> Option<&Agent> {
        (*self.agent.get()).as_ref()
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("position", &self.position)
            .field("state", &self.state())
            .field("moved", &self.is_moved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AgentId, Kind};

    fn lone_cell() -> Cell {
        Cell::new(Position::new(0, 0), [0, 0, 0, 0])
    }

    #[test]
    fn test_insert_sets_kind_and_moved() {
        let mut cell = lone_cell();
        assert_eq!(cell.state(), CellState::Water);
        assert!(!cell.awaits_step());

        cell.insert(Agent::new(AgentId(1), Kind::Predator, 0, 1), false);
        assert_eq!(cell.state(), CellState::Predator);
        assert!(cell.awaits_step());

        cell.mark_moved();
        assert!(cell.is_moved());
        assert!(!cell.awaits_step());
        assert_eq!(cell.state(), CellState::Predator);
    }

    #[test]
    fn test_clear_moved_keeps_occupant() {
        let mut cell = lone_cell();
        cell.insert(Agent::new(AgentId(1), Kind::Prey, 0, 1), true);
        cell.clear_moved();
        assert_eq!(cell.state(), CellState::Prey);
        assert!(cell.awaits_step());
    }

    #[test]
    fn test_take_empties_cell() {
        let mut cell = lone_cell();
        cell.insert(Agent::new(AgentId(5), Kind::Prey, 0, 1), false);
        let taken = unsafe { cell.take() };
        assert_eq!(taken.map(|a| a.id()), Some(AgentId(5)));
        assert!(cell.is_free());
        assert!(cell.agent_mut().is_none());
    }

    #[test]
    fn test_mark_moved_on_water_is_noop() {
        let cell = lone_cell();
        cell.mark_moved();
        assert!(!cell.is_moved());
    }
}
