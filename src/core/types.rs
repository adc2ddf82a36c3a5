//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Unique identifier for agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

/// Simulation round counter
pub type Round = u64;

/// Agent kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Prey,
    Predator,
}

/// What a renderer sees at one position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CellState {
    Water = 0,
    Prey = 1,
    Predator = 2,
}

impl CellState {
    pub fn is_occupied(self) -> bool {
        self != CellState::Water
    }

    pub fn kind(self) -> Option<Kind> {
        match self {
            CellState::Water => None,
            CellState::Prey => Some(Kind::Prey),
            CellState::Predator => Some(Kind::Predator),
        }
    }
}

impl From<Kind> for CellState {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Prey => CellState::Prey,
            Kind::Predator => CellState::Predator,
        }
    }
}

/// Grid position (column, row)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Cardinal direction on the torus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] =
        [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}
