//! Per-round occupancy classification handed to renderers

use serde::Serialize;

use crate::core::types::{CellState, Position, Round};

/// Classification of every cell after a round, row-major.
///
/// Snapshots are read-only and consumed by iteration: iterating moves the
/// data out, so a renderer walks it exactly once.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    round: Round,
    width: usize,
    height: usize,
    cells: Vec<CellState>,
}

impl Snapshot {
    pub(crate) fn new(round: Round, width: usize, height: usize, cells: Vec<CellState>) -> Self {
        debug_assert_eq!(cells.len(), width * height);
        Self { round, width, height, cells }
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, position: Position) -> Option<CellState> {
        if position.x < self.width && position.y < self.height {
            Some(self.cells[position.y * self.width + position.x])
        } else {
            None
        }
    }

    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|&&s| s == state).count()
    }

    /// Same occupancy everywhere, ignoring the round number
    pub fn same_layout(&self, other: &Snapshot) -> bool {
        self.width == other.width && self.height == other.height && self.cells == other.cells
    }
}

impl IntoIterator for Snapshot {
    type Item = (Position, CellState);
    type IntoIter = SnapshotIter;

    fn into_iter(self) -> SnapshotIter {
        SnapshotIter {
            width: self.width,
            inner: self.cells.into_iter().enumerate(),
        }
    }
}

/// Single-pass iterator over a consumed snapshot
pub struct SnapshotIter {
    width: usize,
    inner: std::iter::Enumerate<std::vec::IntoIter<CellState>>,
}

impl Iterator for SnapshotIter {
    type Item = (Position, CellState);

    fn next(&mut self) -> Option<Self::Item> {
        let (index, state) = self.inner.next()?;
        Some((Position::new(index % self.width, index / self.width), state))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for SnapshotIter {}
