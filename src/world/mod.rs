//! Toroidal world: cells, seam locks and snapshots

pub mod cell;
pub mod grid;
pub mod seam;
pub mod snapshot;

pub use cell::Cell;
pub use grid::{Census, Grid};
pub use seam::SeamLocks;
pub use snapshot::{Snapshot, SnapshotIter};
