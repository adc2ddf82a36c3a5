//! Lock table for the torus wraparound seam
//!
//! Only cells in the top and bottom rows get a mutex. Every other neighbor
//! write is covered by row-block ownership.

use std::sync::{Mutex, MutexGuard, PoisonError};

use ahash::AHashMap;

pub struct SeamLocks {
    locks: AHashMap<usize, Mutex<()>>,
}

impl SeamLocks {
    /// Locks for every cell in row 0 and row `height - 1`
    pub fn for_grid(width: usize, height: usize) -> Self {
        let mut locks = AHashMap::with_capacity(width * 2);
        if height > 0 {
            for x in 0..width {
                locks.entry(x).or_insert_with(|| Mutex::new(()));
                locks.entry((height - 1) * width + x).or_insert_with(|| Mutex::new(()));
            }
        }
        Self { locks }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.locks.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Lock a seam cell; `None` for cells off the seam
    pub fn guard(&self, index: usize) -> Option<MutexGuard<'_, ()>> {
        self.locks
            .get(&index)
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
