//! Blocking synchronization primitives for the phase pool
//!
//! - [`Gate`]: broadcast open/close. Waiters wait for an opening newer than
//!   the epoch they last saw, so a quick open/close pair is never missed.
//! - [`Countdown`]: the control thread waits until every worker reported in.
//! - [`CancelToken`]: cooperative stop flag checked by every wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared stop flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    epoch: u64,
}

/// Manual-reset gate with an opening counter
#[derive(Debug, Default)]
pub struct Gate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let mut state = lock(&self.state);
        state.open = true;
        state.epoch += 1;
        self.changed.notify_all();
    }

    pub fn close(&self) {
        lock(&self.state).open = false;
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// Number of openings so far
    pub fn epoch(&self) -> u64 {
        lock(&self.state).epoch
    }

    /// Block until the gate has been opened after `seen`.
    ///
    /// Returns the new epoch, or `None` once `cancel` fires.
    pub fn wait_past(&self, seen: u64, cancel: &CancelToken) -> Option<u64> {
        let mut state = lock(&self.state);
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            if state.epoch > seen {
                return Some(state.epoch);
            }
            state = self.changed.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wake every waiter so it can re-check its cancel token
    pub fn interrupt(&self) {
        let _state = lock(&self.state);
        self.changed.notify_all();
    }
}

/// Counts workers that still have to report for the current round
#[derive(Debug)]
pub struct Countdown {
    initial: usize,
    remaining: Mutex<usize>,
    done: Condvar,
}

impl Countdown {
    pub fn new(count: usize) -> Self {
        Self {
            initial: count,
            remaining: Mutex::new(count),
            done: Condvar::new(),
        }
    }

    pub fn initial(&self) -> usize {
        self.initial
    }

    pub fn remaining(&self) -> usize {
        *lock(&self.remaining)
    }

    pub fn signal(&self) {
        let mut remaining = lock(&self.remaining);
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.done.notify_all();
        }
    }

    /// Block until the count reaches zero. Returns `false` if cancelled first.
    pub fn wait(&self, cancel: &CancelToken) -> bool {
        let mut remaining = lock(&self.remaining);
        loop {
            if *remaining == 0 {
                return true;
            }
            if cancel.is_cancelled() {
                return false;
            }
            remaining = self.done.wait(remaining).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn reset(&self) {
        *lock(&self.remaining) = self.initial;
    }

    pub fn interrupt(&self) {
        let _remaining = lock(&self.remaining);
        self.done.notify_all();
    }
}
