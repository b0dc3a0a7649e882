//! Session-wide progress signal.
//!
//! Map computations bump the signal after every node they settle; path
//! computations waiting for a target, and callers waiting for the session
//! to go idle, block on it. A generation counter instead of a bare
//! condition variable means a notification that lands between "check" and
//! "wait" is never lost.

use std::time::Instant;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub(crate) struct VisitSignal {
    generation: Mutex<u64>,
    cond: Condvar,
}

impl VisitSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Current generation. Read it *before* inspecting shared state.
    pub(crate) fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    /// Advance the generation and wake every waiter.
    pub(crate) fn notify(&self) {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.cond.notify_all();
    }

    /// Block until the generation differs from `seen`.
    pub(crate) fn wait_past(&self, seen: u64) {
        let mut generation = self.generation.lock();
        while *generation == seen {
            self.cond.wait(&mut generation);
        }
    }

    /// Like [`wait_past`](Self::wait_past) but gives up at `deadline`.
    ///
    /// Returns `false` on timeout.
    pub(crate) fn wait_past_until(&self, seen: u64, deadline: Instant) -> bool {
        let mut generation = self.generation.lock();
        while *generation == seen {
            if self.cond.wait_until(&mut generation, deadline).timed_out() {
                return *generation != seen;
            }
        }
        true
    }
}
