//! Reusable rendezvous separating the pipeline phases.
//!
//! Unlike `std::sync::Barrier`, a `PhaseBarrier` can be broken: once a worker
//! fails, every party waiting on it (and every later arrival) gets
//! [`PipelineError::BarrierBroken`] instead of blocking forever.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::error::PipelineError;

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    broken: bool,
}

#[derive(Debug)]
pub struct PhaseBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl PhaseBarrier {
    pub fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(BarrierState::default()),
            released: Condvar::new(),
        }
    }

    // No code panics while holding the lock, so a poisoned state is still consistent.
    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until all parties have arrived.
    ///
    /// Returns `Ok(true)` for exactly one party per generation (the last to
    /// arrive), `Ok(false)` for the rest.
    pub fn wait(&self) -> Result<bool, PipelineError> {
        let mut state = self.lock();
        if state.broken {
            return Err(PipelineError::BarrierBroken);
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.released.notify_all();
            return Ok(true);
        }

        while state.generation == generation && !state.broken {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if state.generation == generation {
            Err(PipelineError::BarrierBroken)
        } else {
            Ok(false)
        }
    }

    /// Wake every waiter with an error and fail all later waits.
    pub fn break_barrier(&self) {
        let mut state = self.lock();
        state.broken = true;
        self.released.notify_all();
    }

    pub fn is_broken(&self) -> bool {
        self.lock().broken
    }
}

/// Breaks the barrier on drop unless disarmed, so a worker that returns early
/// or unwinds cannot leave its peers waiting.
pub struct BarrierGuard<'a> {
    barrier: &'a PhaseBarrier,
    armed: bool,
}

impl<'a> BarrierGuard<'a> {
    pub fn new(barrier: &'a PhaseBarrier) -> Self {
        Self {
            barrier,
            armed: true,
        }
    }

    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for BarrierGuard<'_> {
    fn drop(&mut self) {
        if self.armed || thread::panicking() {
            self.barrier.break_barrier();
        }
    }
}
