//! Cyclic N-party barrier.

use std::fmt;

use crate::error::{SyncError, SyncResult};
use crate::os::{Condvar, Mutex, Scope};
use crate::timeout::Timeout;

struct State {
    enabled: bool,
    total: u32,
    arrived: u32,
    generation: u64,
}

/// Cyclic barrier: every cycle releases all parties once the last one
/// arrives, then begins the next cycle.
///
/// A timed-out arrival leaves the arrived count incremented, so a later
/// cycle may trip with fewer live participants than `parties`. Callers that
/// time out and intend to rejoin must account for their abandoned slot.
pub struct Barrier {
    state: Mutex<State>,
    cond: Condvar,
}

impl Barrier {
    /// Creates a disabled barrier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(
                Scope::Private,
                State {
                    enabled: false,
                    total: 0,
                    arrived: 0,
                    generation: 0,
                },
            ),
            cond: Condvar::new(Scope::Private),
        }
    }

    /// Enables the barrier for `parties` participants and resets the
    /// arrived count. Fails with [`SyncError::InvalidArguments`] when
    /// `parties` is zero.
    pub fn enable(&self, parties: u32) -> SyncResult {
        if parties == 0 {
            return Err(SyncError::InvalidArguments);
        }
        let mut state = self.state.lock();
        state.enabled = true;
        state.total = parties;
        state.arrived = 0;
        tracing::debug!(parties, "barrier enabled");
        Ok(())
    }

    /// Disables the barrier; parked arrivals wake and return
    /// [`SyncError::Disabled`]. Idempotent.
    pub fn disable(&self) {
        let mut state = self.state.lock();
        if !state.enabled {
            return;
        }
        state.enabled = false;
        tracing::debug!(arrived = state.arrived, "barrier disabled");
        self.cond.notify_all();
    }

    /// The number of parties required to trip the barrier.
    #[must_use]
    pub fn parties(&self) -> u32 {
        self.state.lock().total
    }

    /// Arrivals counted toward the current cycle.
    #[must_use]
    pub fn arrived(&self) -> u32 {
        self.state.lock().arrived
    }

    /// Arrives at the barrier and waits for the current cycle to trip.
    ///
    /// The final arrival resets the count, releases every waiter, and
    /// returns immediately. A timeout returns
    /// [`SyncError::UnavailableOrTimeout`] without decrementing the arrived
    /// count.
    pub fn wait(&self, timeout: Timeout) -> SyncResult {
        let mut state = self.state.lock();
        if !state.enabled {
            return Err(SyncError::Disabled);
        }
        if state.arrived >= state.total {
            return Err(SyncError::IncorrectState);
        }
        state.arrived += 1;
        if state.arrived == state.total {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            tracing::trace!(generation = state.generation, "barrier tripped");
            self.cond.notify_all();
            return Ok(());
        }
        let generation = state.generation;
        while state.generation == generation {
            let (guard, timed_out) = self.cond.wait_timeout(state, timeout);
            if timed_out {
                return Err(SyncError::UnavailableOrTimeout);
            }
            state = guard;
            if !state.enabled {
                return Err(SyncError::Disabled);
            }
        }
        Ok(())
    }
}

impl Default for Barrier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Barrier").finish_non_exhaustive()
    }
}
