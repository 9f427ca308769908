//! Basic counting semaphore.

use crate::error::{SyncError, SyncResult};
use crate::os::{Condvar, Mutex, Scope};
use crate::timeout::Timeout;

use super::Count;

struct State<C> {
    enabled: bool,
    value: C,
}

/// A counting semaphore with an enable/disable lifecycle.
///
/// Created disabled; `set_value` is only permitted while disabled, so the
/// idiom for reusing an instance is `disable` → `set_value` → `enable`.
/// Callbacks passed to `acquire_with` / `release_with` run synchronously
/// inside the critical section, on the success path only, and must not call
/// back into the same semaphore.
pub struct Semaphore<C: Count = u32> {
    state: Mutex<State<C>>,
    cond: Condvar,
}

impl<C: Count> Semaphore<C> {
    /// Creates a disabled, process-private semaphore with value zero.
    #[must_use]
    pub fn new() -> Self {
        Self::with_scope(Scope::Private)
    }

    /// Creates a disabled semaphore with the given sharing scope.
    #[must_use]
    pub fn with_scope(scope: Scope) -> Self {
        Self {
            state: Mutex::new(
                scope,
                State {
                    enabled: false,
                    value: C::ZERO,
                },
            ),
            cond: Condvar::new(scope),
        }
    }

    /// Sets the counter. Permitted only while disabled.
    pub fn set_value(&self, value: C) -> SyncResult {
        let mut state = self.state.lock();
        if state.enabled {
            return Err(SyncError::IncorrectState);
        }
        state.value = value;
        Ok(())
    }

    /// Reads the counter.
    #[must_use]
    pub fn value(&self) -> C {
        self.state.lock().value
    }

    /// Returns true if the semaphore is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Marks the semaphore enabled. Idempotent.
    pub fn enable(&self) {
        self.state.lock().enabled = true;
    }

    /// Marks the semaphore disabled and wakes every parked waiter, which
    /// then returns [`SyncError::Disabled`]. Idempotent. The counter value
    /// survives disablement.
    pub fn disable(&self) {
        let mut state = self.state.lock();
        if !state.enabled {
            return;
        }
        state.enabled = false;
        tracing::debug!(value = ?state.value, "semaphore disabled");
        self.cond.notify_all();
    }

    /// Waits for one permit and consumes it.
    pub fn acquire(&self, timeout: Timeout) -> SyncResult {
        self.acquire_with(|| {}, timeout)
    }

    /// Waits for one permit, consumes it, and runs `proc` inside the
    /// critical section.
    pub fn acquire_with<F: FnOnce()>(&self, proc: F, timeout: Timeout) -> SyncResult {
        let mut state = self.state.lock();
        if !state.enabled {
            return Err(SyncError::Disabled);
        }
        while state.value == C::ZERO {
            let (guard, timed_out) = self.cond.wait_timeout(state, timeout);
            if timed_out {
                return Err(SyncError::UnavailableOrTimeout);
            }
            state = guard;
            if !state.enabled {
                return Err(SyncError::Disabled);
            }
        }
        state.value = state
            .value
            .checked_sub(C::ONE)
            .expect("wait loop ensures a permit is available");
        proc();
        Ok(())
    }

    /// Consumes one permit if immediately available.
    pub fn try_acquire(&self) -> SyncResult {
        self.try_acquire_with(|| {})
    }

    /// Non-blocking [`Semaphore::acquire_with`].
    pub fn try_acquire_with<F: FnOnce()>(&self, proc: F) -> SyncResult {
        let mut state = self.state.lock();
        if !state.enabled {
            return Err(SyncError::Disabled);
        }
        if state.value == C::ZERO {
            return Err(SyncError::UnavailableOrTimeout);
        }
        state.value = state
            .value
            .checked_sub(C::ONE)
            .expect("value checked non-zero above");
        proc();
        Ok(())
    }

    /// Returns one permit and wakes waiters.
    pub fn release(&self) -> SyncResult {
        self.release_with(|| {})
    }

    /// Runs `proc` inside the critical section, then returns one permit and
    /// wakes waiters. The callback runs before the increment so that a woken
    /// waiter observes its effects.
    pub fn release_with<F: FnOnce()>(&self, proc: F) -> SyncResult {
        let mut state = self.state.lock();
        if !state.enabled {
            return Err(SyncError::Disabled);
        }
        proc();
        state.value = state.value.saturating_add(C::ONE);
        self.cond.notify_all();
        Ok(())
    }
}

impl<C: Count> Default for Semaphore<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Count> std::fmt::Debug for Semaphore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semaphore").finish_non_exhaustive()
    }
}
