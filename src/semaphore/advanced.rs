//! Advanced counting semaphore with an exclusive blocker scope.
//!
//! The advanced semaphore behaves as a counting semaphore but additionally
//! lets one caller enter an exclusive **blocker scope**: while the scope is
//! held, no other caller makes progress through acquire/reserve/block, while
//! the holder may perform arbitrarily many operations of its own. Composite
//! queues use this to fill, drain, and resize safely without exposing a
//! second lock.
//!
//! # Composite operations
//!
//! Every public operation is a facade over [`AdvancedSemaphore::do_operations`],
//! a single critical section parameterized by an [`OpFlags`] subset of
//! `{PRE_BLOCK, ACQUIRE, RESERVE, RELEASE, POST_UNBLOCK}` plus a count, an
//! optional callback, and a [`Timeout`]. The steps execute in that flag
//! order; waits release and reacquire the semaphore's mutex.
//!
//! # Multi-permit acquisition
//!
//! Acquiring or reserving more than one permit atomically requires either
//! already holding the blocker scope or requesting it with `PRE_BLOCK` in
//! the same operation; otherwise the call fails with
//! [`SyncError::InvalidArguments`]. Without the scope, a multi-permit
//! acquire could starve behind arbitrarily interleaved single-permit
//! acquires.
//!
//! # Cancellation
//!
//! A timed-out or disabled wait leaves the counter and the callback
//! untouched: decrement, callback, and increment all run after every wait
//! has completed. A timeout that strikes after `PRE_BLOCK` has already
//! taken the scope leaves the scope held by the caller, who remains
//! responsible for `unblock`.

use std::fmt;

use bitflags::bitflags;

use crate::caller::CallerId;
use crate::error::{SyncError, SyncResult};
use crate::os::{Condvar, Mutex, MutexGuard, Scope};
use crate::timeout::Timeout;

use super::Count;

bitflags! {
    /// Step selectors for [`AdvancedSemaphore::do_operations`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpFlags: u8 {
        /// Enter the blocker scope before any value wait.
        const PRE_BLOCK = 1 << 0;
        /// Leave the blocker scope after every other step.
        const POST_UNBLOCK = 1 << 1;
        /// Wait until the value reaches `count`, without consuming it.
        const RESERVE = 1 << 2;
        /// Wait until the value reaches `count`, then subtract it.
        const ACQUIRE = 1 << 3;
        /// Add `count` to the value and wake value waiters.
        const RELEASE = 1 << 4;
    }
}

struct State<C> {
    enabled: bool,
    value: C,
    blocker: Option<CallerId>,
}

impl<C: Count> State<C> {
    fn blocked_by_other(&self, me: CallerId) -> bool {
        self.blocker.is_some_and(|blocker| blocker != me)
    }
}

/// Outcome of one pass through the value-wait loop.
enum ValueWait<'a, C> {
    /// Value is sufficient and the caller is not fenced out.
    Ready(MutexGuard<'a, State<C>>),
    /// A different caller took the blocker scope mid-wait; the caller must
    /// wait the scope out and retry.
    Blocked(MutexGuard<'a, State<C>>),
    Failed(SyncError),
}

/// Counting semaphore fused with an exclusive blocker scope.
///
/// Created disabled with value zero; see the [module docs](self) for the
/// composite-operation contract. The counter type defaults to `u32`.
pub struct AdvancedSemaphore<C: Count = u32> {
    state: Mutex<State<C>>,
    /// Notified on value changes and on blocker-identity changes.
    cond_value: Condvar,
    /// Notified on blocker release.
    cond_block: Condvar,
}

impl<C: Count> AdvancedSemaphore<C> {
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
                    blocker: None,
                },
            ),
            cond_value: Condvar::new(scope),
            cond_block: Condvar::new(scope),
        }
    }

    /// Sets the counter. Permitted only while disabled; the counter
    /// otherwise survives disablement, so reuse follows the idiom
    /// `disable` → `set_value` → `enable`.
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

    /// Marks the semaphore disabled, clears the blocker scope, and wakes
    /// every parked waiter, which then returns [`SyncError::Disabled`].
    /// Idempotent.
    pub fn disable(&self) {
        let mut state = self.state.lock();
        if !state.enabled {
            return;
        }
        state.enabled = false;
        state.blocker = None;
        tracing::debug!(value = ?state.value, "advanced semaphore disabled");
        self.cond_block.notify_all();
        self.cond_value.notify_all();
    }

    /// Runs a composite operation without a callback.
    pub fn do_operations(&self, flags: OpFlags, count: C, timeout: Timeout) -> SyncResult {
        self.operate(flags, count, None, timeout)
    }

    /// Runs a composite operation, invoking `proc` inside the critical
    /// section between the acquire/reserve step and the release step.
    pub fn do_operations_with<F: FnOnce()>(
        &self,
        flags: OpFlags,
        count: C,
        proc: F,
        timeout: Timeout,
    ) -> SyncResult {
        let mut proc = Some(proc);
        let mut call = || {
            if let Some(proc) = proc.take() {
                proc();
            }
        };
        self.operate(flags, count, Some(&mut call), timeout)
    }

    /// Non-blocking composite operation: any step that would wait fails
    /// immediately instead, with [`SyncError::Blocked`] when another caller
    /// holds the scope and [`SyncError::UnavailableOrTimeout`] when the
    /// value is insufficient.
    pub fn try_operations(&self, flags: OpFlags, count: C) -> SyncResult {
        self.try_operate(flags, count, None)
    }

    /// Non-blocking composite operation with a callback.
    pub fn try_operations_with<F: FnOnce()>(&self, flags: OpFlags, count: C, proc: F) -> SyncResult {
        let mut proc = Some(proc);
        let mut call = || {
            if let Some(proc) = proc.take() {
                proc();
            }
        };
        self.try_operate(flags, count, Some(&mut call))
    }

    /// Waits for one permit and consumes it.
    pub fn acquire(&self, timeout: Timeout) -> SyncResult {
        self.do_operations(OpFlags::ACQUIRE, C::ONE, timeout)
    }

    /// Waits for one permit, consumes it, and runs `proc` inside the
    /// critical section.
    pub fn acquire_with<F: FnOnce()>(&self, proc: F, timeout: Timeout) -> SyncResult {
        self.do_operations_with(OpFlags::ACQUIRE, C::ONE, proc, timeout)
    }

    /// Consumes one permit if immediately available.
    pub fn try_acquire(&self) -> SyncResult {
        self.try_operations(OpFlags::ACQUIRE, C::ONE)
    }

    /// Non-blocking [`AdvancedSemaphore::acquire_with`].
    pub fn try_acquire_with<F: FnOnce()>(&self, proc: F) -> SyncResult {
        self.try_operations_with(OpFlags::ACQUIRE, C::ONE, proc)
    }

    /// Waits until at least one permit exists, without consuming it.
    pub fn reserve(&self, timeout: Timeout) -> SyncResult {
        self.do_operations(OpFlags::RESERVE, C::ONE, timeout)
    }

    /// Non-blocking [`AdvancedSemaphore::reserve`].
    pub fn try_reserve(&self) -> SyncResult {
        self.try_operations(OpFlags::RESERVE, C::ONE)
    }

    /// Returns one permit and wakes value waiters. Releasing is never
    /// fenced by the blocker scope; the scope holder depends on other
    /// callers completing their releases.
    pub fn release(&self) -> SyncResult {
        self.release_many(C::ONE)
    }

    /// Returns `count` permits at once.
    pub fn release_many(&self, count: C) -> SyncResult {
        self.do_operations(OpFlags::RELEASE, count, Timeout::NEVER)
    }

    /// Runs `proc` inside the critical section, then returns one permit.
    pub fn release_with<F: FnOnce()>(&self, proc: F) -> SyncResult {
        self.do_operations_with(OpFlags::RELEASE, C::ONE, proc, Timeout::NEVER)
    }

    /// Enters the blocker scope, waiting out any current holder. Nested
    /// entry by the current holder is a no-op.
    pub fn block(&self, timeout: Timeout) -> SyncResult {
        self.do_operations(OpFlags::PRE_BLOCK, C::ZERO, timeout)
    }

    /// Non-blocking [`AdvancedSemaphore::block`].
    pub fn try_block(&self) -> SyncResult {
        self.try_operations(OpFlags::PRE_BLOCK, C::ZERO)
    }

    /// Leaves the blocker scope, if any is held, and wakes scope waiters.
    pub fn unblock(&self) -> SyncResult {
        self.do_operations(OpFlags::POST_UNBLOCK, C::ZERO, Timeout::NEVER)
    }

    /// Enters the blocker scope, then waits for and consumes `count`
    /// permits. The scope remains held on return, including on timeout
    /// after the scope was taken.
    pub fn block_and_acquire(&self, count: C, timeout: Timeout) -> SyncResult {
        self.do_operations(OpFlags::PRE_BLOCK | OpFlags::ACQUIRE, count, timeout)
    }

    /// Enters the blocker scope, then waits until the value reaches
    /// `count` without consuming it. The scope remains held on return.
    pub fn block_and_reserve(&self, count: C, timeout: Timeout) -> SyncResult {
        self.do_operations(OpFlags::PRE_BLOCK | OpFlags::RESERVE, count, timeout)
    }

    /// Waits until the value reaches `count`, then leaves the blocker
    /// scope. Used by hand-off protocols to linger until a peer has claimed
    /// the value this caller produced.
    pub fn reserve_and_unblock(&self, count: C, timeout: Timeout) -> SyncResult {
        self.do_operations(OpFlags::RESERVE | OpFlags::POST_UNBLOCK, count, timeout)
    }

    fn operate(
        &self,
        flags: OpFlags,
        count: C,
        proc: Option<&mut dyn FnMut()>,
        timeout: Timeout,
    ) -> SyncResult {
        let me = CallerId::current();
        let mut state = self.state.lock();
        if !state.enabled {
            return Err(SyncError::Disabled);
        }
        Self::validate(flags, count, &state, me)?;

        if flags.intersects(OpFlags::PRE_BLOCK | OpFlags::ACQUIRE | OpFlags::RESERVE) {
            state = self.wait_for_blocker(state, me, timeout)?;
        }
        if flags.contains(OpFlags::PRE_BLOCK) && state.blocker != Some(me) {
            state.blocker = Some(me);
            tracing::trace!(caller = ?me, "blocker scope taken");
            // Wake value waiters so they observe the new blocker and step
            // aside into the scope wait.
            self.cond_value.notify_all();
        }
        if flags.intersects(OpFlags::ACQUIRE | OpFlags::RESERVE) {
            loop {
                match self.wait_for_value(state, count, me, timeout) {
                    ValueWait::Ready(guard) => {
                        state = guard;
                        break;
                    }
                    ValueWait::Blocked(guard) => {
                        state = self.wait_for_blocker(guard, me, timeout)?;
                    }
                    ValueWait::Failed(err) => return Err(err),
                }
            }
            if flags.contains(OpFlags::ACQUIRE) {
                state.value = state
                    .value
                    .checked_sub(count)
                    .expect("value wait ensures value >= count");
            }
        }
        if let Some(proc) = proc {
            proc();
        }
        if flags.contains(OpFlags::RELEASE) {
            state.value = state.value.saturating_add(count);
            self.cond_value.notify_all();
        }
        if flags.contains(OpFlags::POST_UNBLOCK) && state.blocker.is_some() {
            state.blocker = None;
            tracing::trace!(caller = ?me, "blocker scope released");
            self.cond_block.notify_all();
        }
        Ok(())
    }

    fn try_operate(&self, flags: OpFlags, count: C, proc: Option<&mut dyn FnMut()>) -> SyncResult {
        let me = CallerId::current();
        let mut state = self.state.lock();
        if !state.enabled {
            return Err(SyncError::Disabled);
        }
        // The multi-permit-needs-blocker rule is not enforced here: the try
        // path never waits, so it cannot starve.
        if flags.intersects(OpFlags::ACQUIRE | OpFlags::RESERVE) && count == C::ZERO {
            return Err(SyncError::InvalidArguments);
        }
        if flags.contains(OpFlags::RELEASE) && count == C::ZERO {
            return Err(SyncError::InvalidArguments);
        }
        if flags.intersects(OpFlags::PRE_BLOCK | OpFlags::ACQUIRE | OpFlags::RESERVE)
            && state.blocked_by_other(me)
        {
            return Err(SyncError::Blocked);
        }
        if flags.contains(OpFlags::PRE_BLOCK) && state.blocker != Some(me) {
            state.blocker = Some(me);
            tracing::trace!(caller = ?me, "blocker scope taken");
            self.cond_value.notify_all();
        }
        if flags.intersects(OpFlags::ACQUIRE | OpFlags::RESERVE) && state.value < count {
            return Err(SyncError::UnavailableOrTimeout);
        }
        if flags.contains(OpFlags::ACQUIRE) {
            state.value = state
                .value
                .checked_sub(count)
                .expect("value checked sufficient above");
        }
        if let Some(proc) = proc {
            proc();
        }
        if flags.contains(OpFlags::RELEASE) {
            state.value = state.value.saturating_add(count);
            self.cond_value.notify_all();
        }
        if flags.contains(OpFlags::POST_UNBLOCK) && state.blocker.is_some() {
            state.blocker = None;
            tracing::trace!(caller = ?me, "blocker scope released");
            self.cond_block.notify_all();
        }
        Ok(())
    }

    fn validate(flags: OpFlags, count: C, state: &State<C>, me: CallerId) -> SyncResult {
        if flags.intersects(OpFlags::ACQUIRE | OpFlags::RESERVE) {
            if count == C::ZERO {
                return Err(SyncError::InvalidArguments);
            }
            if count > C::ONE
                && !flags.contains(OpFlags::PRE_BLOCK)
                && state.blocker != Some(me)
            {
                return Err(SyncError::InvalidArguments);
            }
        }
        if flags.contains(OpFlags::RELEASE) && count == C::ZERO {
            return Err(SyncError::InvalidArguments);
        }
        Ok(())
    }

    /// Waits on `cond_block` until no other caller holds the scope.
    fn wait_for_blocker<'a>(
        &'a self,
        mut state: MutexGuard<'a, State<C>>,
        me: CallerId,
        timeout: Timeout,
    ) -> Result<MutexGuard<'a, State<C>>, SyncError> {
        while state.blocked_by_other(me) {
            let (guard, timed_out) = self.cond_block.wait_timeout(state, timeout);
            if timed_out {
                return Err(SyncError::UnavailableOrTimeout);
            }
            state = guard;
            if !state.enabled {
                return Err(SyncError::Disabled);
            }
        }
        Ok(state)
    }

    /// Waits on `cond_value` until the value reaches `count`, stepping
    /// aside with [`ValueWait::Blocked`] if another caller takes the scope
    /// mid-wait.
    fn wait_for_value<'a>(
        &'a self,
        mut state: MutexGuard<'a, State<C>>,
        count: C,
        me: CallerId,
        timeout: Timeout,
    ) -> ValueWait<'a, C> {
        if state.blocked_by_other(me) {
            return ValueWait::Blocked(state);
        }
        while state.value < count {
            let (guard, timed_out) = self.cond_value.wait_timeout(state, timeout);
            if timed_out {
                return ValueWait::Failed(SyncError::UnavailableOrTimeout);
            }
            state = guard;
            if !state.enabled {
                return ValueWait::Failed(SyncError::Disabled);
            }
            if state.blocked_by_other(me) {
                return ValueWait::Blocked(state);
            }
        }
        ValueWait::Ready(state)
    }
}

impl<C: Count> Default for AdvancedSemaphore<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Count> fmt::Debug for AdvancedSemaphore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvancedSemaphore").finish_non_exhaustive()
    }
}
