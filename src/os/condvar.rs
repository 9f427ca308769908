//! Pthread condition variable configured for monotonic timed waits.

#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::time::Instant;

use super::mutex::MutexGuard;
use super::{check, Scope};
use crate::timeout::Timeout;

/// Condition variable paired with [`super::Mutex`].
///
/// Timed waits measure against `CLOCK_MONOTONIC`, so deadlines are immune to
/// wall-clock adjustments. Every wakeup in this crate broadcasts: the state
/// transitions (blocker release, value change) can satisfy different waiters
/// in non-interchangeable ways, so single-wake is never used.
pub struct Condvar {
    inner: UnsafeCell<libc::pthread_cond_t>,
}

// SAFETY: pthread condition variables are thread-safe by contract.
unsafe impl Send for Condvar {}
// SAFETY: as above.
unsafe impl Sync for Condvar {}

impl Condvar {
    /// Creates a condition variable with the given sharing scope.
    pub fn new(scope: Scope) -> Self {
        // SAFETY: pthread_cond_t is plain data; init overwrites the zeroes.
        let cond = Self {
            inner: UnsafeCell::new(unsafe { std::mem::zeroed() }),
        };
        let mut attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();
        // SAFETY: `attr` is valid for writes; init and destroy are paired.
        unsafe {
            check(
                libc::pthread_condattr_init(attr.as_mut_ptr()),
                "pthread_condattr_init",
            );
            check(
                libc::pthread_condattr_setclock(attr.as_mut_ptr(), libc::CLOCK_MONOTONIC),
                "pthread_condattr_setclock",
            );
            if scope == Scope::Shared {
                check(
                    libc::pthread_condattr_setpshared(
                        attr.as_mut_ptr(),
                        libc::PTHREAD_PROCESS_SHARED,
                    ),
                    "pthread_condattr_setpshared",
                );
            }
            check(
                libc::pthread_cond_init(cond.inner.get(), attr.as_ptr()),
                "pthread_cond_init",
            );
            check(
                libc::pthread_condattr_destroy(attr.as_mut_ptr()),
                "pthread_condattr_destroy",
            );
        }
        cond
    }

    /// Releases the guard's mutex, blocks until notified, and reacquires it.
    ///
    /// Spurious wakeups are possible; callers loop on their predicate.
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        // SAFETY: the guard proves the mutex is locked by this thread.
        unsafe {
            check(
                libc::pthread_cond_wait(self.inner.get(), guard.mutex_ptr()),
                "pthread_cond_wait",
            );
        };
        guard
    }

    /// Like [`Condvar::wait`], but gives up once the absolute deadline
    /// passes. Returns the reacquired guard and whether the wait timed out.
    pub fn wait_until<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        deadline: Instant,
    ) -> (MutexGuard<'a, T>, bool) {
        let abstime = absolute_timespec(deadline);
        // SAFETY: the guard proves the mutex is locked by this thread.
        let rc = unsafe {
            libc::pthread_cond_timedwait(self.inner.get(), guard.mutex_ptr(), &abstime)
        };
        assert!(
            rc == 0 || rc == libc::ETIMEDOUT,
            "pthread_cond_timedwait failed: {rc}"
        );
        (guard, rc == libc::ETIMEDOUT)
    }

    /// Dispatches on a [`Timeout`]: waits forever when it has no deadline.
    pub fn wait_timeout<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Timeout,
    ) -> (MutexGuard<'a, T>, bool) {
        match timeout.deadline() {
            Some(deadline) => self.wait_until(guard, deadline),
            None => (self.wait(guard), false),
        }
    }

    /// Wakes every waiter.
    pub fn notify_all(&self) {
        // SAFETY: the condvar was initialized in `new`.
        unsafe {
            check(
                libc::pthread_cond_broadcast(self.inner.get()),
                "pthread_cond_broadcast",
            );
        };
    }
}

impl Drop for Condvar {
    fn drop(&mut self) {
        // SAFETY: dropping implies no waiter is parked on this condvar.
        unsafe { libc::pthread_cond_destroy(self.inner.get()) };
    }
}

impl fmt::Debug for Condvar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condvar").finish_non_exhaustive()
    }
}

/// Converts an [`Instant`] deadline into an absolute `CLOCK_MONOTONIC`
/// timespec, saturating on overflow.
fn absolute_timespec(deadline: Instant) -> libc::timespec {
    let remaining = deadline.saturating_duration_since(Instant::now());
    let mut now = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `now` is valid for writes.
    unsafe {
        check(
            libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut now),
            "clock_gettime",
        );
    };
    let secs = libc::time_t::try_from(remaining.as_secs()).unwrap_or(libc::time_t::MAX);
    let nanos = i64::from(remaining.subsec_nanos()) + i64::try_from(now.tv_nsec).unwrap_or(0);
    let carry = libc::time_t::try_from(nanos / 1_000_000_000).unwrap_or(0);
    libc::timespec {
        tv_sec: now.tv_sec.saturating_add(secs).saturating_add(carry),
        tv_nsec: libc::c_long::try_from(nanos % 1_000_000_000).unwrap_or(0),
    }
}
