//! OS-level locking plumbing shared by every primitive.
//!
//! One mutex and one condition-variable implementation, built directly on
//! POSIX threads, serve both process-private and process-shared instances;
//! [`Scope`] selects the attribute set at construction time. The condition
//! variable is configured for `CLOCK_MONOTONIC` timed waits.
//!
//! Unsafe code in this crate is confined to this module.
//!
//! # Process-shared instances
//!
//! With [`Scope::Shared`], the pthread objects are initialized with
//! `PTHREAD_PROCESS_SHARED`. The caller is responsible for allocating the
//! owning structure in a mapping visible to all participating processes,
//! constructing it there exactly once, and not moving it after first use.
//! How the mapping is created is outside this crate's scope.

mod condvar;
mod mutex;

pub use condvar::Condvar;
pub use mutex::{Mutex, MutexGuard};

/// Sharing attributes applied to a primitive's mutex and condition variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// Visible to the threads of the constructing process only.
    #[default]
    Private,
    /// Initialized with `PTHREAD_PROCESS_SHARED` for placement in a memory
    /// mapping shared between processes.
    Shared,
}

/// Panics on a non-zero pthread return code. Used only for conditions that
/// indicate misuse or resource exhaustion, never for contention.
pub(crate) fn check(rc: libc::c_int, what: &str) {
    assert!(rc == 0, "{what} failed: {rc}");
}
