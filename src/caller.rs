//! Caller-identity tokens for the blocker-scope mechanism.

use std::sync::atomic::{AtomicU32, Ordering};

/// Opaque token identifying the current executing context.
///
/// The token combines the process id (high 32 bits) with a per-thread
/// sequence number (low 32 bits), so it is unique across the threads of one
/// process and across cooperating processes sharing a primitive. The token
/// is computed once per thread and is stable for the thread's lifetime.
///
/// "No caller" is represented as `Option<CallerId>::None` wherever an
/// identity field may be vacant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallerId(u64);

impl CallerId {
    /// The identity of the calling thread.
    #[must_use]
    pub fn current() -> Self {
        thread_local! {
            static TOKEN: u64 = next_token();
        }
        Self(TOKEN.with(|token| *token))
    }

    /// The raw token value, for diagnostics.
    #[must_use]
    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

fn next_token() -> u64 {
    static NEXT_THREAD_SEQ: AtomicU32 = AtomicU32::new(1);
    let seq = NEXT_THREAD_SEQ.fetch_add(1, Ordering::Relaxed);
    (u64::from(std::process::id()) << 32) | u64::from(seq)
}
