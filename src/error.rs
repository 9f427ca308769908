//! Error types and result-code taxonomy.
//!
//! Every fallible operation in this crate reports failure through the single
//! closed [`SyncError`] enumeration. Errors are explicit and typed; no panics
//! cross the API boundary for recoverable conditions.

use thiserror::Error;

/// The closed result-code set shared by every primitive.
///
/// Each operation either completes all of its effects and returns `Ok`, or
/// produces no state change and returns exactly one of these codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum SyncError {
    /// An argument violates a documented precondition, such as a zero count,
    /// a zero capacity, or a multi-permit acquire without blocker scope.
    /// Waiting will not make the call valid.
    #[error("argument violates a documented precondition")]
    InvalidArguments,

    /// A lifecycle violation, such as `set_value` on an enabled semaphore or
    /// `clear` on an enabled queue.
    #[error("operation is not permitted in the current lifecycle state")]
    IncorrectState,

    /// The wait deadline expired, or a `try_` variant found the resource
    /// unavailable.
    #[error("resource unavailable or the wait deadline expired")]
    UnavailableOrTimeout,

    /// The primitive was, or became, disabled during the operation.
    #[error("primitive is disabled")]
    Disabled,

    /// Another caller holds the exclusive blocker scope. Returned to users
    /// only from `try_` variants; blocking operations wait the blocker out.
    #[error("another caller holds the blocker scope")]
    Blocked,
}

impl SyncError {
    /// Returns true if retrying the operation later may succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::UnavailableOrTimeout | Self::Blocked)
    }
}

/// Result alias used throughout the crate.
pub type SyncResult<T = ()> = Result<T, SyncError>;
