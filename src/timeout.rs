//! Optional absolute deadlines on the monotonic clock.

use std::time::{Duration, Instant};

/// An optional wait deadline.
///
/// A `Timeout` is either [`Timeout::NEVER`] (wait forever) or an absolute
/// [`Instant`] on the monotonic clock. Constructing one from a duration
/// computes `now + duration` once, at construction time, so a single
/// `Timeout` bounds an entire multi-wait operation rather than restarting
/// the clock at each internal wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timeout(Option<Instant>);

impl Timeout {
    /// Wait without a deadline.
    pub const NEVER: Self = Self(None);

    /// Deadline `duration` from now.
    ///
    /// A duration too large to represent resolves to [`Timeout::NEVER`].
    #[must_use]
    pub fn after(duration: Duration) -> Self {
        Self(Instant::now().checked_add(duration))
    }

    /// Deadline at an absolute instant, stored verbatim.
    #[must_use]
    pub const fn at(deadline: Instant) -> Self {
        Self(Some(deadline))
    }

    /// The absolute deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.0
    }

    /// Returns true if this timeout never expires.
    #[must_use]
    pub const fn is_never(&self) -> bool {
        self.0.is_none()
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self::after(duration)
    }
}

impl From<Instant> for Timeout {
    fn from(deadline: Instant) -> Self {
        Self::at(deadline)
    }
}
