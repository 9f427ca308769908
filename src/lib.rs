//! Advsync: blocking synchronization primitives for producer/consumer
//! pipelines across threads, and optionally across processes sharing a
//! memory mapping.
//!
//! # Overview
//!
//! Advsync is a primitive-level toolkit: not a task scheduler, not an async
//! runtime, not an I/O engine. Its keystone is the
//! [`AdvancedSemaphore`] — a counting semaphore fused with bounded
//! acquisition and an exclusive "blocker scope" in one atomic state
//! machine — and the [`BoundedQueue`] composed from two of them, which
//! turns that scope into pause/resume, fill/drain, and dynamic capacity
//! change without exposing a second lock.
//!
//! # Core Guarantees
//!
//! - **Closed error taxonomy**: every fallible operation returns one of the
//!   five [`SyncError`] codes; an operation either completes all of its
//!   effects or leaves no state change behind
//! - **Broadcast cancellation**: `disable` wakes every parked waiter, which
//!   returns [`SyncError::Disabled`]
//! - **Deadline cancellation**: every wait-capable operation accepts a
//!   [`Timeout`] holding an absolute monotonic deadline
//! - **Atomic composition**: queue storage mutations run inside the
//!   semaphore's critical section through the callback hook, so no observer
//!   sees the counters and the storage disagree
//! - **One lock per primitive**: no lock-free claims, no fairness beyond
//!   the underlying condition variable, no priority inheritance
//!
//! # Module Structure
//!
//! - [`error`]: the closed result-code set
//! - [`timeout`]: absolute monotonic deadlines
//! - [`caller`]: caller-identity tokens for the blocker scope
//! - [`os`]: pthread mutex/condvar with the process-shared flag
//! - [`semaphore`]: basic and advanced counting semaphores
//! - [`queue`]: bounded queues and the rendezvous hand-off
//! - [`barrier`]: cyclic N-party barrier
//! - [`test_utils`]: logging and assertion helpers for tests
//!
//! # Example
//!
//! ```
//! use advsync::{BoundedQueue, Timeout};
//!
//! let queue: BoundedQueue<u32> = BoundedQueue::new();
//! queue.enable(8)?;
//! queue.push(1, Timeout::NEVER)?;
//! assert_eq!(queue.pop(Timeout::NEVER)?, 1);
//! # Ok::<(), advsync::SyncError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod barrier;
pub mod caller;
pub mod error;
pub mod os;
pub mod queue;
pub mod semaphore;
pub mod test_utils;
pub mod timeout;

pub use barrier::Barrier;
pub use caller::CallerId;
pub use error::{SyncError, SyncResult};
pub use os::Scope;
pub use queue::{BasicQueue, BoundedQueue, Storage, SyncQueue};
pub use semaphore::{AdvancedSemaphore, Count, OpFlags, Semaphore};
pub use timeout::Timeout;
