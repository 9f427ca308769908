//! Bounded FIFO queue with flow control.
//!
//! Producers block when the queue is full, consumers when it is empty. Both
//! behaviors come from pairing two [`AdvancedSemaphore`]s — one counting
//! free slots, one counting filled items — with callbacks that mutate the
//! storage inside the semaphore's critical section:
//!
//! - `push` appends *while the free-slot permit is in transit*, between the
//!   decrement and the paired used-side release, so observers counting
//!   either semaphore plus the storage size see a consistent picture.
//! - `pop` attaches the extraction to the free-slot *release*, so a
//!   producer that sees a free slot sees the emptied slot.
//!
//! At every quiescent point, `len() + sem_free.value == capacity` and
//! `sem_used.value == len()`.
//!
//! The blocker scopes of the two semaphores drive the flow-control surface:
//! `block_pushing`/`block_popping` fence one side out, `fill`/`drain` bring
//! the queue to a fully-occupied or fully-empty state, and
//! `change_capacity` retires or adds free permits atomically.

use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{SyncError, SyncResult};
use crate::os::{Mutex, Scope};
use crate::semaphore::AdvancedSemaphore;
use crate::timeout::Timeout;

use super::Storage;

/// Fixed-capacity FIFO over an ordered container.
///
/// Created disabled; [`BoundedQueue::enable`] sets the capacity. All
/// operations are available through shared references, so the queue is
/// typically owned by an `Arc` or a `static`.
pub struct BoundedQueue<T, S = VecDeque<T>> {
    /// Serializes lifecycle and flow-control operations.
    lifecycle: Mutex<()>,
    /// Most recently committed capacity; readable without the lifecycle lock.
    capacity: AtomicU32,
    /// Counts empty slots available to producers.
    sem_free: AdvancedSemaphore<u32>,
    /// Counts filled items available to consumers.
    sem_used: AdvancedSemaphore<u32>,
    /// Mutated only from callbacks running inside `sem_free`'s critical
    /// section, plus lifecycle-gated resets.
    storage: Mutex<S>,
    _item: PhantomData<fn(T) -> T>,
}

impl<T: Send> BoundedQueue<T, VecDeque<T>> {
    /// Creates a disabled, process-private queue over a `VecDeque`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_scope(Scope::Private)
    }

    /// Creates a disabled `VecDeque`-backed queue with the given scope.
    #[must_use]
    pub fn with_scope(scope: Scope) -> Self {
        Self::with_storage(scope, VecDeque::new())
    }
}

impl<T: Send> Default for BoundedQueue<T, VecDeque<T>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S: Storage<T>> BoundedQueue<T, S> {
    /// Creates a disabled queue over a caller-provided storage back-end.
    ///
    /// With [`Scope::Shared`], the storage must itself live inside the
    /// shared mapping for other processes to see the items.
    #[must_use]
    pub fn with_storage(scope: Scope, storage: S) -> Self {
        Self {
            lifecycle: Mutex::new(scope, ()),
            capacity: AtomicU32::new(0),
            sem_free: AdvancedSemaphore::with_scope(scope),
            sem_used: AdvancedSemaphore::with_scope(scope),
            storage: Mutex::new(scope, storage),
            _item: PhantomData,
        }
    }

    /// Enables the queue with the given capacity, resetting the storage.
    ///
    /// Fails with [`SyncError::InvalidArguments`] when `capacity` is zero
    /// and with [`SyncError::IncorrectState`] when the queue is already
    /// enabled; a live queue is never silently reset.
    pub fn enable(&self, capacity: u32) -> SyncResult {
        if capacity == 0 {
            return Err(SyncError::InvalidArguments);
        }
        let _lifecycle = self.lifecycle.lock();
        self.sem_free.set_value(capacity)?;
        self.sem_used.set_value(0)?;
        self.storage.lock().clear();
        self.capacity.store(capacity, Ordering::Release);
        self.sem_free.enable();
        self.sem_used.enable();
        tracing::debug!(capacity, "bounded queue enabled");
        Ok(())
    }

    /// Disables both semaphores. In-flight operations unwind with
    /// [`SyncError::Disabled`]; the storage is intentionally not cleared.
    pub fn disable(&self) {
        let _lifecycle = self.lifecycle.lock();
        self.sem_free.disable();
        self.sem_used.disable();
        tracing::debug!("bounded queue disabled");
    }

    /// Empties the storage. Permitted only while disabled, so that no
    /// in-flight operation can be depending on the contents.
    pub fn clear(&self) -> SyncResult {
        let _lifecycle = self.lifecycle.lock();
        if self.sem_free.is_enabled() || self.sem_used.is_enabled() {
            return Err(SyncError::IncorrectState);
        }
        self.storage.lock().clear();
        Ok(())
    }

    /// The most recently committed capacity. May race with a
    /// [`BoundedQueue::change_capacity`] in progress.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity.load(Ordering::Acquire)
    }

    /// Current number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.lock().len()
    }

    /// Returns true when no items are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends an item, waiting for a free slot.
    ///
    /// On failure the item is dropped; the queue itself is unchanged.
    pub fn push(&self, item: T, timeout: Timeout) -> SyncResult {
        let mut item = Some(item);
        self.sem_free.acquire_with(
            || {
                if let Some(item) = item.take() {
                    self.storage.lock().push_back(item);
                }
            },
            timeout,
        )?;
        self.sem_used.release()
    }

    /// Non-blocking [`BoundedQueue::push`].
    pub fn try_push(&self, item: T) -> SyncResult {
        let mut item = Some(item);
        self.sem_free.try_acquire_with(|| {
            if let Some(item) = item.take() {
                self.storage.lock().push_back(item);
            }
        })?;
        self.sem_used.release()
    }

    /// Removes the front item, waiting for one to arrive.
    pub fn pop(&self, timeout: Timeout) -> SyncResult<T> {
        self.sem_used.acquire(timeout)?;
        let mut item = None;
        self.sem_free.release_with(|| {
            item = self.storage.lock().pop_front();
        })?;
        item.ok_or(SyncError::IncorrectState)
    }

    /// Non-blocking [`BoundedQueue::pop`].
    pub fn try_pop(&self) -> SyncResult<T> {
        self.sem_used.try_acquire()?;
        let mut item = None;
        self.sem_free.release_with(|| {
            item = self.storage.lock().pop_front();
        })?;
        item.ok_or(SyncError::IncorrectState)
    }

    /// Fences producers out by taking the free semaphore's blocker scope.
    pub fn block_pushing(&self, timeout: Timeout) -> SyncResult {
        let _lifecycle = self.lifecycle.lock();
        self.sem_free.block(timeout)
    }

    /// Non-blocking [`BoundedQueue::block_pushing`].
    pub fn try_block_pushing(&self) -> SyncResult {
        let _lifecycle = self.lifecycle.lock();
        self.sem_free.try_block()
    }

    /// Releases a pushing fence.
    pub fn unblock_pushing(&self) -> SyncResult {
        let _lifecycle = self.lifecycle.lock();
        self.sem_free.unblock()
    }

    /// Fences consumers out by taking the used semaphore's blocker scope.
    pub fn block_popping(&self, timeout: Timeout) -> SyncResult {
        let _lifecycle = self.lifecycle.lock();
        self.sem_used.block(timeout)
    }

    /// Non-blocking [`BoundedQueue::block_popping`].
    pub fn try_block_popping(&self) -> SyncResult {
        let _lifecycle = self.lifecycle.lock();
        self.sem_used.try_block()
    }

    /// Releases a popping fence.
    pub fn unblock_popping(&self) -> SyncResult {
        let _lifecycle = self.lifecycle.lock();
        self.sem_used.unblock()
    }

    /// Lets producers run and waits until the queue is observed full, with
    /// consumers fenced out on return.
    pub fn fill(&self, timeout: Timeout) -> SyncResult {
        let _lifecycle = self.lifecycle.lock();
        self.sem_free.unblock()?;
        self.sem_used
            .block_and_reserve(self.capacity.load(Ordering::Acquire), timeout)?;
        tracing::debug!("queue filled");
        Ok(())
    }

    /// Lets consumers run and waits until the queue is observed empty, with
    /// producers fenced out on return.
    pub fn drain(&self, timeout: Timeout) -> SyncResult {
        let _lifecycle = self.lifecycle.lock();
        self.sem_used.unblock()?;
        self.sem_free
            .block_and_reserve(self.capacity.load(Ordering::Acquire), timeout)?;
        tracing::debug!("queue drained");
        Ok(())
    }

    /// Changes the capacity of a live queue.
    ///
    /// Growing adds free permits immediately. Shrinking atomically consumes
    /// the excess free permits under blocker scope, waiting for consumers
    /// to vacate slots as needed; a timeout while shrinking leaves
    /// producers fenced until [`BoundedQueue::unblock_pushing`].
    pub fn change_capacity(&self, capacity: u32, timeout: Timeout) -> SyncResult {
        if capacity == 0 {
            return Err(SyncError::InvalidArguments);
        }
        let _lifecycle = self.lifecycle.lock();
        let current = self.capacity.load(Ordering::Acquire);
        if capacity == current {
            return Ok(());
        }
        if capacity < current {
            self.sem_free.block_and_acquire(current - capacity, timeout)?;
            self.capacity.store(capacity, Ordering::Release);
            self.sem_free.unblock()?;
        } else {
            self.sem_free.release_many(capacity - current)?;
            self.capacity.store(capacity, Ordering::Release);
        }
        tracing::debug!(from = current, to = capacity, "queue capacity changed");
        Ok(())
    }
}

impl<T, S> fmt::Debug for BoundedQueue<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
