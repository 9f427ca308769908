//! Bounded FIFO queue without flow control.

use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{SyncError, SyncResult};
use crate::os::{Mutex, Scope};
use crate::semaphore::Semaphore;
use crate::timeout::Timeout;

use super::Storage;

/// Fixed-capacity FIFO composed from two basic semaphores.
///
/// Same push/pop contract as [`super::BoundedQueue`], for pipelines that
/// never pause, fill, drain, or resize and so have no use for the blocker
/// machinery.
pub struct BasicQueue<T, S = VecDeque<T>> {
    lifecycle: Mutex<()>,
    capacity: AtomicU32,
    sem_free: Semaphore<u32>,
    sem_used: Semaphore<u32>,
    storage: Mutex<S>,
    _item: PhantomData<fn(T) -> T>,
}

impl<T: Send> BasicQueue<T, VecDeque<T>> {
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

impl<T: Send> Default for BasicQueue<T, VecDeque<T>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S: Storage<T>> BasicQueue<T, S> {
    /// Creates a disabled queue over a caller-provided storage back-end.
    #[must_use]
    pub fn with_storage(scope: Scope, storage: S) -> Self {
        Self {
            lifecycle: Mutex::new(scope, ()),
            capacity: AtomicU32::new(0),
            sem_free: Semaphore::with_scope(scope),
            sem_used: Semaphore::with_scope(scope),
            storage: Mutex::new(scope, storage),
            _item: PhantomData,
        }
    }

    /// Enables the queue with the given capacity, resetting the storage.
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
        tracing::debug!(capacity, "basic queue enabled");
        Ok(())
    }

    /// Disables both semaphores; the storage is intentionally not cleared.
    pub fn disable(&self) {
        let _lifecycle = self.lifecycle.lock();
        self.sem_free.disable();
        self.sem_used.disable();
        tracing::debug!("basic queue disabled");
    }

    /// Empties the storage. Permitted only while disabled.
    pub fn clear(&self) -> SyncResult {
        let _lifecycle = self.lifecycle.lock();
        if self.sem_free.is_enabled() || self.sem_used.is_enabled() {
            return Err(SyncError::IncorrectState);
        }
        self.storage.lock().clear();
        Ok(())
    }

    /// The capacity set at the last enable.
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

    /// Appends an item, waiting for a free slot. On failure the item is
    /// dropped; the queue itself is unchanged.
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

    /// Non-blocking [`BasicQueue::push`].
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

    /// Non-blocking [`BasicQueue::pop`].
    pub fn try_pop(&self) -> SyncResult<T> {
        self.sem_used.try_acquire()?;
        let mut item = None;
        self.sem_free.release_with(|| {
            item = self.storage.lock().pop_front();
        })?;
        item.ok_or(SyncError::IncorrectState)
    }
}

impl<T: Clone, S: Storage<T>> BasicQueue<T, S> {
    /// Copies the front item without removing it, waiting for one to
    /// arrive. The used permit is consumed for the duration of the read and
    /// returned with the copy.
    pub fn peek(&self, timeout: Timeout) -> SyncResult<T> {
        self.sem_used.acquire(timeout)?;
        let mut item = None;
        self.sem_used.release_with(|| {
            item = self.storage.lock().front().cloned();
        })?;
        item.ok_or(SyncError::IncorrectState)
    }
}

impl<T, S> fmt::Debug for BasicQueue<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicQueue")
            .field("capacity", &self.capacity.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
