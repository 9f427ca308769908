//! Single-slot rendezvous queue.

use std::fmt;

use crate::error::{SyncError, SyncResult};
use crate::os::{Mutex, Scope};
use crate::semaphore::AdvancedSemaphore;
use crate::timeout::Timeout;

/// Zero-capacity hand-off queue.
///
/// Each `push` succeeds only after a matching `pop` has claimed its value,
/// and each `pop` succeeds only after a matching `push` has deposited one:
/// the two sides meet in time, not just in order.
///
/// The push side runs under the push semaphore's blocker scope, so exactly
/// one producer is inside the hand-off protocol at a time even as many
/// contend. A push that times out mid-protocol leaves the scope held by the
/// caller; its deposited value is still delivered to the next pop, after
/// which the push token returns and the producer side can be unwedged by
/// retrying or disabling.
pub struct SyncQueue<T> {
    lifecycle: Mutex<()>,
    buffer: Mutex<Option<T>>,
    /// One permit when a producer may enter the hand-off.
    push_sem: AdvancedSemaphore<u32>,
    /// One permit while a deposited value awaits its pop.
    pop_sem: AdvancedSemaphore<u32>,
}

impl<T: Send> SyncQueue<T> {
    /// Creates a disabled, process-private rendezvous queue.
    #[must_use]
    pub fn new() -> Self {
        Self::with_scope(Scope::Private)
    }

    /// Creates a disabled rendezvous queue with the given sharing scope.
    #[must_use]
    pub fn with_scope(scope: Scope) -> Self {
        Self {
            lifecycle: Mutex::new(scope, ()),
            buffer: Mutex::new(scope, None),
            push_sem: AdvancedSemaphore::with_scope(scope),
            pop_sem: AdvancedSemaphore::with_scope(scope),
        }
    }

    /// Enables the queue: one push token, no deposited value.
    pub fn enable(&self) -> SyncResult {
        let _lifecycle = self.lifecycle.lock();
        self.push_sem.set_value(1)?;
        self.pop_sem.set_value(0)?;
        *self.buffer.lock() = None;
        self.push_sem.enable();
        self.pop_sem.enable();
        tracing::debug!("sync queue enabled");
        Ok(())
    }

    /// Disables both semaphores; parked pushers and poppers unwind with
    /// [`SyncError::Disabled`].
    pub fn disable(&self) {
        let _lifecycle = self.lifecycle.lock();
        self.push_sem.disable();
        self.pop_sem.disable();
        tracing::debug!("sync queue disabled");
    }

    /// Hands an item to a matching [`SyncQueue::pop`], waiting until that
    /// pop has claimed it.
    pub fn push(&self, item: T, timeout: Timeout) -> SyncResult {
        self.push_sem.block_and_acquire(1, timeout)?;
        *self.buffer.lock() = Some(item);
        self.pop_sem.release()?;
        self.push_sem.reserve_and_unblock(1, timeout)
    }

    /// Claims the value of a matching [`SyncQueue::push`], waiting for one
    /// to arrive.
    pub fn pop(&self, timeout: Timeout) -> SyncResult<T> {
        self.pop_sem.acquire(timeout)?;
        let item = self.buffer.lock().take();
        self.push_sem.release()?;
        item.ok_or(SyncError::IncorrectState)
    }
}

impl<T: Send> Default for SyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SyncQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncQueue").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn push_waits_for_matching_pop() {
        init_test("push_waits_for_matching_pop");
        let queue: Arc<SyncQueue<u32>> = Arc::new(SyncQueue::new());
        queue.enable().expect("enable");

        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.push(99, Timeout::NEVER))
        };
        std::thread::sleep(Duration::from_millis(50));
        let item = queue.pop(Timeout::NEVER).expect("pop");
        crate::assert_with_log!(item == 99, "handed-off value", 99u32, item);
        let pushed = producer.join().expect("thread failed");
        crate::assert_with_log!(pushed == Ok(()), "push completed", Ok::<(), SyncError>(()), pushed);
        crate::test_complete!("push_waits_for_matching_pop");
    }

    #[test]
    fn pop_times_out_without_producer()  {
        init_test("pop_times_out_without_producer");
        let queue: SyncQueue<u32> = SyncQueue::new();
        queue.enable().expect("enable");
        let err = queue
            .pop(Timeout::after(Duration::from_millis(50)))
            .expect_err("no producer");
        crate::assert_with_log!(
            err == SyncError::UnavailableOrTimeout,
            "pop timed out",
            SyncError::UnavailableOrTimeout,
            err
        );
        crate::test_complete!("pop_times_out_without_producer");
    }

    #[test]
    fn disabled_queue_rejects_both_sides() {
        init_test("disabled_queue_rejects_both_sides");
        let queue: SyncQueue<u32> = SyncQueue::new();
        let pushed = queue.push(1, Timeout::NEVER);
        let popped = queue.pop(Timeout::NEVER).map(|_| ());
        crate::assert_with_log!(
            pushed == Err(SyncError::Disabled),
            "push while disabled",
            Err::<(), _>(SyncError::Disabled),
            pushed
        );
        crate::assert_with_log!(
            popped == Err(SyncError::Disabled),
            "pop while disabled",
            Err::<(), _>(SyncError::Disabled),
            popped
        );
        crate::test_complete!("disabled_queue_rejects_both_sides");
    }
}
