//! The state shared between the producing and consuming ends of every LCO.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use event_listener::{Event, Listener};
use parking_lot::Mutex;

use crate::thread_pool::context;
use crate::{TaskError, TaskResult};

// Completion state machine. PENDING -> COMPLETING -> READY, driven by a single compare-and-set
// from PENDING; whoever wins that race gets to store the outcome.
const PENDING: u8 = 0;
const COMPLETING: u8 = 1;
const READY: u8 = 2;

// Start state machine, only meaningful for futures backed by a task.
// NOT_STARTED -> STARTED (task runs) or NOT_STARTED -> CANCELLED (task never runs).
const NOT_STARTED: u8 = 0;
const STARTED: u8 = 1;
const CANCELLED: u8 = 2;

/// How long a worker that found nothing to help with sleeps before looking again.
const HELP_RETRY: Duration = Duration::from_millis(1);

/// A callback invoked once the outcome is available.
pub(crate) type Callback = Box<dyn FnOnce() + Send>;

pub(crate) struct SharedState<T> {
    completion: AtomicU8,
    start: AtomicU8,
    slot: Mutex<Slot<T>>,

    /// Signaled once the outcome is available, for blocking waiters.
    ready: Event,
}

struct Slot<T> {
    outcome: Option<TaskResult<T>>,
    callbacks: Vec<Callback>,
    wakers: Vec<Waker>,
}

impl<T> SharedState<T> {
    pub(crate) fn new() -> Self {
        Self {
            completion: AtomicU8::new(PENDING),
            start: AtomicU8::new(NOT_STARTED),
            slot: Mutex::new(Slot {
                outcome: None,
                callbacks: Vec::new(),
                wakers: Vec::new(),
            }),
            ready: Event::new(),
        }
    }

    pub(crate) fn with_outcome(outcome: TaskResult<T>) -> Self {
        Self {
            completion: AtomicU8::new(READY),
            start: AtomicU8::new(STARTED),
            slot: Mutex::new(Slot {
                outcome: Some(outcome),
                callbacks: Vec::new(),
                wakers: Vec::new(),
            }),
            ready: Event::new(),
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.completion.load(Ordering::Acquire) == READY
    }

    /// Stores the outcome and runs every registered callback, in registration order.
    ///
    /// If an outcome was already stored, nothing happens and the rejected outcome is returned.
    pub(crate) fn complete(&self, outcome: TaskResult<T>) -> Result<(), TaskResult<T>> {
        if self
            .completion
            .compare_exchange(PENDING, COMPLETING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(outcome);
        }

        let (callbacks, wakers) = {
            let mut slot = self.slot.lock();
            slot.outcome = Some(outcome);

            // Stored under the lock so that on_ready() either sees READY or gets its callback
            // into the list we are about to take.
            self.completion.store(READY, Ordering::Release);

            (mem::take(&mut slot.callbacks), mem::take(&mut slot.wakers))
        };

        self.ready.notify(usize::MAX);

        for waker in wakers {
            waker.wake();
        }

        for callback in callbacks {
            callback();
        }

        Ok(())
    }

    /// Runs the callback once the outcome is available: right now if it already is.
    pub(crate) fn on_ready(&self, callback: Callback) {
        {
            let mut slot = self.slot.lock();

            if !self.is_ready() {
                slot.callbacks.push(callback);
                return;
            }
        }

        callback();
    }

    /// Marks the backing task as started. Returns `false` if it was cancelled.
    pub(crate) fn try_start(&self) -> bool {
        self.start
            .compare_exchange(NOT_STARTED, STARTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Fails the future with [`TaskError::Cancelled`] if its task has not started yet.
    pub(crate) fn cancel(&self) -> bool {
        if self
            .start
            .compare_exchange(NOT_STARTED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.complete(Err(TaskError::Cancelled)).is_ok()
    }

    /// Blocks until the outcome is available.
    ///
    /// On a worker thread, the worker keeps executing other tasks while it waits.
    pub(crate) fn wait(&self) {
        loop {
            if self.is_ready() {
                return;
            }

            if context::help_one() {
                continue;
            }

            let listener = self.ready.listen();

            // Re-check after registering listener to avoid lost wakeups.
            if self.is_ready() {
                return;
            }

            if context::is_worker_thread() {
                // Work may show up in the scheduler without anyone signaling us.
                listener.wait_timeout(HELP_RETRY);
            } else {
                listener.wait();
            }
        }
    }

    /// Removes the outcome. Only the unique consumer calls this, once, after the state is ready.
    pub(crate) fn take(&self) -> TaskResult<T> {
        self.slot
            .lock()
            .outcome
            .take()
            .expect("outcome is taken at most once, after it was stored")
    }

    pub(crate) fn poll_take(&self, cx: &Context<'_>) -> Poll<TaskResult<T>> {
        let mut slot = self.slot.lock();

        if self.is_ready() {
            return Poll::Ready(
                slot.outcome
                    .take()
                    .expect("TaskFuture polled after completion"),
            );
        }

        register_waker(&mut slot.wakers, cx.waker());
        Poll::Pending
    }
}

impl<T: Clone> SharedState<T> {
    /// Clones the outcome. Only called after the state is ready.
    pub(crate) fn cloned(&self) -> TaskResult<T> {
        self.slot
            .lock()
            .outcome
            .clone()
            .expect("shared outcomes are never taken")
    }

    pub(crate) fn poll_cloned(&self, cx: &Context<'_>) -> Poll<TaskResult<T>> {
        let mut slot = self.slot.lock();

        if self.is_ready() {
            return Poll::Ready(
                slot.outcome
                    .clone()
                    .expect("shared outcomes are never taken"),
            );
        }

        register_waker(&mut slot.wakers, cx.waker());
        Poll::Pending
    }
}

fn register_waker(wakers: &mut Vec<Waker>, waker: &Waker) {
    if !wakers.iter().any(|existing| existing.will_wake(waker)) {
        wakers.push(waker.clone());
    }
}

impl<T> fmt::Debug for SharedState<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedState")
            .field("ready", &self.is_ready())
            .field("start", &self.start.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
