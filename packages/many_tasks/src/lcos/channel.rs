use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::lcos::SharedState;
use crate::{TaskError, TaskFuture, TaskResult};

/// An unbounded queue connecting producers with consumers that receive values as futures.
///
/// Values and receive requests are paired in FIFO order: the oldest buffered value goes to the
/// next `get()`, and the oldest waiting `get()` receives the next `set()`. Clones refer to the
/// same channel.
///
/// Closing the channel discards buffered values and fails every waiting receiver with
/// [`TaskError::ChannelClosed`]. The same happens when the last clone is dropped.
///
/// # Example
///
/// ```
/// use many_tasks::Channel;
///
/// let channel = Channel::new();
/// let received = channel.get();
///
/// channel.set("ping").unwrap();
///
/// assert_eq!(received.get(), Ok("ping"));
/// ```
pub struct Channel<T> {
    inner: Arc<Mutex<ChannelState<T>>>,
}

struct ChannelState<T> {
    values: VecDeque<T>,
    receivers: VecDeque<Arc<SharedState<T>>>,
    closed: bool,
}

impl<T: Send + 'static> Channel<T> {
    /// Creates an open, empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ChannelState {
                values: VecDeque::new(),
                receivers: VecDeque::new(),
                closed: false,
            })),
        }
    }

    /// Delivers a value to the oldest waiting receiver or buffers it if nobody is waiting.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::ChannelClosed`] if the channel is closed. The value is dropped.
    pub fn set(&self, value: T) -> TaskResult<()> {
        let mut value = value;

        loop {
            let receiver = {
                let mut state = self.inner.lock();

                if state.closed {
                    return Err(TaskError::ChannelClosed);
                }

                let Some(receiver) = state.receivers.pop_front() else {
                    state.values.push_back(value);
                    return Ok(());
                };

                receiver
            };

            // Completed outside the lock; continuations may use the channel again.
            match receiver.complete(Ok(value)) {
                Ok(()) => return Ok(()),
                // The receiver was cancelled. Hand the value to the next one.
                Err(Ok(returned)) => value = returned,
                Err(Err(_)) => return Ok(()),
            }
        }
    }

    /// Returns a future of the next value.
    ///
    /// The future is ready immediately if a value is buffered or the channel is closed.
    pub fn get(&self) -> TaskFuture<T> {
        let mut state = self.inner.lock();

        if let Some(value) = state.values.pop_front() {
            return TaskFuture::from_state(Arc::new(SharedState::with_outcome(Ok(value))));
        }

        if state.closed {
            return TaskFuture::from_state(Arc::new(SharedState::with_outcome(Err(
                TaskError::ChannelClosed,
            ))));
        }

        let receiver = Arc::new(SharedState::new());
        state.receivers.push_back(Arc::clone(&receiver));

        TaskFuture::from_state(receiver)
    }

    /// Closes the channel. Returns the number of buffered values that were discarded.
    ///
    /// Closing an already closed channel does nothing.
    pub fn close(&self) -> usize {
        let (discarded, receivers) = {
            let mut state = self.inner.lock();
            state.closed = true;

            let discarded = state.values.len();
            state.values.clear();

            (discarded, mem::take(&mut state.receivers))
        };

        fail_receivers(receivers);

        discarded
    }

    /// Whether the channel has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// The number of values waiting for a receiver.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    /// Whether no values are waiting for a receiver.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn fail_receivers<T>(receivers: VecDeque<Arc<SharedState<T>>>) {
    for receiver in receivers {
        // Cancelled receivers already have an outcome.
        drop(receiver.complete(Err(TaskError::ChannelClosed)));
    }
}

impl<T: Send + 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Drop for ChannelState<T> {
    fn drop(&mut self) {
        fail_receivers(mem::take(&mut self.receivers));
    }
}

impl<T> fmt::Debug for Channel<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();

        f.debug_struct("Channel")
            .field("buffered", &state.values.len())
            .field("receivers", &state.receivers.len())
            .field("closed", &state.closed)
            .finish()
    }
}
