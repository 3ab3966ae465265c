use std::fmt;
use std::mem;
use std::sync::Arc;

use foldhash::{HashMap, HashMapExt};
use parking_lot::Mutex;

use crate::lcos::SharedState;
use crate::{ReceiveBufferError, TaskError, TaskFuture};

/// Pairs values produced for numbered steps with the consumers of those steps.
///
/// Typical for iterative algorithms where neighbors exchange one value per time step and
/// values for a later step may arrive before the current one is consumed. Each step carries
/// exactly one value and is received exactly once, in any order relative to storing it.
///
/// Dropping the buffer fails every receiver still waiting for a value with
/// [`TaskError::BrokenPromise`].
///
/// # Example
///
/// ```
/// use many_tasks::ReceiveBuffer;
///
/// let buffer = ReceiveBuffer::new();
///
/// buffer.store_received(1, "second").unwrap();
/// let first = buffer.receive(0).unwrap();
/// buffer.store_received(0, "first").unwrap();
///
/// assert_eq!(first.get(), Ok("first"));
/// assert_eq!(buffer.receive(1).unwrap().get(), Ok("second"));
/// assert!(buffer.is_empty());
/// ```
pub struct ReceiveBuffer<T> {
    steps: Mutex<HashMap<usize, Step<T>>>,
}

struct Step<T> {
    state: Arc<SharedState<T>>,
    stored: bool,
    received: bool,
}

impl<T> Step<T> {
    fn new() -> Self {
        Self {
            state: Arc::new(SharedState::new()),
            stored: false,
            received: false,
        }
    }
}

impl<T: Send + 'static> ReceiveBuffer<T> {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(HashMap::new()),
        }
    }

    /// Stores the value of `step`, releasing its receiver if one is already waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveBufferError::AlreadyStored`] if the step already has a value. The new
    /// value is dropped.
    pub fn store_received(&self, step: usize, value: T) -> Result<(), ReceiveBufferError> {
        let state = {
            let mut steps = self.steps.lock();
            let entry = steps.entry(step).or_insert_with(Step::new);

            if entry.stored {
                return Err(ReceiveBufferError::AlreadyStored { step });
            }

            entry.stored = true;
            let state = Arc::clone(&entry.state);

            if entry.received {
                steps.remove(&step);
            }

            state
        };

        // A receiver that cancelled its future no longer wants the value.
        drop(state.complete(Ok(value)));

        Ok(())
    }

    /// Returns a future of the value of `step`, ready once that value is stored.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveBufferError::AlreadyReceived`] if the step was already requested.
    pub fn receive(&self, step: usize) -> Result<TaskFuture<T>, ReceiveBufferError> {
        let mut steps = self.steps.lock();
        let entry = steps.entry(step).or_insert_with(Step::new);

        if entry.received {
            return Err(ReceiveBufferError::AlreadyReceived { step });
        }

        entry.received = true;
        let state = Arc::clone(&entry.state);

        if entry.stored {
            steps.remove(&step);
        }

        Ok(TaskFuture::from_state(state))
    }

    /// Fails every receiver that is still waiting for its value. Returns how many were failed.
    ///
    /// Values stored for steps nobody requested yet are kept.
    pub fn cancel_waiting(&self, error: &TaskError) -> usize {
        let waiting = {
            let mut steps = self.steps.lock();
            let mut waiting = Vec::new();

            steps.retain(|_, entry| {
                if entry.received && !entry.stored {
                    waiting.push(Arc::clone(&entry.state));
                    false
                } else {
                    true
                }
            });

            waiting
        };

        for state in &waiting {
            // Cancelled receivers already have an outcome.
            drop(state.complete(Err(error.clone())));
        }

        waiting.len()
    }

    /// The number of steps with a stored value or a waiting receiver, but not both.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.lock().len()
    }

    /// Whether every stored value has been received and nobody is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send + 'static> Default for ReceiveBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ReceiveBuffer<T> {
    fn drop(&mut self) {
        for entry in mem::take(self.steps.get_mut()).into_values() {
            if !entry.stored {
                drop(entry.state.complete(Err(TaskError::BrokenPromise)));
            }
        }
    }
}

impl<T> fmt::Debug for ReceiveBuffer<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps = self.steps.lock();
        let waiting = steps.values().filter(|entry| !entry.stored).count();

        f.debug_struct("ReceiveBuffer")
            .field("stored", &steps.len().saturating_sub(waiting))
            .field("waiting", &waiting)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(ReceiveBuffer<u32>: Send, Sync);

    #[test]
    fn value_stored_first_is_ready_on_receive() {
        let buffer = ReceiveBuffer::new();

        buffer.store_received(3, 30).unwrap();
        assert_eq!(buffer.len(), 1);

        let value = buffer.receive(3).unwrap();

        assert!(value.is_ready());
        assert_eq!(value.get(), Ok(30));
        assert!(buffer.is_empty());
    }

    #[test]
    fn receiver_waits_for_value_from_other_thread() {
        let buffer = Arc::new(ReceiveBuffer::new());
        let value = buffer.receive(0).unwrap();

        assert!(!value.is_ready());

        let producer = thread::spawn({
            let buffer = Arc::clone(&buffer);
            move || buffer.store_received(0, "hello").unwrap()
        });

        assert_eq!(value.get(), Ok("hello"));
        producer.join().unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn steps_are_independent_of_order() {
        let buffer = ReceiveBuffer::new();

        let later = buffer.receive(5).unwrap();
        buffer.store_received(4, 'a').unwrap();
        buffer.store_received(5, 'b').unwrap();

        assert_eq!(later.get(), Ok('b'));
        assert_eq!(buffer.receive(4).unwrap().get(), Ok('a'));
    }

    #[test]
    fn storing_twice_is_error() {
        let buffer = ReceiveBuffer::new();

        buffer.store_received(1, 1).unwrap();

        assert_eq!(
            buffer.store_received(1, 2),
            Err(ReceiveBufferError::AlreadyStored { step: 1 })
        );
        assert_eq!(buffer.receive(1).unwrap().get(), Ok(1));
    }

    #[test]
    fn receiving_twice_is_error() {
        let buffer = ReceiveBuffer::<u8>::new();

        let first = buffer.receive(2).unwrap();

        assert!(matches!(
            buffer.receive(2),
            Err(ReceiveBufferError::AlreadyReceived { step: 2 })
        ));

        buffer.store_received(2, 9).unwrap();
        assert_eq!(first.get(), Ok(9));
    }

    #[test]
    fn cancel_waiting_fails_only_waiting_receivers() {
        let buffer = ReceiveBuffer::new();

        let waiting = buffer.receive(0).unwrap();
        buffer.store_received(1, 10).unwrap();

        assert_eq!(buffer.cancel_waiting(&TaskError::Cancelled), 1);
        assert_eq!(waiting.get(), Err(TaskError::Cancelled));

        // The stored value survives.
        assert_eq!(buffer.receive(1).unwrap().get(), Ok(10));
    }

    #[test]
    fn drop_breaks_waiting_receivers() {
        let buffer = ReceiveBuffer::<u32>::new();
        let waiting = buffer.receive(7).unwrap();

        drop(buffer);

        assert_eq!(waiting.get(), Err(TaskError::BrokenPromise));
    }
}
