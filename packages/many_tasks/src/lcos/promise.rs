use std::fmt;
use std::sync::Arc;

use crate::lcos::SharedState;
use crate::{PromiseError, TaskError, TaskFuture};

/// The producing end of a [`TaskFuture`], satisfied by hand instead of by a task.
///
/// A promise hands out exactly one future. Setting a value (or an error) on the promise makes
/// that future ready. Dropping the promise without setting anything fails the future with
/// [`TaskError::BrokenPromise`], so a consumer never waits on a producer that is gone.
///
/// # Example
///
/// ```
/// use many_tasks::Promise;
///
/// let mut promise = Promise::new();
/// let future = promise.get_future().unwrap();
///
/// promise.set_value(42).unwrap();
/// assert_eq!(future.get(), Ok(42));
/// ```
pub struct Promise<T> {
    state: Arc<SharedState<T>>,
    future_retrieved: bool,
}

impl<T: Send + 'static> Promise<T> {
    /// Creates a promise whose future is not yet ready.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(SharedState::new()),
            future_retrieved: false,
        }
    }

    /// Returns the future that this promise satisfies.
    ///
    /// # Errors
    ///
    /// Returns [`PromiseError::FutureAlreadyRetrieved`] on every call after the first.
    pub fn get_future(&mut self) -> Result<TaskFuture<T>, PromiseError> {
        if self.future_retrieved {
            return Err(PromiseError::FutureAlreadyRetrieved);
        }

        self.future_retrieved = true;
        Ok(TaskFuture::from_state(Arc::clone(&self.state)))
    }

    /// Makes the future ready with a value.
    ///
    /// # Errors
    ///
    /// Returns [`PromiseError::AlreadySatisfied`] if the future already has an outcome,
    /// which happens when the consumer cancelled it.
    pub fn set_value(self, value: T) -> Result<(), PromiseError> {
        self.satisfy(Ok(value))
    }

    /// Makes the future ready with an error.
    ///
    /// # Errors
    ///
    /// Returns [`PromiseError::AlreadySatisfied`] if the future already has an outcome.
    pub fn set_error(self, error: TaskError) -> Result<(), PromiseError> {
        self.satisfy(Err(error))
    }

    /// Whether the future already has an outcome.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.state.is_ready()
    }

    fn satisfy(&self, outcome: crate::TaskResult<T>) -> Result<(), PromiseError> {
        self.state
            .complete(outcome)
            .map_err(|_rejected| PromiseError::AlreadySatisfied)
    }
}

impl<T: Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        // Fails only if the promise was satisfied, in which case there is nothing to do.
        drop(self.state.complete(Err(TaskError::BrokenPromise)));
    }
}

impl<T> fmt::Debug for Promise<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state)
            .field("future_retrieved", &self.future_retrieved)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Promise<u32>: Send, Sync);

    #[test]
    fn value_reaches_future() {
        let mut promise = Promise::new();
        let future = promise.get_future().unwrap();

        assert!(!future.is_ready());
        promise.set_value("hello").unwrap();

        assert_eq!(future.get(), Ok("hello"));
    }

    #[test]
    fn error_reaches_future() {
        let mut promise = Promise::<u8>::new();
        let future = promise.get_future().unwrap();

        promise.set_error(TaskError::Cancelled).unwrap();

        assert_eq!(future.get(), Err(TaskError::Cancelled));
    }

    #[test]
    fn future_can_be_retrieved_once() {
        let mut promise = Promise::<u8>::new();

        let _future = promise.get_future().unwrap();

        assert_eq!(
            promise.get_future().unwrap_err(),
            PromiseError::FutureAlreadyRetrieved
        );
    }

    #[test]
    fn dropped_promise_breaks_future() {
        let mut promise = Promise::<u8>::new();
        let future = promise.get_future().unwrap();

        drop(promise);

        assert_eq!(future.get(), Err(TaskError::BrokenPromise));
    }

    #[test]
    fn cancelled_future_rejects_value() {
        let mut promise = Promise::new();
        let future = promise.get_future().unwrap();

        assert!(future.cancel());
        assert!(promise.is_satisfied());

        assert_eq!(promise.set_value(1), Err(PromiseError::AlreadySatisfied));
        assert_eq!(future.get(), Err(TaskError::Cancelled));
    }
}
