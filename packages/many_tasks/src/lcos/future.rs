use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::lcos::{PackagedTask, SharedState};
use crate::{PoolHandle, SharedTaskFuture, TaskOptions, TaskResult};

/// The consuming end of an asynchronous result: the outcome of a task, promise or LCO.
///
/// A `TaskFuture` is the unique handle to its outcome. [`get()`][Self::get] consumes it and
/// returns the outcome; [`share()`][Self::share] converts it into a [`SharedTaskFuture`] that
/// can be cloned and read many times.
///
/// Waiting on a future from one of a pool's worker threads does not idle the worker: the worker
/// keeps executing other tasks from its queues until the awaited outcome is available. Outside
/// worker threads, waiting blocks the calling thread.
///
/// `TaskFuture` also implements [`Future`], so it can be awaited from any executor.
#[must_use = "a future does nothing to its outcome unless it is waited on"]
pub struct TaskFuture<T> {
    state: Arc<SharedState<T>>,
}

impl<T> TaskFuture<T> {
    pub(crate) fn from_state(state: Arc<SharedState<T>>) -> Self {
        Self { state }
    }

    pub(crate) fn state(&self) -> &Arc<SharedState<T>> {
        &self.state
    }

    /// Whether the outcome is available, i.e. [`get()`][Self::get] would not block.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Waits until the outcome is available without consuming it.
    pub fn wait(&self) {
        self.state.wait();
    }

    /// Waits for and returns the outcome.
    ///
    /// # Errors
    ///
    /// Returns the reason the producer did not provide a value: a panic in the task body,
    /// cancellation, shutdown of the pool or a dropped promise.
    pub fn get(self) -> TaskResult<T> {
        self.state.wait();
        self.state.take()
    }

    /// Cancels the task behind this future if it has not started yet.
    ///
    /// Returns `true` if the future was failed with [`TaskError::Cancelled`][crate::TaskError].
    /// A task that is already running always runs to completion and `false` is returned.
    pub fn cancel(&self) -> bool {
        self.state.cancel()
    }
}

impl<T: Send + 'static> TaskFuture<T> {
    /// Schedules `continuation` on `pool` once this future has an outcome.
    ///
    /// The continuation receives the outcome (value or error) and its return value becomes the
    /// value of the returned future. If this future is already ready, the continuation is
    /// scheduled right away. If the pool is shutting down by then, the returned future fails
    /// with [`TaskError::RuntimeShuttingDown`][crate::TaskError].
    ///
    /// # Example
    ///
    /// ```
    /// use many_tasks::{PoolDeclaration, ResourcePartitioner, Runtime, SchedulingPolicy};
    ///
    /// let partitioner = ResourcePartitioner::builder()
    ///     .pool(PoolDeclaration::new("default", SchedulingPolicy::Local))
    ///     .build()
    ///     .unwrap();
    /// let runtime = Runtime::start(partitioner);
    /// let pool = runtime.default_pool();
    ///
    /// let doubled = pool
    ///     .submit(|| 21)
    ///     .unwrap()
    ///     .then(pool.handle(), |outcome| outcome.unwrap() * 2);
    ///
    /// assert_eq!(doubled.get(), Ok(42));
    /// runtime.finalize().unwrap();
    /// ```
    pub fn then<R, F>(self, pool: &PoolHandle, continuation: F) -> TaskFuture<R>
    where
        R: Send + 'static,
        F: FnOnce(TaskResult<T>) -> R + Send + 'static,
    {
        self.then_with(pool, TaskOptions::default(), continuation)
    }

    /// Same as [`then()`][Self::then] but with explicit task options for the continuation.
    pub fn then_with<R, F>(
        self,
        pool: &PoolHandle,
        options: TaskOptions,
        continuation: F,
    ) -> TaskFuture<R>
    where
        R: Send + 'static,
        F: FnOnce(TaskResult<T>) -> R + Send + 'static,
    {
        let pool = Arc::clone(&pool.inner);
        let output = Arc::new(SharedState::new());

        let source = Arc::clone(&self.state);
        let target = Arc::clone(&output);

        self.state.on_ready(Box::new(move || {
            let packaged =
                PackagedTask::with_state(target, move || continuation(source.take()));
            pool.spawn_packaged(options, packaged);
        }));

        TaskFuture::from_state(output)
    }

    /// Converts this future into one that can be cloned and read any number of times.
    pub fn share(self) -> SharedTaskFuture<T>
    where
        T: Clone,
    {
        SharedTaskFuture::from_state(self.state)
    }

    /// Transforms the outcome on whichever thread completes this future.
    ///
    /// Only for cheap bookkeeping; anything substantial belongs in a task via `then()`.
    pub(crate) fn map_inline<R, F>(self, transform: F) -> TaskFuture<R>
    where
        R: Send + 'static,
        F: FnOnce(TaskResult<T>) -> TaskResult<R> + Send + 'static,
    {
        let output = Arc::new(SharedState::new());

        let source = Arc::clone(&self.state);
        let target = Arc::clone(&output);

        self.state.on_ready(Box::new(move || {
            // Nobody else completes this state.
            drop(target.complete(transform(source.take())));
        }));

        TaskFuture::from_state(output)
    }
}

impl<T> Future for TaskFuture<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.state.poll_take(cx)
    }
}

impl<T> fmt::Debug for TaskFuture<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture")
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::executor::block_on;
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::lcos::make_ready_future;
    use crate::{Promise, TaskError};

    assert_impl_all!(TaskFuture<u32>: Send, Sync, Unpin);

    #[test]
    fn ready_future_is_ready() {
        let future = make_ready_future(3);

        assert!(future.is_ready());
        future.wait();
        assert_eq!(future.get(), Ok(3));
    }

    #[test]
    fn awaitable_from_foreign_executor() {
        let mut promise = Promise::new();
        let future = promise.get_future().unwrap();

        promise.set_value(7).unwrap();

        assert_eq!(block_on(future), Ok(7));
    }

    #[test]
    fn map_inline_runs_on_completion() {
        let mut promise = Promise::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mapped = promise.get_future().unwrap().map_inline({
            let calls = Arc::clone(&calls);
            move |outcome| {
                calls.fetch_add(1, Ordering::Relaxed);
                outcome.map(|value: u32| value + 1)
            }
        });

        assert_eq!(calls.load(Ordering::Relaxed), 0);
        promise.set_value(1).unwrap();

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(mapped.get(), Ok(2));
    }

    #[test]
    fn map_inline_carries_errors() {
        let mut promise = Promise::<u32>::new();
        let mapped = promise.get_future().unwrap().map_inline(|outcome| outcome);

        drop(promise);

        assert_eq!(mapped.get(), Err(TaskError::BrokenPromise));
    }

    #[test]
    fn shared_future_sees_same_value() {
        let mut promise = Promise::new();
        let shared = promise.get_future().unwrap().share();
        let clone = shared.clone();

        promise.set_value(String::from("x")).unwrap();

        assert_eq!(shared.get(), Ok(String::from("x")));
        assert_eq!(clone.get(), Ok(String::from("x")));
    }
}
