use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::lcos::{PackagedTask, SharedState};
use crate::{PoolHandle, TaskFuture, TaskOptions, TaskResult};

/// A future whose outcome can be read any number of times, from any number of clones.
///
/// Obtained from [`TaskFuture::share()`] or from LCOs with many consumers, such as
/// [`AndGate::future()`][crate::AndGate::future]. Every read clones the outcome.
#[must_use = "a future does nothing to its outcome unless it is waited on"]
pub struct SharedTaskFuture<T> {
    state: Arc<SharedState<T>>,
}

impl<T> SharedTaskFuture<T> {
    pub(crate) fn from_state(state: Arc<SharedState<T>>) -> Self {
        Self { state }
    }

    /// Whether the outcome is available.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Waits until the outcome is available.
    ///
    /// On a worker thread, the worker keeps executing other tasks while it waits.
    pub fn wait(&self) {
        self.state.wait();
    }
}

impl<T: Clone + Send + 'static> SharedTaskFuture<T> {
    /// Waits for the outcome and returns a copy of it.
    ///
    /// # Errors
    ///
    /// Returns the reason the producer did not provide a value.
    pub fn get(&self) -> TaskResult<T> {
        self.state.wait();
        self.state.cloned()
    }

    /// Schedules `continuation` on `pool` with a copy of the outcome, once there is one.
    ///
    /// Each attached continuation observes the outcome exactly once.
    pub fn then<R, F>(&self, pool: &PoolHandle, continuation: F) -> TaskFuture<R>
    where
        R: Send + 'static,
        F: FnOnce(TaskResult<T>) -> R + Send + 'static,
    {
        self.then_with(pool, TaskOptions::default(), continuation)
    }

    /// Same as [`then()`][Self::then] but with explicit task options for the continuation.
    pub fn then_with<R, F>(
        &self,
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
                PackagedTask::with_state(target, move || continuation(source.cloned()));
            pool.spawn_packaged(options, packaged);
        }));

        TaskFuture::from_state(output)
    }
}

impl<T> Clone for SharedTaskFuture<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone> Future for SharedTaskFuture<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.state.poll_cloned(cx)
    }
}

impl<T> fmt::Debug for SharedTaskFuture<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedTaskFuture")
            .field("state", &self.state)
            .finish()
    }
}
