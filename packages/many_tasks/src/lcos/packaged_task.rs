use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::trace;

use crate::lcos::{SharedState, panic_message};
use crate::{TaskError, TaskFuture};

type Work<R> = Box<dyn FnOnce() -> R + Send>;

/// A callable bundled with the promise for its result.
///
/// Running the packaged task executes the callable and delivers its return value (or the panic
/// it raised, as [`TaskError::Execution`]) to the paired future. A packaged task whose future
/// was cancelled before it ran does nothing. Dropping a packaged task without running it fails
/// the future with [`TaskError::BrokenPromise`].
///
/// Thread pools use this to turn submitted closures into tasks; it is also useful for running
/// work on threads the runtime does not manage.
///
/// # Example
///
/// ```
/// use std::thread;
///
/// use many_tasks::PackagedTask;
///
/// let (task, future) = PackagedTask::new(|| 6 * 7);
///
/// thread::spawn(move || task.run()).join().unwrap();
///
/// assert_eq!(future.get(), Ok(42));
/// ```
pub struct PackagedTask<R> {
    // Taken when the task runs or is abandoned.
    work: Option<Work<R>>,
    state: Arc<SharedState<R>>,
}

impl<R: Send + 'static> PackagedTask<R> {
    /// Packages `work`, returning the task and the future of its result.
    pub fn new<F>(work: F) -> (Self, TaskFuture<R>)
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let state = Arc::new(SharedState::new());
        let future = TaskFuture::from_state(Arc::clone(&state));

        (Self::with_state(state, work), future)
    }

    pub(crate) fn with_state<F>(state: Arc<SharedState<R>>, work: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
    {
        Self {
            work: Some(Box::new(work)),
            state,
        }
    }

    /// Executes the work and delivers the outcome to the future.
    pub fn run(mut self) {
        let Some(work) = self.work.take() else {
            return;
        };

        if !self.state.try_start() {
            trace!("skipping task whose future was cancelled");
            return;
        }

        let outcome =
            panic::catch_unwind(AssertUnwindSafe(work)).map_err(|payload| TaskError::Execution {
                message: panic_message(payload.as_ref()),
            });

        // Once started, nothing else completes the state.
        drop(self.state.complete(outcome));
    }

    /// Discards the work and fails the future with the given error instead.
    pub(crate) fn abandon(mut self, error: TaskError) {
        self.work = None;
        drop(self.state.complete(Err(error)));
    }
}

impl<R> Drop for PackagedTask<R> {
    fn drop(&mut self) {
        if self.work.take().is_some() {
            drop(self.state.complete(Err(TaskError::BrokenPromise)));
        }
    }
}

impl<R> fmt::Debug for PackagedTask<R> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackagedTask")
            .field("pending", &self.work.is_some())
            .field("state", &self.state)
            .finish()
    }
}
