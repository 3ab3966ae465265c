use std::sync::Arc;

use crate::thread_pool::{PoolInner, context};
use crate::{Result, TaskFuture, TaskOptions};

/// A cheap, cloneable handle for submitting work to a [`ThreadPool`][crate::ThreadPool].
///
/// Handles can be moved into tasks so that they can submit follow-up work or attach
/// continuations. Unlike the pool itself, dropping a handle has no effect on the pool's
/// lifetime; once the pool is finalized, submissions through any handle fail with
/// [`Error::RuntimeShuttingDown`][crate::Error::RuntimeShuttingDown].
///
/// # Example
///
/// ```
/// use many_tasks::{PoolDeclaration, PoolHandle, ResourcePartitioner, Runtime, SchedulingPolicy};
///
/// let partitioner = ResourcePartitioner::builder()
///     .pool(PoolDeclaration::new("default", SchedulingPolicy::Local))
///     .build()
///     .unwrap();
/// let runtime = Runtime::start(partitioner);
///
/// let outer = runtime
///     .default_pool()
///     .submit(|| {
///         let pool = PoolHandle::current().expect("tasks run on pool workers");
///         pool.submit(|| "inner").unwrap().get().unwrap()
///     })
///     .unwrap();
///
/// assert_eq!(outer.get(), Ok("inner"));
/// runtime.finalize().unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct PoolHandle {
    pub(crate) inner: Arc<PoolInner>,
}

impl PoolHandle {
    pub(crate) fn new(inner: Arc<PoolInner>) -> Self {
        Self { inner }
    }

    /// The pool whose worker is executing the current thread, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        context::current_pool().map(Self::new)
    }

    /// The name of the pool.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Submits a task with default options.
    ///
    /// If called from a worker of this pool, the task is queued on that worker. Otherwise
    /// tasks are distributed over the running workers in round-robin order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeShuttingDown`][crate::Error::RuntimeShuttingDown] once
    /// finalization has begun.
    pub fn submit<R, F>(&self, work: F) -> Result<TaskFuture<R>>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        self.inner.submit_with(TaskOptions::default(), work)
    }

    /// Submits a task with the given priority and placement options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeShuttingDown`][crate::Error::RuntimeShuttingDown] once
    /// finalization has begun and
    /// [`UnsupportedOperation::UnknownWorker`][crate::UnsupportedOperation::UnknownWorker] if
    /// the target worker does not exist.
    pub fn submit_with<R, F>(&self, options: TaskOptions, work: F) -> Result<TaskFuture<R>>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        self.inner.submit_with(options, work)
    }

    /// Submits a task without a way to observe its outcome.
    ///
    /// If the task panics, the panic is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeShuttingDown`][crate::Error::RuntimeShuttingDown] once
    /// finalization has begun.
    pub fn post<F>(&self, work: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.post_with(TaskOptions::default(), work)
    }

    /// Like [`post()`][Self::post] with priority and placement options.
    ///
    /// # Errors
    ///
    /// As [`submit_with()`][Self::submit_with].
    pub fn post_with<F>(&self, options: TaskOptions, work: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.post_with(options, work)
    }
}
