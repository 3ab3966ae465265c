//! Executes a body over an index range, split into chunks that run as tasks.

use std::num::NonZero;
use std::ops::Range;
use std::sync::Arc;

use tracing::trace;

use crate::{PoolHandle, Result, TaskFuture, TaskResult, ThreadPool, when_all};

impl PoolHandle {
    /// Calls `body` once for every index in `range`, in parallel on this pool.
    ///
    /// The range is split into chunks of `grain` consecutive indexes (the last one may be
    /// shorter) and each chunk is submitted as one task. The returned future becomes ready once
    /// every chunk has finished. If any chunk panicked, the future fails with the first such
    /// error in range order. An empty range yields a ready future.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeShuttingDown`][crate::Error::RuntimeShuttingDown] if the pool no
    /// longer accepts work. Chunks submitted before the failure still run.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// use many_tasks::{PoolDeclaration, ResourcePartitioner, Runtime, SchedulingPolicy};
    /// use new_zealand::nz;
    ///
    /// let partitioner = ResourcePartitioner::builder()
    ///     .pool(PoolDeclaration::new("default", SchedulingPolicy::LocalPriorityLifo))
    ///     .build()
    ///     .unwrap();
    /// let runtime = Runtime::start(partitioner);
    ///
    /// let sum = Arc::new(AtomicUsize::new(0));
    ///
    /// runtime
    ///     .default_pool()
    ///     .handle()
    ///     .parallel_for(0..100, nz!(8), {
    ///         let sum = Arc::clone(&sum);
    ///         move |index| {
    ///             sum.fetch_add(index, Ordering::Relaxed);
    ///         }
    ///     })
    ///     .unwrap()
    ///     .get()
    ///     .unwrap();
    ///
    /// assert_eq!(sum.load(Ordering::Relaxed), 4950);
    /// runtime.finalize().unwrap();
    /// ```
    pub fn parallel_for<F>(
        &self,
        range: Range<usize>,
        grain: NonZero<usize>,
        body: F,
    ) -> Result<TaskFuture<()>>
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let body = Arc::new(body);
        let end = range.end;

        let chunks = range
            .step_by(grain.get())
            .map(|start| start..start.saturating_add(grain.get()).min(end));

        let mut futures = Vec::new();

        for chunk in chunks {
            let body = Arc::clone(&body);

            futures.push(self.submit(move || {
                for index in chunk {
                    body(index);
                }
            })?);
        }

        trace!(pool = %self.name(), chunks = futures.len(), "parallel_for submitted");

        Ok(when_all(futures).map_inline(|outcome| {
            outcome?
                .into_iter()
                .collect::<TaskResult<Vec<()>>>()
                .map(|_| ())
        }))
    }
}

impl ThreadPool {
    /// Same as [`PoolHandle::parallel_for()`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeShuttingDown`][crate::Error::RuntimeShuttingDown] if the pool no
    /// longer accepts work.
    pub fn parallel_for<F>(
        &self,
        range: Range<usize>,
        grain: NonZero<usize>,
        body: F,
    ) -> Result<TaskFuture<()>>
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.handle().parallel_for(range, grain, body)
    }
}
