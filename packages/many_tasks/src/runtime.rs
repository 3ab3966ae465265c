//! The set of running thread pools created from a resource partitioner.

use std::sync::Arc;
use std::time::Duration;

use foldhash::{HashMap, HashMapExt};
use nonempty::NonEmpty;
use tracing::{debug, warn};

use crate::{Error, ResourcePartitioner, Result, TaskFuture, TaskOptions, ThreadPool};

/// How long [`Runtime::finalize()`] waits for the queued work of each pool.
pub const DEFAULT_FINALIZE_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the thread pools described by a [`ResourcePartitioner`].
///
/// There is no process-wide runtime; each `Runtime` is independent and several can coexist,
/// for example in tests. Dropping the runtime finalizes every pool that is still running.
///
/// # Example
///
/// ```
/// use many_tasks::{PoolDeclaration, ResourcePartitioner, Runtime, SchedulingPolicy};
///
/// let partitioner = ResourcePartitioner::builder()
///     .pool(PoolDeclaration::new("default", SchedulingPolicy::AbpPriority))
///     .build()
///     .unwrap();
///
/// let runtime = Runtime::start(partitioner);
///
/// let sum = runtime.submit("default", || (1..=10).sum::<u32>()).unwrap();
/// assert_eq!(sum.get(), Ok(55));
///
/// runtime.finalize().unwrap();
/// ```
#[derive(Debug)]
pub struct Runtime {
    pools: NonEmpty<ThreadPool>,
    by_name: HashMap<String, usize>,
    default_pool: usize,
}

impl Runtime {
    /// Creates every partitioned pool and starts its worker threads.
    #[must_use]
    pub fn start(partitioner: ResourcePartitioner) -> Self {
        let (topology, partitions, default_pool) = partitioner.into_parts();

        let pools = partitions.map(|partition| {
            ThreadPool::start(
                &partition.name,
                partition.policy,
                partition.mode,
                partition.units,
                Arc::clone(&topology),
            )
        });

        let mut by_name = HashMap::with_capacity(pools.len());
        for (index, pool) in pools.iter().enumerate() {
            by_name.insert(pool.name().to_string(), index);
        }

        debug!(
            pools = pools.len(),
            os_threads = pools.iter().map(ThreadPool::get_os_thread_count).sum::<usize>(),
            "runtime started"
        );

        Self {
            pools,
            by_name,
            default_pool,
        }
    }

    /// The pool with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if no pool has this name.
    pub fn get_thread_pool(&self, pool_name: &str) -> Result<&ThreadPool> {
        self.by_name
            .get(pool_name)
            .and_then(|index| self.pools.get(*index))
            .ok_or_else(|| Error::UnknownPool {
                name: pool_name.to_string(),
            })
    }

    /// The number of worker threads of the named pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if no pool has this name.
    pub fn get_num_threads(&self, pool_name: &str) -> Result<usize> {
        self.get_thread_pool(pool_name)
            .map(ThreadPool::get_os_thread_count)
    }

    /// The pool named `"default"`, or the first declared pool if there is none by that name.
    #[must_use]
    pub fn default_pool(&self) -> &ThreadPool {
        self.pools
            .get(self.default_pool)
            .expect("default pool index is validated by the partitioner")
    }

    /// All pools, in declaration order.
    pub fn thread_pools(&self) -> impl Iterator<Item = &ThreadPool> {
        self.pools.iter()
    }

    /// Submits a task to the named pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if no pool has this name and
    /// [`Error::RuntimeShuttingDown`] if the pool no longer accepts work.
    pub fn submit<R, F>(&self, pool_name: &str, work: F) -> Result<TaskFuture<R>>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        self.get_thread_pool(pool_name)?.submit(work)
    }

    /// Like [`submit()`][Self::submit] with priority and placement options.
    ///
    /// # Errors
    ///
    /// As [`ThreadPool::submit_with()`], plus [`Error::UnknownPool`].
    pub fn submit_with<R, F>(
        &self,
        pool_name: &str,
        options: TaskOptions,
        work: F,
    ) -> Result<TaskFuture<R>>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        self.get_thread_pool(pool_name)?.submit_with(options, work)
    }

    /// Finalizes every pool, waiting up to [`DEFAULT_FINALIZE_TIMEOUT`] for each to drain.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by any pool. Every pool is finalized regardless.
    ///
    /// # Panics
    ///
    /// Panics if called from a worker thread of one of the pools.
    pub fn finalize(self) -> Result<()> {
        self.finalize_with_timeout(DEFAULT_FINALIZE_TIMEOUT)
    }

    /// Like [`finalize()`][Self::finalize] with a caller-chosen per-pool drain timeout.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by any pool. Every pool is finalized regardless.
    ///
    /// # Panics
    ///
    /// Panics if called from a worker thread of one of the pools.
    pub fn finalize_with_timeout(self, timeout: Duration) -> Result<()> {
        let mut first_error = None;

        for pool in &self.pools {
            if let Err(error) = pool.finalize(timeout) {
                warn!(pool = %pool.name(), %error, "pool failed to finalize");
                first_error.get_or_insert(error);
            }
        }

        debug!("runtime finalized");

        first_error.map_or(Ok(()), Err)
    }
}
