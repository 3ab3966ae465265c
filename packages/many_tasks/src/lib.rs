#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Many-task runtime: lightweight tasks on partitioned, elastic, hardware-pinned worker pools.
//!
//! A [`ResourcePartitioner`] carves the processing units of a machine (as described by a
//! [`Topology`]) into named thread pools before anything runs. [`Runtime::start()`] then
//! creates one [`ThreadPool`] per partition, with one OS worker thread pinned to each
//! processing unit. Every pool runs its own [`SchedulingPolicy`], from simple per-worker FIFO
//! queues to priority-aware work stealing that prefers victims in the same NUMA domain.
//!
//! Submitted tasks return a [`TaskFuture`]. Futures, promises, gates, channels and receive
//! buffers (the local control objects, or LCOs) let many small tasks wait on, chain from and
//! trigger one another. [`dataflow()`] runs a task once all of its input futures are ready.
//! A task that waits on a future does not block its worker: the worker keeps executing other
//! tasks until the outcome is available.
//!
//! # Quick start
//!
//! ```rust
//! use many_tasks::{PoolDeclaration, ResourcePartitioner, Runtime, SchedulingPolicy};
//!
//! let partitioner = ResourcePartitioner::builder()
//!     .pool(PoolDeclaration::new("default", SchedulingPolicy::LocalPriorityFifo))
//!     .build()
//!     .unwrap();
//!
//! let runtime = Runtime::start(partitioner);
//! let pool = runtime.default_pool();
//!
//! let handle = pool.handle().clone();
//! let answer = pool
//!     .submit(move || {
//!         // Waiting inside a task keeps the worker busy with other tasks.
//!         let half = handle.submit(|| 21).unwrap().get().unwrap();
//!         half * 2
//!     })
//!     .unwrap();
//!
//! assert_eq!(answer.get(), Ok(42));
//!
//! runtime.finalize().unwrap();
//! ```
//!
//! # Elasticity
//!
//! Pools declared with [`SchedulerMode::ENABLE_ELASTICITY`] can suspend and resume individual
//! workers at runtime via [`ThreadPool::suspend_processing_unit()`] and
//! [`ThreadPool::resume_processing_unit()`]. Work queued on a suspended worker moves to the
//! workers that remain active; a pool never suspends its last active worker.
//!
//! # Errors
//!
//! Configuration problems are reported by [`ResourcePartitionerBuilder::build()`] as a
//! [`ConfigurationError`]. Pool operations return the crate [`Error`]. A task's own failure
//! (a panic, cancellation, shutdown) is stored in its future as a [`TaskError`] and only seen
//! by whoever inspects that future.

mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
mod lcos;
mod parallel;
mod partitioner;
mod runtime;
mod scheduler;
mod thread_pool;
mod topology;

pub use error::*;
pub use lcos::*;
pub use partitioner::*;
pub use runtime::*;
pub use scheduler::*;
pub use thread_pool::*;
pub use topology::*;
