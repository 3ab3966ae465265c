//! Thread pools: OS worker threads bound to processing units, driving one scheduler each.

use std::any::type_name;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{self, AtomicBool, AtomicU8, AtomicU32, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use event_listener::{Event, Listener};
use nonempty::NonEmpty;
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::scheduler::{Scheduler, Task};
use crate::{
    Error, PackagedTask, ProcessingUnit, Result, SchedulingPolicy, TaskError, TaskFuture,
    Topology, UnsupportedOperation,
};

pub(crate) mod context;
mod handle;
mod mode;
mod options;
mod worker;

pub use handle::*;
pub use mode::*;
pub use options::*;
use worker::{RUNNING, SUSPEND_REQUESTED, SUSPENDED, WorkerSlot};

/// How long dropping a pool that was never explicitly finalized waits for queued work.
const DEFAULT_FINALIZE_TIMEOUT: Duration = Duration::from_secs(10);

const ACCEPTING: u8 = 0;
const DRAINING: u8 = 1;
const TERMINATED: u8 = 2;

pub(crate) struct PoolInner {
    name: String,
    units: NonEmpty<ProcessingUnit>,
    topology: Arc<dyn Topology>,
    scheduler: Scheduler,
    mode: AtomicU32,
    slots: Box<[WorkerSlot]>,

    /// Number of workers in the `RUNNING` state. Only changed under the elasticity lock.
    active_workers: AtomicUsize,

    /// Serializes suspend and resume operations.
    elasticity: Mutex<()>,

    lifecycle: AtomicU8,
    stopping: AtomicBool,

    /// Tasks currently executing on some worker (including tasks run while helping).
    executing: AtomicUsize,

    /// Round-robin cursor for placing tasks submitted from outside the pool.
    next_worker: AtomicUsize,

    /// Signaled after each task while the pool is draining.
    drained: Event,

    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl PoolInner {
    /// Creates the pool state without starting any worker threads.
    pub(crate) fn new(
        name: &str,
        policy: SchedulingPolicy,
        mode: SchedulerMode,
        units: NonEmpty<ProcessingUnit>,
        topology: Arc<dyn Topology>,
    ) -> Self {
        let unit_list = units.iter().cloned().collect::<Vec<_>>();

        Self {
            name: name.to_string(),
            scheduler: Scheduler::new(policy, &unit_list),
            slots: unit_list.iter().map(|_| WorkerSlot::new()).collect(),
            active_workers: AtomicUsize::new(unit_list.len()),
            units,
            topology,
            mode: AtomicU32::new(mode.bits()),
            elasticity: Mutex::new(()),
            lifecycle: AtomicU8::new(ACCEPTING),
            stopping: AtomicBool::new(false),
            executing: AtomicUsize::new(0),
            next_worker: AtomicUsize::new(0),
            drained: Event::new(),
            threads: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn topology(&self) -> &dyn Topology {
        &*self.topology
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub(crate) fn slot(&self, worker: usize) -> &WorkerSlot {
        self.slots
            .get(worker)
            .expect("worker indexes are always within the pool")
    }

    pub(crate) fn scheduler_mode(&self) -> SchedulerMode {
        SchedulerMode::from_bits_truncate(self.mode.load(Ordering::Relaxed))
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Whether the worker could find something to execute right now.
    pub(crate) fn has_work_for(&self, worker: usize) -> bool {
        if self.scheduler.policy().supports_stealing() {
            self.scheduler.queued() > 0
        } else {
            self.scheduler.queued_for(worker) > 0
        }
    }

    /// Executes the next task available to the given worker, if any.
    pub(crate) fn run_one_as(&self, worker: usize) -> bool {
        // Counted before the dequeue so that a task in hand is never missing from both
        // `queued` and `executing`, which would let finalize consider the pool drained.
        self.executing.fetch_add(1, Ordering::AcqRel);

        let task = self.scheduler.try_dequeue(worker);
        let executed = task.is_some();

        if let Some(task) = task {
            task.run();
            trace!(pool = %self.name, worker, "task executed");
        }

        self.executing.fetch_sub(1, Ordering::AcqRel);

        if self.lifecycle.load(Ordering::Acquire) != ACCEPTING {
            self.drained.notify(usize::MAX);
        }

        executed
    }

    /// Executes the next available task on behalf of a worker that is blocked inside a task.
    ///
    /// A worker that is being suspended takes no new tasks. It hands its queue to the running
    /// workers instead and lets the blocked task wait on its own.
    pub(crate) fn help_as(&self, worker: usize) -> bool {
        if self.is_stopping() {
            return false;
        }

        if !self.slot(worker).is_running() {
            self.evacuate(worker);
            return false;
        }

        self.run_one_as(worker)
    }

    fn is_drained(&self) -> bool {
        self.scheduler.queued() == 0 && self.executing.load(Ordering::Acquire) == 0
    }

    fn ensure_accepting(&self) -> Result<()> {
        let accepting = match self.lifecycle.load(Ordering::Acquire) {
            ACCEPTING => true,
            // Work already in flight may still fan out while the pool drains.
            DRAINING => !self.is_stopping() && context::current_worker_of(self).is_some(),
            _ => false,
        };

        if accepting {
            Ok(())
        } else {
            Err(Error::RuntimeShuttingDown {
                pool: self.name.clone(),
            })
        }
    }

    /// Submits a task whose outcome is delivered through the returned future.
    pub(crate) fn submit_with<R, F>(&self, options: TaskOptions, work: F) -> Result<TaskFuture<R>>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let hint = self.validate_hint(options)?;
        let (packaged, future) = PackagedTask::new(work);

        self.dispatch(
            Task::new(options.get_priority(), move || packaged.run()),
            hint,
        )?;

        Ok(future)
    }

    /// Schedules an already packaged task, typically a continuation that became runnable.
    ///
    /// There is no caller to report errors to, so they are delivered through the task's future.
    pub(crate) fn spawn_packaged<R>(&self, options: TaskOptions, packaged: PackagedTask<R>)
    where
        R: Send + 'static,
    {
        if self.ensure_accepting().is_err() {
            packaged.abandon(TaskError::RuntimeShuttingDown);
            return;
        }

        // An out-of-range hint cannot be reported, so it is ignored.
        let hint = options
            .get_target_worker()
            .filter(|worker| *worker < self.slots.len());

        if let Err(error) = self.dispatch(
            Task::new(options.get_priority(), move || packaged.run()),
            hint,
        ) {
            // The task was dropped along the way, which breaks its promise.
            debug!(pool = %self.name, %error, "continuation could not be scheduled");
        }
    }

    /// Submits a task whose outcome nobody observes.
    pub(crate) fn post_with<F>(&self, options: TaskOptions, work: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let hint = self.validate_hint(options)?;
        let pool_name = self.name.clone();

        self.dispatch(
            Task::new(options.get_priority(), move || {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(work)) {
                    error!(
                        pool = %pool_name,
                        message = %crate::lcos::panic_message(payload.as_ref()),
                        "fire-and-forget task panicked"
                    );
                }
            }),
            hint,
        )
    }

    fn validate_hint(&self, options: TaskOptions) -> Result<Option<usize>> {
        match options.get_target_worker() {
            Some(worker) if worker >= self.slots.len() => {
                Err(UnsupportedOperation::UnknownWorker {
                    pool: self.name.clone(),
                    worker,
                }
                .into())
            }
            hint => Ok(hint),
        }
    }

    fn dispatch(&self, task: Task, hint: Option<usize>) -> Result<()> {
        self.ensure_accepting()?;
        self.place(task, hint);

        if self.lifecycle.load(Ordering::Acquire) == TERMINATED {
            // Raced with the end of finalize; nobody is left to execute the task.
            let abandoned = self.scheduler.drain_all();
            warn!(
                pool = %self.name,
                count = abandoned.len(),
                "abandoning tasks submitted during shutdown"
            );

            return Err(Error::RuntimeShuttingDown {
                pool: self.name.clone(),
            });
        }

        Ok(())
    }

    /// Queues a task on a running worker and wakes that worker up.
    fn place(&self, task: Task, hint: Option<usize>) {
        let target = self.choose_worker(hint);

        self.scheduler.enqueue(target, task);

        // Pairs with the fence in the worker's suspension path.
        atomic::fence(Ordering::SeqCst);

        let slot = self.slot(target);
        slot.wake.notify(1);

        if slot.state.load(Ordering::Acquire) == SUSPENDED {
            // The worker parked after we chose it and may already have evacuated its queue.
            self.evacuate(target);
        }
    }

    /// Moves every task queued on the given (suspended) worker to running workers.
    pub(crate) fn evacuate(&self, worker: usize) {
        let tasks = self.scheduler.drain_worker(worker);

        if tasks.is_empty() {
            return;
        }

        debug!(pool = %self.name, worker, count = tasks.len(), "moving tasks off suspended worker");

        for task in tasks {
            self.place(task, None);
        }
    }

    /// The explicit hint if that worker is running, else the submitting worker if it belongs
    /// to this pool and is running, else the next running worker in round-robin order.
    #[expect(
        clippy::arithmetic_side_effects,
        reason = "count is non-zero and wrapping is fine for rotation"
    )]
    fn choose_worker(&self, hint: Option<usize>) -> usize {
        let preferred = hint.or_else(|| context::current_worker_of(self));

        if let Some(worker) = preferred {
            if self.slots.get(worker).is_some_and(WorkerSlot::is_running) {
                return worker;
            }
        }

        let start = self.next_worker.fetch_add(1, Ordering::Relaxed);
        let count = self.slots.len();

        for offset in 0..count {
            let candidate = start.wrapping_add(offset) % count;

            if self.slot(candidate).is_running() {
                return candidate;
            }
        }

        // At least one worker is always running; if we lose a race with a suspension the
        // post-enqueue check in place() moves the task again.
        start % count
    }

    fn suspend(&self, worker: usize) -> Result<()> {
        self.ensure_accepting()?;

        if !self
            .scheduler_mode()
            .contains(SchedulerMode::ENABLE_ELASTICITY)
        {
            return Err(UnsupportedOperation::ElasticityDisabled {
                pool: self.name.clone(),
            }
            .into());
        }

        let slot = self.slots.get(worker).ok_or_else(|| UnsupportedOperation::UnknownWorker {
            pool: self.name.clone(),
            worker,
        })?;

        {
            let _elasticity = self.elasticity.lock();

            if !slot.is_running() {
                return Ok(());
            }

            if self.scheduler.policy().is_static() {
                let pending = self.scheduler.queued_for(worker);

                if pending > 0 {
                    return Err(UnsupportedOperation::PendingStaticWork {
                        pool: self.name.clone(),
                        worker,
                        pending,
                    }
                    .into());
                }
            }

            if self.active_workers.load(Ordering::Acquire) <= 1 {
                return Err(UnsupportedOperation::LastActiveWorker {
                    pool: self.name.clone(),
                }
                .into());
            }

            slot.state.store(SUSPEND_REQUESTED, Ordering::Release);
            self.active_workers.fetch_sub(1, Ordering::AcqRel);
            slot.wake.notify(1);

            debug!(pool = %self.name, worker, "suspending worker");
        }

        if context::current_worker_of(self) == Some(worker) {
            // We are that worker; it parks once the current task returns.
            return Ok(());
        }

        loop {
            if slot.state.load(Ordering::Acquire) != SUSPEND_REQUESTED {
                break;
            }

            let listener = slot.parked.listen();

            // Re-check after registering listener to avoid lost wakeups.
            if slot.state.load(Ordering::Acquire) != SUSPEND_REQUESTED {
                break;
            }

            listener.wait();
        }

        Ok(())
    }

    fn resume(&self, worker: usize) -> Result<()> {
        self.ensure_accepting()?;

        if worker >= self.slots.len() {
            return Err(UnsupportedOperation::UnknownWorker {
                pool: self.name.clone(),
                worker,
            }
            .into());
        }

        let _elasticity = self.elasticity.lock();

        if self.resume_locked(worker) {
            debug!(pool = %self.name, worker, "resumed worker");
        }

        Ok(())
    }

    /// Returns whether the worker was suspended (or suspending). Caller holds the elasticity lock.
    fn resume_locked(&self, worker: usize) -> bool {
        let slot = self.slot(worker);

        if slot.state.swap(RUNNING, Ordering::AcqRel) == RUNNING {
            return false;
        }

        self.active_workers.fetch_add(1, Ordering::AcqRel);
        slot.wake.notify(usize::MAX);
        slot.parked.notify(usize::MAX);

        true
    }

    fn finalize(&self, timeout: Duration) -> Result<()> {
        assert!(
            context::current_worker_of(self).is_none(),
            "a thread pool cannot be finalized from one of its own workers"
        );

        if self
            .lifecycle
            .compare_exchange(ACCEPTING, DRAINING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::RuntimeShuttingDown {
                pool: self.name.clone(),
            });
        }

        debug!(pool = %self.name, ?timeout, "finalizing thread pool");

        {
            // Suspended workers must run again to drain their share and to be joinable.
            let _elasticity = self.elasticity.lock();

            for worker in 0..self.slots.len() {
                self.resume_locked(worker);
            }
        }

        self.wait_until_drained(timeout);

        // Release ordering makes everything above visible to workers that observe the flag.
        self.stopping.store(true, Ordering::Release);

        for slot in &self.slots {
            slot.wake.notify(usize::MAX);
        }

        let handles = mem::take(&mut *self.threads.lock());

        for handle in handles {
            if let Err(payload) = handle.join() {
                // Tasks never unwind into the worker loop. If a worker panics anyway, the pool
                // infrastructure itself is broken and we must not hide that.
                panic::resume_unwind(payload);
            }
        }

        self.lifecycle.store(TERMINATED, Ordering::Release);

        let abandoned = self.scheduler.drain_all();

        if !abandoned.is_empty() {
            warn!(
                pool = %self.name,
                count = abandoned.len(),
                "abandoning tasks that did not execute before the deadline"
            );
        }

        drop(abandoned);

        debug!(pool = %self.name, "thread pool finalized");
        Ok(())
    }

    fn wait_until_drained(&self, timeout: Duration) {
        let deadline = Instant::now().checked_add(timeout);

        loop {
            if self.is_drained() {
                return;
            }

            let listener = self.drained.listen();

            // Re-check after registering listener to avoid lost wakeups.
            if self.is_drained() {
                return;
            }

            match deadline {
                Some(deadline) => {
                    if listener.wait_deadline(deadline).is_none() && Instant::now() >= deadline {
                        warn!(
                            pool = %self.name,
                            queued = self.scheduler.queued(),
                            "finalize deadline elapsed before the pool drained"
                        );
                        return;
                    }
                }
                None => listener.wait(),
            }
        }
    }
}

impl fmt::Debug for PoolInner {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("name", &self.name)
            .field("policy", &self.scheduler.policy())
            .field("mode", &self.scheduler_mode())
            .field("workers", &self.slots.len())
            .field("active_workers", &self.active_workers.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// A named set of OS worker threads, one per processing unit, sharing one scheduler.
///
/// Thread pools are created by [`Runtime::start()`][crate::Runtime::start] according to the
/// partition computed by the [`ResourcePartitioner`][crate::ResourcePartitioner] and are
/// accessed via [`Runtime::get_thread_pool()`][crate::Runtime::get_thread_pool].
///
/// # Elasticity
///
/// If the pool's scheduler mode includes [`SchedulerMode::ENABLE_ELASTICITY`], individual
/// workers can be suspended and resumed while the pool is running. A suspended worker finishes
/// the task it is executing, hands its queued tasks to the remaining workers and parks. The
/// last running worker can never be suspended.
///
/// # Lifetime
///
/// [`finalize()`][Self::finalize] stops accepting submissions, waits for queued work to drain
/// (up to a deadline) and joins the worker threads. Dropping a pool that was not finalized
/// finalizes it with a default deadline. Tasks still queued after the deadline never execute
/// and their futures fail with [`TaskError::BrokenPromise`][crate::TaskError::BrokenPromise].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use many_tasks::fake::TopologyBuilder;
/// use many_tasks::{PoolDeclaration, ResourcePartitioner, Runtime, SchedulingPolicy};
/// use new_zealand::nz;
///
/// let partitioner = ResourcePartitioner::builder()
///     .topology(Arc::new(TopologyBuilder::from_counts(nz!(2), nz!(1)).build()))
///     .os_threads(nz!(2))
///     .pool(PoolDeclaration::new("default", SchedulingPolicy::LocalPriorityFifo))
///     .build()
///     .unwrap();
///
/// let runtime = Runtime::start(partitioner);
/// let pool = runtime.default_pool();
///
/// let answer = pool.submit(|| 6 * 7).unwrap();
/// assert_eq!(answer.get().unwrap(), 42);
///
/// runtime.finalize().unwrap();
/// ```
#[derive(Debug)]
pub struct ThreadPool {
    handle: PoolHandle,
}

impl ThreadPool {
    /// Creates the pool and starts one worker thread per processing unit.
    pub(crate) fn start(
        name: &str,
        policy: SchedulingPolicy,
        mode: SchedulerMode,
        units: NonEmpty<ProcessingUnit>,
        topology: Arc<dyn Topology>,
    ) -> Self {
        let inner = Arc::new(PoolInner::new(name, policy, mode, units, topology));

        let handles = inner
            .units
            .iter()
            .enumerate()
            .map(|(worker, unit)| {
                let pool = Arc::clone(&inner);
                let unit = unit.clone();

                thread::Builder::new()
                    .name(format!("{name}-w{worker}"))
                    .spawn(move || {
                        pool.topology().pin_current_thread_to(&unit);

                        debug!(
                            pool = %pool.name(),
                            worker,
                            unit = unit.index(),
                            "worker thread started"
                        );
                        worker::worker_loop(&pool, worker);
                        debug!(pool = %pool.name(), worker, "worker thread exiting");
                    })
                    .expect(
                        "failed to spawn worker thread: thread spawning failure is not supported",
                    )
            })
            .collect::<Vec<_>>();

        *inner.threads.lock() = handles;

        debug!(pool = name, %policy, %mode, workers = inner.slots.len(), "thread pool started");

        Self {
            handle: PoolHandle::new(inner),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<PoolInner> {
        &self.handle.inner
    }

    /// A cloneable handle for submitting work to this pool, e.g. from inside its tasks.
    #[must_use]
    pub fn handle(&self) -> &PoolHandle {
        &self.handle
    }

    /// The name the pool was declared with.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner().name()
    }

    /// The work-distribution policy of the pool.
    #[must_use]
    pub fn policy(&self) -> SchedulingPolicy {
        self.inner().scheduler.policy()
    }

    /// The processing units owned by the pool, in worker order.
    #[must_use]
    pub fn processing_units(&self) -> &NonEmpty<ProcessingUnit> {
        &self.inner().units
    }

    /// The number of worker threads in the pool, suspended or not.
    #[must_use]
    pub fn get_os_thread_count(&self) -> usize {
        self.inner().slots.len()
    }

    /// The number of workers that are not suspended.
    ///
    /// Equals [`get_os_thread_count()`][Self::get_os_thread_count] until a worker is suspended.
    #[must_use]
    pub fn get_active_os_thread_count(&self) -> usize {
        self.inner().active_workers.load(Ordering::Acquire)
    }

    /// The number of tasks waiting in the pool's queues.
    #[must_use]
    pub fn queued_task_count(&self) -> usize {
        self.inner().scheduler.queued()
    }

    /// The current scheduler mode.
    #[must_use]
    pub fn get_scheduler_mode(&self) -> SchedulerMode {
        self.inner().scheduler_mode()
    }

    /// Replaces the scheduler mode.
    pub fn set_scheduler_mode(&self, mode: SchedulerMode) {
        self.inner().mode.store(mode.bits(), Ordering::Relaxed);
        debug!(pool = %self.inner().name, %mode, "scheduler mode changed");
    }

    /// Sets the given flags, leaving the others as they are.
    pub fn add_scheduler_mode(&self, mode: SchedulerMode) {
        self.inner().mode.fetch_or(mode.bits(), Ordering::Relaxed);
        debug!(
            pool = %self.inner().name,
            mode = %self.get_scheduler_mode(),
            "scheduler mode changed"
        );
    }

    /// Clears the given flags, leaving the others as they are.
    pub fn remove_scheduler_mode(&self, mode: SchedulerMode) {
        self.inner().mode.fetch_and(!mode.bits(), Ordering::Relaxed);
        debug!(
            pool = %self.inner().name,
            mode = %self.get_scheduler_mode(),
            "scheduler mode changed"
        );
    }

    /// Stops dispatching work to the worker at position `worker` and parks its thread.
    ///
    /// The task the worker is executing completes first; this call returns once the worker has
    /// parked (unless the caller is that very worker, in which case it parks after the calling
    /// task returns). Tasks queued on the worker are moved to running workers.
    ///
    /// Suspending a worker that is already suspended does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedOperation`] if the pool does not have
    /// [`SchedulerMode::ENABLE_ELASTICITY`], if there is no such worker, if this is the last
    /// running worker or if the pool has a static policy and tasks are bound to the worker.
    /// Returns [`Error::RuntimeShuttingDown`] once finalization has begun.
    pub fn suspend_processing_unit(&self, worker: usize) -> Result<()> {
        self.inner().suspend(worker)
    }

    /// Makes a suspended worker participate in dispatch again.
    ///
    /// Resuming a worker that is not suspended does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedOperation::UnknownWorker`] if there is no such worker.
    /// Returns [`Error::RuntimeShuttingDown`] once finalization has begun.
    pub fn resume_processing_unit(&self, worker: usize) -> Result<()> {
        self.inner().resume(worker)
    }

    /// Submits a task with default options.
    ///
    /// If called from a worker of this pool, the task is queued on that worker. Otherwise
    /// tasks are distributed over the running workers in round-robin order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeShuttingDown`] once finalization has begun.
    pub fn submit<R, F>(&self, work: F) -> Result<TaskFuture<R>>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        self.inner().submit_with(TaskOptions::default(), work)
    }

    /// Submits a task with the given priority and placement options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeShuttingDown`] once finalization has begun and
    /// [`UnsupportedOperation::UnknownWorker`] if the target worker does not exist.
    pub fn submit_with<R, F>(&self, options: TaskOptions, work: F) -> Result<TaskFuture<R>>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        self.inner().submit_with(options, work)
    }

    /// Submits a task without a way to observe its outcome.
    ///
    /// If the task panics, the panic is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeShuttingDown`] once finalization has begun.
    pub fn post<F>(&self, work: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner().post_with(TaskOptions::default(), work)
    }

    /// Like [`post()`][Self::post] with priority and placement options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeShuttingDown`] once finalization has begun and
    /// [`UnsupportedOperation::UnknownWorker`] if the target worker does not exist.
    pub fn post_with<F>(&self, options: TaskOptions, work: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner().post_with(options, work)
    }

    /// Stops accepting submissions, waits up to `timeout` for queued tasks to finish and joins
    /// the worker threads.
    ///
    /// Suspended workers are resumed so they can be joined. While draining, tasks that are
    /// already executing on the pool may still submit follow-up work to it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeShuttingDown`] if the pool was already finalized.
    ///
    /// # Panics
    ///
    /// Panics if called from one of the pool's own worker threads.
    pub fn finalize(&self, timeout: Duration) -> Result<()> {
        self.inner().finalize(timeout)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if self.inner().lifecycle.load(Ordering::Acquire) == ACCEPTING
            && context::current_worker_of(self.inner()).is_none()
        {
            // Nobody else can finalize a pool we own, so this cannot fail.
            drop(self.inner().finalize(DEFAULT_FINALIZE_TIMEOUT));
        }
    }
}
