//! Worker thread logic for executing tasks from the scheduler.

use std::hint;
use std::sync::Arc;
use std::sync::atomic::{self, AtomicU8, Ordering};
use std::time::Duration;

use event_listener::{Event, Listener};
use tracing::{debug, trace};

use crate::SchedulerMode;
use crate::thread_pool::{PoolInner, context};

/// The worker participates in dispatch.
pub(crate) const RUNNING: u8 = 0;

/// Someone asked the worker to suspend; it will do so after its current task.
pub(crate) const SUSPEND_REQUESTED: u8 = 1;

/// The worker is parked and receives no new tasks.
pub(crate) const SUSPENDED: u8 = 2;

/// How many empty iterations an idle worker spins through under `DELAY_EXIT`.
const IDLE_SPIN_LIMIT: u32 = 64;

/// Upper bound on how long a parked worker sleeps before looking for work to steal again.
/// Wake-ups are only sent to the worker a task was queued on.
const PARK_TIMEOUT: Duration = Duration::from_millis(10);

/// How long an idle worker with reduced priority naps between looks for work.
const IDLE_NAP: Duration = Duration::from_millis(1);

/// Per-worker coordination state shared between the worker thread and the pool.
#[derive(Debug)]
pub(crate) struct WorkerSlot {
    pub(crate) state: AtomicU8,

    /// Signaled when new work is queued for the worker, when it is resumed or when the pool
    /// is stopping.
    pub(crate) wake: Event,

    /// Signaled when the worker acknowledges a suspension request (or the request is withdrawn).
    pub(crate) parked: Event,
}

impl WorkerSlot {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
            wake: Event::new(),
            parked: Event::new(),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum IterationResult {
    Executed,
    SuspendRequested,
    Shutdown,
    WaitingForWork,
}

pub(crate) fn run_one_iteration(pool: &PoolInner, worker: usize) -> IterationResult {
    // Acquire ordering synchronizes with the Release in finalize, so everything the pool did
    // before stopping is visible to us.
    if pool.is_stopping() {
        return IterationResult::Shutdown;
    }

    if pool.slot(worker).state.load(Ordering::Acquire) == SUSPEND_REQUESTED {
        return IterationResult::SuspendRequested;
    }

    if pool.run_one_as(worker) {
        return IterationResult::Executed;
    }

    IterationResult::WaitingForWork
}

pub(crate) fn worker_loop(pool: &Arc<PoolInner>, worker: usize) {
    let _context = context::enter(pool, worker);
    let mut idle = IdleState::default();

    loop {
        match run_one_iteration(pool, worker) {
            IterationResult::Executed => {
                idle.reset(pool);
            }
            IterationResult::SuspendRequested => {
                idle.reset(pool);
                park_while_suspended(pool, worker);
            }
            IterationResult::Shutdown => {
                break;
            }
            IterationResult::WaitingForWork => {
                idle.wait(pool, worker);
            }
        }
    }

    idle.reset(pool);
}

/// Acknowledges a suspension request, hands off leftover tasks and parks until resumed.
fn park_while_suspended(pool: &PoolInner, worker: usize) {
    let slot = pool.slot(worker);

    if slot
        .state
        .compare_exchange(SUSPEND_REQUESTED, SUSPENDED, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        // Resumed before we got around to parking.
        return;
    }

    // Pairs with the fence after enqueue in the pool: either the submitter sees SUSPENDED and
    // moves its task elsewhere or we see the task when evacuating below.
    atomic::fence(Ordering::SeqCst);

    slot.parked.notify(usize::MAX);
    debug!(pool = %pool.name(), worker, "worker suspended");

    pool.evacuate(worker);

    loop {
        if slot.is_running() || pool.is_stopping() {
            break;
        }

        let listener = slot.wake.listen();

        // Re-check after registering listener to avoid lost wakeups.
        if slot.is_running() || pool.is_stopping() {
            break;
        }

        listener.wait();
    }

    debug!(pool = %pool.name(), worker, "worker resumed");
}

/// What a worker has already done during the current stretch of having nothing to do.
#[derive(Debug, Default)]
struct IdleState {
    spins: u32,
    compacted: bool,
    lowered_priority: bool,
}

impl IdleState {
    fn reset(&mut self, pool: &PoolInner) {
        if self.lowered_priority {
            pool.topology().set_current_thread_low_priority(false);
            self.lowered_priority = false;
        }

        self.spins = 0;
        self.compacted = false;
    }

    fn wait(&mut self, pool: &PoolInner, worker: usize) {
        let mode = pool.scheduler_mode();

        if mode.contains(SchedulerMode::DO_BACKGROUND_WORK) && !self.compacted {
            self.compacted = true;

            if pool.scheduler().compact(worker) {
                trace!(pool = %pool.name(), worker, "released idle queue storage");
            }

            return;
        }

        if mode.contains(SchedulerMode::DELAY_EXIT) && self.spins < IDLE_SPIN_LIMIT {
            self.spins = self.spins.saturating_add(1);
            hint::spin_loop();
            return;
        }

        let slot = pool.slot(worker);
        let listener = slot.wake.listen();

        // Re-check after registering listener to avoid lost wakeups.
        if pool.has_work_for(worker) || !slot.is_running() || pool.is_stopping() {
            return;
        }

        if mode.contains(SchedulerMode::REDUCE_THREAD_PRIORITY) {
            if !self.lowered_priority {
                pool.topology().set_current_thread_low_priority(true);
                self.lowered_priority = true;
            }

            listener.wait_timeout(IDLE_NAP);
        } else {
            listener.wait_timeout(PARK_TIMEOUT);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use new_zealand::nz;

    use super::*;
    use crate::fake::TopologyBuilder;
    use crate::thread_pool::PoolInner;
    use crate::{Priority, SchedulingPolicy, Topology};

    /// A pool without worker threads, so tests can drive iterations by hand.
    fn idle_pool(policy: SchedulingPolicy, mode: SchedulerMode) -> Arc<PoolInner> {
        let topology = Arc::new(TopologyBuilder::from_counts(nz!(2), nz!(1)).build());
        let units = topology.list_processing_units();

        Arc::new(PoolInner::new("test", policy, mode, units, topology))
    }

    #[test]
    fn empty_pool_waits_for_work() {
        let pool = idle_pool(SchedulingPolicy::Local, SchedulerMode::NONE);

        assert_eq!(run_one_iteration(&pool, 0), IterationResult::WaitingForWork);
    }

    #[test]
    fn queued_task_is_executed() {
        let pool = idle_pool(SchedulingPolicy::Local, SchedulerMode::NONE);

        let (task, future) = crate::PackagedTask::new(|| 5);
        pool.scheduler()
            .enqueue(0, crate::scheduler::Task::new(Priority::Normal, move || task.run()));

        assert_eq!(run_one_iteration(&pool, 0), IterationResult::Executed);
        assert_eq!(future.get().unwrap(), 5);
    }

    #[test]
    fn suspend_request_takes_precedence_over_work() {
        let pool = idle_pool(SchedulingPolicy::Local, SchedulerMode::NONE);

        pool.scheduler()
            .enqueue(0, crate::scheduler::Task::new(Priority::Normal, || {}));
        pool.slot(0).state.store(SUSPEND_REQUESTED, Ordering::Release);

        assert_eq!(
            run_one_iteration(&pool, 0),
            IterationResult::SuspendRequested
        );
    }

    #[test]
    fn idle_worker_lowers_and_restores_priority() {
        let topology = Arc::new(TopologyBuilder::from_counts(nz!(1), nz!(1)).build());
        let units = topology.list_processing_units();
        let pool = PoolInner::new(
            "test",
            SchedulingPolicy::Local,
            SchedulerMode::REDUCE_THREAD_PRIORITY,
            units,
            Arc::clone(&topology) as Arc<dyn Topology>,
        );

        let mut idle = IdleState::default();
        idle.wait(&pool, 0);
        idle.wait(&pool, 0);

        assert_eq!(topology.low_priority_requests(), 1);
        assert!(idle.lowered_priority);

        idle.reset(&pool);
        assert!(!idle.lowered_priority);
    }

    #[test]
    fn background_work_happens_once_per_idle_stretch() {
        let pool = idle_pool(SchedulingPolicy::Local, SchedulerMode::default());

        let mut idle = IdleState::default();
        idle.wait(&pool, 0);
        assert!(idle.compacted);
        assert_eq!(idle.spins, 0);

        idle.wait(&pool, 0);
        assert_eq!(idle.spins, 1);

        idle.reset(&pool);
        assert!(!idle.compacted);
    }
}
