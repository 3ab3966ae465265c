//! Per-pool queues and the work-distribution algorithm that moves tasks between them.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use crate::ProcessingUnit;

mod policy;
mod priority;
mod queue;
mod task;
mod victims;

pub use policy::*;
pub use priority::*;
pub(crate) use queue::*;
pub(crate) use task::*;
pub(crate) use victims::*;

/// The queues of one worker: one per priority level, or a single queue if the policy
/// ignores priorities.
#[derive(Debug)]
struct WorkerQueues {
    by_priority: Box<[TaskQueue]>,

    /// Rotated on every steal attempt to vary the first victim probed in each tier.
    steal_cursor: AtomicUsize,
}

/// Owns every task queued in one thread pool and decides which worker executes what.
///
/// The policy is resolved into queue disciplines and victim tiers once, at construction.
/// Choosing *which* worker a new task is enqueued to is the thread pool's job because it
/// depends on which workers are currently active.
#[derive(Debug)]
pub(crate) struct Scheduler {
    policy: SchedulingPolicy,
    workers: Box<[WorkerQueues]>,
    victims: Box<[VictimTiers]>,

    /// Number of tasks sitting in any queue of this scheduler.
    queued: AtomicUsize,
}

impl Scheduler {
    /// Creates a scheduler with one worker for each of the given processing units.
    pub(crate) fn new(policy: SchedulingPolicy, units: &[ProcessingUnit]) -> Self {
        let levels = if policy.uses_priorities() {
            Priority::SERVICE_ORDER.len()
        } else {
            1
        };

        let workers = units
            .iter()
            .map(|_| WorkerQueues {
                by_priority: (0..levels)
                    .map(|_| TaskQueue::new(policy.discipline()))
                    .collect(),
                steal_cursor: AtomicUsize::new(0),
            })
            .collect();

        Self {
            policy,
            workers,
            victims: victim_tiers(policy.victim_order(), units),
            queued: AtomicUsize::new(0),
        }
    }

    pub(crate) fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queues a task on the given worker.
    ///
    /// # Panics
    ///
    /// Panics if the worker index is out of bounds. The thread pool only ever passes
    /// indexes of its own workers.
    pub(crate) fn enqueue(&self, worker: usize, task: Task) {
        let queue = self.queue_for(worker, task.priority());

        // Counted before the push so that the count never underflows when a racing
        // dequeue takes the task before we get to increment.
        self.queued.fetch_add(1, Ordering::AcqRel);
        queue.push(task);

        trace!(worker, "task enqueued");
    }

    /// Takes the next task the given worker should execute.
    ///
    /// Each priority level is checked in service order: first the worker's own queue,
    /// then (if the policy steals) the queues of the other workers in victim-tier order.
    pub(crate) fn try_dequeue(&self, worker: usize) -> Option<Task> {
        let own = self.workers.get(worker)?;

        for (level, queue) in own.by_priority.iter().enumerate() {
            if let Some(task) = queue.pop() {
                self.queued.fetch_sub(1, Ordering::AcqRel);
                return Some(task);
            }

            if let Some(task) = self.try_steal(worker, own, level) {
                self.queued.fetch_sub(1, Ordering::AcqRel);
                return Some(task);
            }
        }

        None
    }

    fn try_steal(&self, thief: usize, own: &WorkerQueues, level: usize) -> Option<Task> {
        let tiers = self.victims.get(thief)?;

        if tiers.is_empty() {
            return None;
        }

        let rotation = own.steal_cursor.fetch_add(1, Ordering::Relaxed);

        for tier in tiers {
            for step in 0..tier.len() {
                #[expect(
                    clippy::arithmetic_side_effects,
                    reason = "wrapping is fine for rotation and tier is not empty"
                )]
                let position = rotation.wrapping_add(step) % tier.len();

                let Some(&victim) = tier.get(position) else {
                    continue;
                };

                let stolen = self
                    .workers
                    .get(victim)
                    .and_then(|queues| queues.by_priority.get(level))
                    .and_then(TaskQueue::steal);

                if let Some(task) = stolen {
                    trace!(thief, victim, "task stolen");
                    return Some(task);
                }
            }
        }

        None
    }

    /// Total number of tasks waiting in any queue.
    pub(crate) fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Number of tasks waiting in the given worker's own queues.
    pub(crate) fn queued_for(&self, worker: usize) -> usize {
        self.workers
            .get(worker)
            .map_or(0, |queues| queues.by_priority.iter().map(TaskQueue::len).sum())
    }

    /// Removes every task queued on the given worker, highest priority first.
    pub(crate) fn drain_worker(&self, worker: usize) -> Vec<Task> {
        let Some(queues) = self.workers.get(worker) else {
            return Vec::new();
        };

        let drained = queues
            .by_priority
            .iter()
            .flat_map(TaskQueue::drain)
            .collect::<Vec<_>>();

        self.queued.fetch_sub(drained.len(), Ordering::AcqRel);
        drained
    }

    /// Removes every task from every queue.
    pub(crate) fn drain_all(&self) -> Vec<Task> {
        (0..self.workers.len())
            .flat_map(|worker| self.drain_worker(worker))
            .collect()
    }

    /// Releases storage held by the given worker's empty queues.
    ///
    /// Returns whether anything was released.
    pub(crate) fn compact(&self, worker: usize) -> bool {
        self.workers.get(worker).is_some_and(|queues| {
            queues
                .by_priority
                .iter()
                .fold(false, |released, queue| queue.compact() || released)
        })
    }

    fn queue_for(&self, worker: usize, priority: Priority) -> &TaskQueue {
        let queues = &self
            .workers
            .get(worker)
            .expect("thread pool only enqueues to its own workers")
            .by_priority;

        let slot = if queues.len() == 1 {
            0
        } else {
            priority.queue_slot()
        };

        queues
            .get(slot)
            .expect("priority-aware policies have a queue for every priority")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    fn units(count: usize) -> Vec<ProcessingUnit> {
        (0..count)
            .map(|index| ProcessingUnit::new(index, u32::try_from(index).unwrap(), 0))
            .collect()
    }

    fn logging_task(
        log: &Arc<Mutex<Vec<&'static str>>>,
        priority: Priority,
        label: &'static str,
    ) -> Task {
        let log = Arc::clone(log);
        Task::new(priority, move || log.lock().push(label))
    }

    fn run_all(scheduler: &Scheduler, worker: usize) {
        while let Some(task) = scheduler.try_dequeue(worker) {
            task.run();
        }
    }

    #[test]
    fn fifo_policy_preserves_submission_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scheduler = Scheduler::new(SchedulingPolicy::LocalPriorityFifo, &units(1));

        scheduler.enqueue(0, logging_task(&log, Priority::Normal, "first"));
        scheduler.enqueue(0, logging_task(&log, Priority::Normal, "second"));
        run_all(&scheduler, 0);

        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn lifo_policy_runs_newest_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scheduler = Scheduler::new(SchedulingPolicy::LocalPriorityLifo, &units(1));

        scheduler.enqueue(0, logging_task(&log, Priority::Normal, "first"));
        scheduler.enqueue(0, logging_task(&log, Priority::Normal, "second"));
        run_all(&scheduler, 0);

        assert_eq!(*log.lock(), vec!["second", "first"]);
    }

    #[test]
    fn higher_priority_is_served_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scheduler = Scheduler::new(SchedulingPolicy::StaticPriority, &units(1));

        scheduler.enqueue(0, logging_task(&log, Priority::Low, "low"));
        scheduler.enqueue(0, logging_task(&log, Priority::Normal, "normal"));
        scheduler.enqueue(0, logging_task(&log, Priority::High, "high"));
        run_all(&scheduler, 0);

        assert_eq!(*log.lock(), vec!["high", "normal", "low"]);
    }

    #[test]
    fn local_policy_ignores_priority() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scheduler = Scheduler::new(SchedulingPolicy::Local, &units(1));

        scheduler.enqueue(0, logging_task(&log, Priority::Low, "low"));
        scheduler.enqueue(0, logging_task(&log, Priority::High, "high"));
        run_all(&scheduler, 0);

        assert_eq!(*log.lock(), vec!["low", "high"]);
    }

    #[test]
    fn non_stealing_policies_leave_other_queues_alone() {
        for policy in [
            SchedulingPolicy::Local,
            SchedulingPolicy::Static,
            SchedulingPolicy::StaticPriority,
        ] {
            let log = Arc::new(Mutex::new(Vec::new()));
            let scheduler = Scheduler::new(policy, &units(2));

            scheduler.enqueue(1, logging_task(&log, Priority::Normal, "bound"));

            assert!(scheduler.try_dequeue(0).is_none(), "{policy}");
            assert_eq!(scheduler.queued_for(1), 1);
        }
    }

    #[test]
    fn stealing_policies_take_from_others() {
        for policy in [
            SchedulingPolicy::LocalPriorityFifo,
            SchedulingPolicy::LocalPriorityLifo,
            SchedulingPolicy::AbpPriority,
            SchedulingPolicy::Hierarchy,
        ] {
            let log = Arc::new(Mutex::new(Vec::new()));
            let scheduler = Scheduler::new(policy, &units(3));

            scheduler.enqueue(2, logging_task(&log, Priority::Normal, "stolen"));

            scheduler.try_dequeue(0).expect("idle worker steals").run();

            assert_eq!(*log.lock(), vec!["stolen"], "{policy}");
            assert_eq!(scheduler.queued(), 0);
        }
    }

    #[test]
    fn stolen_high_priority_beats_own_normal() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scheduler = Scheduler::new(SchedulingPolicy::LocalPriorityFifo, &units(2));

        scheduler.enqueue(0, logging_task(&log, Priority::Normal, "own"));
        scheduler.enqueue(1, logging_task(&log, Priority::High, "theirs"));

        scheduler.try_dequeue(0).unwrap().run();

        assert_eq!(*log.lock(), vec!["theirs"]);
    }

    #[test]
    fn abp_thief_takes_oldest_while_owner_takes_newest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scheduler = Scheduler::new(SchedulingPolicy::AbpPriority, &units(2));

        scheduler.enqueue(1, logging_task(&log, Priority::Normal, "old"));
        scheduler.enqueue(1, logging_task(&log, Priority::Normal, "new"));

        scheduler.try_dequeue(0).unwrap().run();
        scheduler.try_dequeue(1).unwrap().run();

        assert_eq!(*log.lock(), vec!["old", "new"]);
    }

    #[test]
    fn steal_rotation_visits_every_victim() {
        // All units share one NUMA domain, so hierarchy sees every victim as equally near.
        for policy in [SchedulingPolicy::LocalPriorityFifo, SchedulingPolicy::Hierarchy] {
            let log = Arc::new(Mutex::new(Vec::new()));
            let scheduler = Scheduler::new(policy, &units(4));

            for victim in 1..4 {
                for _ in 0..3 {
                    scheduler.enqueue(victim, logging_task(&log, Priority::Normal, "x"));
                }
            }

            for _ in 0..3 {
                scheduler.try_dequeue(0).unwrap().run();
            }

            // Every victim gave up exactly one task during the first three steals.
            assert_eq!(scheduler.queued_for(1), 2, "{policy}");
            assert_eq!(scheduler.queued_for(2), 2, "{policy}");
            assert_eq!(scheduler.queued_for(3), 2, "{policy}");
        }
    }

    #[test]
    fn drain_worker_empties_only_that_worker() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scheduler = Scheduler::new(SchedulingPolicy::Static, &units(2));

        scheduler.enqueue(0, logging_task(&log, Priority::Normal, "a"));
        scheduler.enqueue(0, logging_task(&log, Priority::Normal, "b"));
        scheduler.enqueue(1, logging_task(&log, Priority::Normal, "c"));

        let drained = scheduler.drain_worker(0);

        assert_eq!(drained.len(), 2);
        assert_eq!(scheduler.queued(), 1);
        assert_eq!(scheduler.queued_for(0), 0);

        assert_eq!(scheduler.drain_all().len(), 1);
        assert_eq!(scheduler.queued(), 0);
    }

    #[test]
    fn compact_only_touches_locked_queues() {
        let fifo = Scheduler::new(SchedulingPolicy::Local, &units(1));
        assert!(!fifo.compact(0));

        let log = Arc::new(Mutex::new(Vec::new()));
        let abp = Scheduler::new(SchedulingPolicy::AbpPriority, &units(1));
        abp.enqueue(0, logging_task(&log, Priority::Normal, "x"));
        run_all(&abp, 0);

        assert!(abp.compact(0));
        assert!(!abp.compact(7));
    }
}
