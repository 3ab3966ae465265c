//! Suspending and resuming workers of running pools.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use many_tasks::fake::TopologyBuilder;
use many_tasks::{
    Error, PoolDeclaration, Promise, ResourcePartitioner, Runtime, SchedulerMode,
    SchedulingPolicy, TaskOptions, UnsupportedOperation,
};
use new_zealand::nz;
use testing::{wait_until, with_watchdog};

const WORKERS: usize = 4;

const NON_STATIC_POLICIES: [SchedulingPolicy; 5] = [
    SchedulingPolicy::Local,
    SchedulingPolicy::LocalPriorityFifo,
    SchedulingPolicy::LocalPriorityLifo,
    SchedulingPolicy::AbpPriority,
    SchedulingPolicy::Hierarchy,
];

fn elastic_runtime(policy: SchedulingPolicy) -> Runtime {
    let partitioner = ResourcePartitioner::builder()
        .topology(Arc::new(TopologyBuilder::from_counts(nz!(4), nz!(2)).build()))
        .pool(
            PoolDeclaration::new("default", policy)
                .scheduler_mode(SchedulerMode::default() | SchedulerMode::ENABLE_ELASTICITY),
        )
        .build()
        .unwrap();

    Runtime::start(partitioner)
}

#[cfg_attr(miri, ignore)]
#[test]
fn suspending_all_but_one_worker_keeps_pool_working() {
    with_watchdog(|| {
        for policy in NON_STATIC_POLICIES {
            let runtime = elastic_runtime(policy);
            let pool = runtime.default_pool();

            assert_eq!(pool.get_active_os_thread_count(), WORKERS);

            for worker in 0..WORKERS - 1 {
                pool.suspend_processing_unit(worker).unwrap();
            }

            assert_eq!(pool.get_active_os_thread_count(), 1, "{policy}");

            let completed = Arc::new(AtomicUsize::new(0));

            let futures: Vec<_> = (0..1000)
                .map(|_| {
                    let completed = Arc::clone(&completed);
                    pool.submit(move || completed.fetch_add(1, Ordering::Relaxed))
                        .unwrap()
                })
                .collect();

            for future in futures {
                future.get().unwrap();
            }

            assert_eq!(completed.load(Ordering::Relaxed), 1000, "{policy}");

            runtime.finalize().unwrap();
        }
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn resumed_workers_rejoin_dispatch() {
    with_watchdog(|| {
        let runtime = elastic_runtime(SchedulingPolicy::LocalPriorityFifo);
        let pool = runtime.default_pool();

        pool.suspend_processing_unit(2).unwrap();
        pool.suspend_processing_unit(3).unwrap();
        assert_eq!(pool.get_active_os_thread_count(), 2);

        pool.resume_processing_unit(3).unwrap();
        assert_eq!(pool.get_active_os_thread_count(), 3);

        let on_three = pool
            .submit_with(TaskOptions::new().target_worker(3), || "ran on 3")
            .unwrap();
        assert_eq!(on_three.get(), Ok("ran on 3"));

        runtime.finalize().unwrap();
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn resuming_active_worker_is_noop() {
    with_watchdog(|| {
        let runtime = elastic_runtime(SchedulingPolicy::Hierarchy);
        let pool = runtime.default_pool();

        pool.resume_processing_unit(1).unwrap();
        pool.resume_processing_unit(1).unwrap();

        assert_eq!(pool.get_active_os_thread_count(), WORKERS);

        runtime.finalize().unwrap();
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn static_worker_with_bound_work_refuses_suspension() {
    with_watchdog(|| {
        for policy in [SchedulingPolicy::Static, SchedulingPolicy::StaticPriority] {
            let runtime = elastic_runtime(policy);
            let pool = runtime.default_pool();

            // Occupy worker 1 so that the next task bound to it stays queued.
            let (release_tx, release_rx) = mpsc::channel::<()>();
            let (started_tx, started_rx) = mpsc::channel::<()>();

            let blocker = pool
                .submit_with(TaskOptions::new().target_worker(1), move || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                })
                .unwrap();
            started_rx.recv().unwrap();

            let bound = pool
                .submit_with(TaskOptions::new().target_worker(1), || 7)
                .unwrap();

            let result = pool.suspend_processing_unit(1);
            assert!(
                matches!(
                    result,
                    Err(Error::UnsupportedOperation(
                        UnsupportedOperation::PendingStaticWork { worker: 1, .. }
                    ))
                ),
                "{policy}: {result:?}"
            );
            assert_eq!(pool.get_active_os_thread_count(), WORKERS);

            release_tx.send(()).unwrap();
            blocker.get().unwrap();
            assert_eq!(bound.get(), Ok(7));

            // With its queue empty, the worker can be suspended after all.
            assert!(wait_until(Duration::from_secs(10), || {
                pool.suspend_processing_unit(1).is_ok()
            }));
            assert_eq!(pool.get_active_os_thread_count(), WORKERS - 1);

            runtime.finalize().unwrap();
        }
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn suspension_without_elasticity_is_refused() {
    with_watchdog(|| {
        let partitioner = ResourcePartitioner::builder()
            .topology(Arc::new(TopologyBuilder::from_counts(nz!(2), nz!(1)).build()))
            .pool(PoolDeclaration::new("default", SchedulingPolicy::Local))
            .build()
            .unwrap();
        let runtime = Runtime::start(partitioner);
        let pool = runtime.default_pool();

        assert!(matches!(
            pool.suspend_processing_unit(0),
            Err(Error::UnsupportedOperation(
                UnsupportedOperation::ElasticityDisabled { .. }
            ))
        ));

        // Elasticity can be switched on at runtime.
        pool.add_scheduler_mode(SchedulerMode::ENABLE_ELASTICITY);
        pool.suspend_processing_unit(0).unwrap();
        assert_eq!(pool.get_active_os_thread_count(), 1);

        runtime.finalize().unwrap();
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn finalize_with_suspended_workers_runs_queued_work() {
    const TASKS: usize = 100_000;

    with_watchdog(|| {
        for policy in NON_STATIC_POLICIES {
            let runtime = elastic_runtime(policy);
            let pool = runtime.default_pool();

            for worker in 0..WORKERS - 1 {
                pool.suspend_processing_unit(worker).unwrap();
            }

            let completed = Arc::new(AtomicUsize::new(0));

            for _ in 0..TASKS {
                let completed = Arc::clone(&completed);
                pool.post(move || {
                    completed.fetch_add(1, Ordering::Relaxed);
                })
                .unwrap();
            }

            // Nothing waits for the tasks; finalize itself has to drain them.
            runtime.finalize().unwrap();

            assert_eq!(completed.load(Ordering::Relaxed), TASKS, "{policy}");
        }
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn suspending_worker_blocked_in_wait_takes_no_new_tasks() {
    with_watchdog(|| {
        let partitioner = ResourcePartitioner::builder()
            .topology(Arc::new(TopologyBuilder::from_counts(nz!(2), nz!(1)).build()))
            .pool(
                PoolDeclaration::new("default", SchedulingPolicy::LocalPriorityFifo)
                    .scheduler_mode(SchedulerMode::default() | SchedulerMode::ENABLE_ELASTICITY),
            )
            .build()
            .unwrap();
        let runtime = Arc::new(Runtime::start(partitioner));
        let pool = runtime.default_pool();

        // One worker is occupied until we release it. Either worker may end up running it.
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (blocker_started_tx, blocker_started_rx) = mpsc::channel();
        let blocker = pool
            .submit_with(TaskOptions::new().target_worker(0), move || {
                blocker_started_tx.send(current_worker()).unwrap();
                release_rx.recv().unwrap();
            })
            .unwrap();
        let busy = blocker_started_rx.recv().unwrap();
        let waiting = 1 - busy;

        // The other worker waits inside a task for a promise that we satisfy at the end.
        let mut promise = Promise::<u32>::new();
        let awaited = promise.get_future().unwrap();
        let (waiter_started_tx, waiter_started_rx) = mpsc::channel();
        let waiter = pool
            .submit_with(TaskOptions::new().target_worker(waiting), move || {
                waiter_started_tx.send(current_worker()).unwrap();
                awaited.get().unwrap()
            })
            .unwrap();
        assert_eq!(waiter_started_rx.recv().unwrap(), waiting);

        // Returns only once the waiting worker parks, which is after its task completes.
        let suspender = thread::spawn({
            let runtime = Arc::clone(&runtime);
            move || runtime.default_pool().suspend_processing_unit(waiting)
        });

        assert!(wait_until(Duration::from_secs(10), || {
            pool.get_active_os_thread_count() == 1
        }));

        let followers: Vec<_> = (0..5)
            .map(|_| {
                pool.submit_with(TaskOptions::new().target_worker(busy), current_worker)
                    .unwrap()
            })
            .collect();

        // The suspending worker must not pick these up while it waits.
        thread::sleep(Duration::from_millis(50));
        assert!(followers.iter().all(|follower| !follower.is_ready()));

        release_tx.send(()).unwrap();
        blocker.get().unwrap();

        for follower in followers {
            assert_eq!(follower.get(), Ok(busy));
        }

        promise.set_value(5).unwrap();
        assert_eq!(waiter.get(), Ok(5));
        suspender.join().unwrap().unwrap();
        assert_eq!(pool.get_active_os_thread_count(), 1);

        Arc::into_inner(runtime).unwrap().finalize().unwrap();
    });
}

/// Worker index parsed from the `<pool>-w<index>` thread name.
fn current_worker() -> usize {
    thread::current()
        .name()
        .and_then(|name| name.rsplit_once("-w"))
        .and_then(|(_, index)| index.parse().ok())
        .unwrap()
}
