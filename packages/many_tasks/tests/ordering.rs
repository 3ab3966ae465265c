//! Local queue ordering as observed through execution order.

use std::sync::Arc;
use std::sync::mpsc;

use many_tasks::fake::TopologyBuilder;
use many_tasks::{
    PoolDeclaration, Priority, ResourcePartitioner, Runtime, SchedulingPolicy, TaskOptions,
};
use new_zealand::nz;
use parking_lot::Mutex;
use testing::with_watchdog;

fn single_worker_runtime(policy: SchedulingPolicy) -> Runtime {
    let partitioner = ResourcePartitioner::builder()
        .topology(Arc::new(TopologyBuilder::from_counts(nz!(1), nz!(1)).build()))
        .pool(PoolDeclaration::new("default", policy))
        .build()
        .unwrap();

    Runtime::start(partitioner)
}

/// Occupies the only worker, queues the labeled tasks, then releases the worker and returns
/// the labels in execution order.
fn execution_order(
    policy: SchedulingPolicy,
    tasks: &[(&'static str, Priority)],
) -> Vec<&'static str> {
    let runtime = single_worker_runtime(policy);
    let pool = runtime.default_pool();

    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (started_tx, started_rx) = mpsc::channel::<()>();

    pool.post(move || {
        started_tx.send(()).unwrap();
        release_rx.recv().unwrap();
    })
    .unwrap();
    started_rx.recv().unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));

    let futures: Vec<_> = tasks
        .iter()
        .map(|&(label, priority)| {
            let log = Arc::clone(&log);
            pool.submit_with(TaskOptions::new().priority(priority), move || {
                log.lock().push(label);
            })
            .unwrap()
        })
        .collect();

    release_tx.send(()).unwrap();

    for future in futures {
        future.get().unwrap();
    }

    runtime.finalize().unwrap();

    Arc::try_unwrap(log).unwrap().into_inner()
}

#[cfg_attr(miri, ignore)]
#[test]
fn fifo_policies_execute_in_submission_order() {
    with_watchdog(|| {
        for policy in [
            SchedulingPolicy::Local,
            SchedulingPolicy::LocalPriorityFifo,
            SchedulingPolicy::Hierarchy,
            SchedulingPolicy::Static,
        ] {
            let order = execution_order(
                policy,
                &[
                    ("first", Priority::Normal),
                    ("second", Priority::Normal),
                    ("third", Priority::Normal),
                ],
            );

            assert_eq!(order, vec!["first", "second", "third"], "{policy}");
        }
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn lifo_policy_executes_newest_first() {
    with_watchdog(|| {
        let order = execution_order(
            SchedulingPolicy::LocalPriorityLifo,
            &[("first", Priority::Normal), ("second", Priority::Normal)],
        );

        assert_eq!(order, vec!["second", "first"]);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn priority_policies_serve_high_before_low() {
    with_watchdog(|| {
        for policy in [
            SchedulingPolicy::LocalPriorityFifo,
            SchedulingPolicy::AbpPriority,
            SchedulingPolicy::StaticPriority,
        ] {
            let order = execution_order(
                policy,
                &[
                    ("low", Priority::Low),
                    ("normal", Priority::Normal),
                    ("high", Priority::High),
                ],
            );

            assert_eq!(order, vec!["high", "normal", "low"], "{policy}");
        }
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn local_policy_ignores_priority() {
    with_watchdog(|| {
        let order = execution_order(
            SchedulingPolicy::Local,
            &[("low", Priority::Low), ("high", Priority::High)],
        );

        assert_eq!(order, vec!["low", "high"]);
    });
}
