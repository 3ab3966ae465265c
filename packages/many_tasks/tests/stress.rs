//! Large numbers of trivial tasks on every stealing and non-stealing policy.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use many_tasks::fake::TopologyBuilder;
use many_tasks::{PoolDeclaration, ResourcePartitioner, Runtime, SchedulingPolicy, when_all};
use new_zealand::nz;
use testing::with_watchdog;

const TASK_COUNT: usize = 100_000;

fn runtime(policy: SchedulingPolicy) -> Runtime {
    let partitioner = ResourcePartitioner::builder()
        .topology(Arc::new(TopologyBuilder::from_counts(nz!(4), nz!(2)).build()))
        .os_threads(nz!(4))
        .pool(PoolDeclaration::new("default", policy))
        .build()
        .unwrap();

    Runtime::start(partitioner)
}

#[cfg_attr(miri, ignore)]
#[test]
fn hundred_thousand_tasks_complete_and_drain() {
    with_watchdog(|| {
        for policy in [
            SchedulingPolicy::Local,
            SchedulingPolicy::LocalPriorityFifo,
            SchedulingPolicy::LocalPriorityLifo,
            SchedulingPolicy::AbpPriority,
            SchedulingPolicy::Hierarchy,
        ] {
            let runtime = runtime(policy);
            let pool = runtime.default_pool();
            let completed = Arc::new(AtomicUsize::new(0));

            for _ in 0..TASK_COUNT {
                let completed = Arc::clone(&completed);
                pool.post(move || {
                    completed.fetch_add(1, Ordering::Relaxed);
                })
                .unwrap();
            }

            runtime
                .finalize_with_timeout(Duration::from_secs(30))
                .unwrap();

            assert_eq!(completed.load(Ordering::Relaxed), TASK_COUNT, "{policy}");
        }
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn nested_fan_out_from_inside_tasks() {
    with_watchdog(|| {
        let runtime = runtime(SchedulingPolicy::AbpPriority);
        let pool = runtime.default_pool();
        let handle = pool.handle().clone();

        let total = pool
            .submit(move || {
                let children = (0..1000_usize).map(|i| handle.submit(move || i).unwrap());

                // Waiting here keeps this worker executing the children.
                when_all(children)
                    .get()
                    .unwrap()
                    .into_iter()
                    .map(Result::unwrap)
                    .sum::<usize>()
            })
            .unwrap();

        assert_eq!(total.get(), Ok(499_500));

        runtime.finalize().unwrap();
    });
}
