//! Partitioning topologies into pools and starting runtimes from the partitions.

use std::sync::Arc;

use many_tasks::fake::{FakeTopology, TopologyBuilder};
use many_tasks::{
    ConfigurationError, PoolDeclaration, ResourcePartitioner, Runtime, SchedulingPolicy,
};
use new_zealand::nz;
use testing::{wait_until, with_watchdog};

#[cfg_attr(miri, ignore)]
#[test]
fn active_threads_sum_to_requested_count() {
    with_watchdog(|| {
        let partitioner = ResourcePartitioner::builder()
            .topology(Arc::new(TopologyBuilder::from_counts(nz!(12), nz!(2)).build()))
            .os_threads(nz!(10))
            .pool(PoolDeclaration::new("default", SchedulingPolicy::Hierarchy))
            .pool(
                PoolDeclaration::new("io", SchedulingPolicy::Static).processing_unit_list("10-11"),
            )
            .pool(PoolDeclaration::new("timers", SchedulingPolicy::Local).num_threads(nz!(1)))
            .pool(PoolDeclaration::new("batch", SchedulingPolicy::AbpPriority))
            .build()
            .unwrap();

        let runtime = Runtime::start(partitioner);

        let total: usize = runtime
            .thread_pools()
            .map(|pool| pool.get_active_os_thread_count())
            .sum();

        assert_eq!(total, 10);
        assert_eq!(runtime.get_num_threads("io").unwrap(), 2);
        assert_eq!(runtime.get_num_threads("timers").unwrap(), 1);
        assert_eq!(runtime.get_num_threads("default").unwrap(), 4);
        assert_eq!(runtime.get_num_threads("batch").unwrap(), 3);

        runtime.finalize().unwrap();
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn every_worker_is_pinned_to_its_own_unit() {
    with_watchdog(|| {
        let topology = Arc::new(TopologyBuilder::from_counts(nz!(6), nz!(2)).build());

        let partitioner = ResourcePartitioner::builder()
            .topology(Arc::clone(&topology) as Arc<dyn many_tasks::Topology>)
            .pool(PoolDeclaration::new("default", SchedulingPolicy::LocalPriorityFifo))
            .pool(PoolDeclaration::new("side", SchedulingPolicy::Local).processing_units([0, 5]))
            .build()
            .unwrap();

        let runtime = Runtime::start(partitioner);

        assert!(wait_until(std::time::Duration::from_secs(10), || {
            topology.pinned_units().len() == 6
        }));
        assert_eq!(topology.pinned_units(), vec![0, 1, 2, 3, 4, 5]);

        let side_unit = runtime
            .get_thread_pool("side")
            .unwrap()
            .submit(FakeTopology::current_thread_unit)
            .unwrap()
            .get()
            .unwrap();
        assert!(matches!(side_unit, Some(0 | 5)), "{side_unit:?}");

        runtime.finalize().unwrap();
    });
}

#[test]
fn invalid_configurations_are_rejected() {
    let topology = || -> Arc<dyn many_tasks::Topology> {
        Arc::new(TopologyBuilder::from_counts(nz!(4), nz!(1)).build())
    };

    assert!(matches!(
        ResourcePartitioner::builder().topology(topology()).build(),
        Err(ConfigurationError::NoPools)
    ));

    assert!(matches!(
        ResourcePartitioner::builder()
            .topology(topology())
            .os_threads(nz!(5))
            .pool(PoolDeclaration::new("default", SchedulingPolicy::Local))
            .build(),
        Err(ConfigurationError::TooManyThreads { .. })
    ));

    assert!(matches!(
        ResourcePartitioner::builder()
            .topology(topology())
            .pool(PoolDeclaration::new("a", SchedulingPolicy::Local).processing_unit_list("0-2"))
            .pool(PoolDeclaration::new("b", SchedulingPolicy::Local).processing_unit_list("2-3"))
            .build(),
        Err(ConfigurationError::OverlappingProcessingUnits { index: 2, .. })
    ));

    assert!(matches!(
        ResourcePartitioner::builder()
            .topology(topology())
            .pool(PoolDeclaration::new("a", SchedulingPolicy::Local))
            .pool(PoolDeclaration::new("a", SchedulingPolicy::Local))
            .build(),
        Err(ConfigurationError::DuplicatePoolName { .. })
    ));
}

#[cfg_attr(miri, ignore)]
#[test]
fn independent_runtimes_coexist() {
    with_watchdog(|| {
        let make = || {
            let partitioner = ResourcePartitioner::builder()
                .topology(Arc::new(TopologyBuilder::from_counts(nz!(2), nz!(1)).build()))
                .pool(PoolDeclaration::new("default", SchedulingPolicy::Local))
                .build()
                .unwrap();
            Runtime::start(partitioner)
        };

        let first = make();
        let second = make();

        let a = first.submit("default", || 1).unwrap();
        let b = second.submit("default", || 2).unwrap();

        assert_eq!(a.get(), Ok(1));
        assert_eq!(b.get(), Ok(2));

        first.finalize().unwrap();

        // The second runtime is unaffected by the first one shutting down.
        assert_eq!(second.submit("default", || 3).unwrap().get(), Ok(3));
        second.finalize().unwrap();
    });
}
