//! Shrinks a pool at runtime by suspending processing units, then grows it back.
//!
//! Work submitted while workers are suspended still completes; queued tasks of suspended
//! workers are picked up by the workers that remain active.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use many_tasks::{
    PoolDeclaration, ResourcePartitioner, Runtime, SchedulerMode, SchedulingPolicy,
};

fn main() {
    let partitioner = ResourcePartitioner::builder()
        .pool(
            PoolDeclaration::new("default", SchedulingPolicy::Hierarchy)
                .scheduler_mode(SchedulerMode::default() | SchedulerMode::ENABLE_ELASTICITY),
        )
        .build()
        .unwrap();

    let runtime = Runtime::start(partitioner);
    let pool = runtime.default_pool();
    let workers = pool.get_os_thread_count();

    println!("Pool '{}' started with {workers} workers", pool.name());

    // Keep one worker; the pool never lets go of its last one.
    for worker in 0..workers - 1 {
        pool.suspend_processing_unit(worker).unwrap();
    }

    println!(
        "After suspending: {} active workers",
        pool.get_active_os_thread_count()
    );

    let counter = Arc::new(AtomicUsize::new(0));

    let done = pool
        .parallel_for(0..10_000, new_zealand::nz!(100), {
            let counter = Arc::clone(&counter);
            move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        })
        .unwrap();

    done.get().unwrap();
    println!(
        "Executed {} iterations on the remaining worker",
        counter.load(Ordering::Relaxed)
    );

    for worker in 0..workers - 1 {
        pool.resume_processing_unit(worker).unwrap();
    }

    println!(
        "After resuming: {} active workers",
        pool.get_active_os_thread_count()
    );

    runtime.finalize().unwrap();
}
