//! Partitions the machine into several pools with different scheduling policies.

use many_tasks::{
    PoolDeclaration, Priority, ResourcePartitioner, Runtime, SchedulingPolicy, TaskOptions,
};
use new_zealand::nz;

fn main() {
    let partitioner = ResourcePartitioner::builder()
        .pool(PoolDeclaration::new("default", SchedulingPolicy::AbpPriority))
        .pool(PoolDeclaration::new("io", SchedulingPolicy::Static).num_threads(nz!(1)))
        .build();

    let partitioner = match partitioner {
        Ok(partitioner) => partitioner,
        Err(error) => {
            // A single-processor machine cannot host two pools.
            println!("Cannot partition this machine: {error}");
            return;
        }
    };

    for name in partitioner.pool_names() {
        let units = partitioner.processing_units(name).unwrap();
        let described: Vec<_> = units.iter().map(ToString::to_string).collect();

        println!("Pool '{name}': {}", described.join(", "));
    }

    let runtime = Runtime::start(partitioner);

    let urgent = runtime
        .submit_with("default", TaskOptions::new().priority(Priority::High), || {
            "urgent work done"
        })
        .unwrap();

    let io = runtime.submit("io", || "pretend I/O done").unwrap();

    println!("{}", urgent.get().unwrap());
    println!("{}", io.get().unwrap());

    runtime.finalize().unwrap();
}
