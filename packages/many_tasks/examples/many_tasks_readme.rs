//! Example from the README.

use many_tasks::{PoolDeclaration, ResourcePartitioner, Runtime, SchedulingPolicy, when_all};

fn main() {
    let partitioner = ResourcePartitioner::builder()
        .pool(PoolDeclaration::new("default", SchedulingPolicy::LocalPriorityFifo))
        .build()
        .unwrap();

    let runtime = Runtime::start(partitioner);
    let pool = runtime.default_pool();

    let squares = (1..=10_u64).map(|n| pool.submit(move || n * n).unwrap());

    let total = when_all(squares)
        .then(pool.handle(), |outcomes| {
            outcomes
                .unwrap()
                .into_iter()
                .map(Result::unwrap)
                .sum::<u64>()
        })
        .get()
        .unwrap();

    println!("Sum of squares: {total}");

    runtime.finalize().unwrap();
}
