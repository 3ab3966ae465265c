use std::sync::Arc;

use parking_lot::Mutex;

use crate::lcos::{AndGate, SharedState};
use crate::{PoolHandle, TaskError, TaskFuture, TaskResult};

/// Combines futures into one that becomes ready once every input has an outcome.
///
/// The combined value holds the individual outcomes in input order, errors included; one
/// failed input does not fail the combination. Combining nothing yields a ready future.
///
/// # Example
///
/// ```
/// use many_tasks::{make_ready_future, when_all};
///
/// let all = when_all([make_ready_future(1), make_ready_future(2)]);
///
/// assert_eq!(all.get(), Ok(vec![Ok(1), Ok(2)]));
/// ```
pub fn when_all<T, I>(futures: I) -> TaskFuture<Vec<TaskResult<T>>>
where
    T: Send + 'static,
    I: IntoIterator<Item = TaskFuture<T>>,
{
    let futures: Vec<_> = futures.into_iter().collect();

    let gate = Arc::new(AndGate::new(futures.len()));
    let outcomes: Arc<Mutex<Vec<Option<TaskResult<T>>>>> =
        Arc::new(Mutex::new(futures.iter().map(|_| None).collect()));
    let output = Arc::new(SharedState::new());

    gate.on_open(Box::new({
        let outcomes = Arc::clone(&outcomes);
        let output = Arc::clone(&output);

        move || {
            let collected = outcomes
                .lock()
                .drain(..)
                .map(|outcome| outcome.unwrap_or(Err(TaskError::BrokenPromise)))
                .collect();

            // Nobody else completes this state.
            drop(output.complete(Ok(collected)));
        }
    }));

    for (segment, future) in futures.into_iter().enumerate() {
        let source = Arc::clone(future.state());
        let outcomes = Arc::clone(&outcomes);
        let gate = Arc::clone(&gate);

        future.state().on_ready(Box::new(move || {
            let outcome = source.take();

            if let Some(slot) = outcomes.lock().get_mut(segment) {
                *slot = Some(outcome);
            }

            // Each segment is set once, by its own future.
            drop(gate.set(segment));
        }));
    }

    TaskFuture::from_state(output)
}

/// Runs `body` as a task on `pool` once every input future has an outcome.
///
/// The body receives the outcomes in input order, exactly as [`when_all()`] collects them,
/// and its return value becomes the value of the returned future. Nothing blocks while the
/// inputs are pending.
///
/// # Example
///
/// ```
/// use many_tasks::{PoolDeclaration, ResourcePartitioner, Runtime, SchedulingPolicy, dataflow};
///
/// let partitioner = ResourcePartitioner::builder()
///     .pool(PoolDeclaration::new("default", SchedulingPolicy::Local))
///     .build()
///     .unwrap();
/// let runtime = Runtime::start(partitioner);
/// let pool = runtime.default_pool();
///
/// let left = pool.submit(|| 20).unwrap();
/// let right = pool.submit(|| 22).unwrap();
///
/// let sum = dataflow(pool.handle(), [left, right], |outcomes| {
///     outcomes.into_iter().map(Result::unwrap).sum::<i32>()
/// });
///
/// assert_eq!(sum.get(), Ok(42));
/// runtime.finalize().unwrap();
/// ```
pub fn dataflow<T, R, I, F>(pool: &PoolHandle, futures: I, body: F) -> TaskFuture<R>
where
    T: Send + 'static,
    R: Send + 'static,
    I: IntoIterator<Item = TaskFuture<T>>,
    F: FnOnce(Vec<TaskResult<T>>) -> R + Send + 'static,
{
    when_all(futures).then(pool, move |outcomes| {
        // The combined future is only ever completed with a value.
        body(outcomes.unwrap_or_default())
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::Promise;

    #[test]
    fn empty_input_is_ready() {
        let all = when_all(Vec::<TaskFuture<u8>>::new());

        assert!(all.is_ready());
        assert_eq!(all.get(), Ok(Vec::new()));
    }

    #[test]
    fn outcomes_keep_input_order() {
        let mut first = Promise::new();
        let mut second = Promise::new();
        let mut third = Promise::new();

        let all = when_all([
            first.get_future().unwrap(),
            second.get_future().unwrap(),
            third.get_future().unwrap(),
        ]);

        third.set_value(3).unwrap();
        first.set_value(1).unwrap();
        assert!(!all.is_ready());

        second.set_error(TaskError::Cancelled).unwrap();

        assert_eq!(
            all.get(),
            Ok(vec![Ok(1), Err(TaskError::Cancelled), Ok(3)])
        );
    }
}
