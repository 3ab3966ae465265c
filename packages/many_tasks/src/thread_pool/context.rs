//! Knowledge of whether the current thread is a pool worker, and which one.

use std::cell::RefCell;
use std::sync::Arc;

use crate::thread_pool::PoolInner;

thread_local! {
    static CURRENT_WORKER: RefCell<Option<WorkerContext>> = const { RefCell::new(None) };
}

#[derive(Clone, Debug)]
struct WorkerContext {
    pool: Arc<PoolInner>,
    worker: usize,
}

/// Marks the current thread as the given worker until the returned guard is dropped.
pub(crate) fn enter(pool: &Arc<PoolInner>, worker: usize) -> ContextGuard {
    CURRENT_WORKER.with_borrow_mut(|current| {
        *current = Some(WorkerContext {
            pool: Arc::clone(pool),
            worker,
        });
    });

    ContextGuard { _private: () }
}

#[derive(Debug)]
pub(crate) struct ContextGuard {
    _private: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        drop(CURRENT_WORKER.with_borrow_mut(Option::take));
    }
}

/// If the current thread is a worker of `pool`, returns its worker index.
pub(crate) fn current_worker_of(pool: &PoolInner) -> Option<usize> {
    CURRENT_WORKER.with_borrow(|current| {
        current
            .as_ref()
            .filter(|context| std::ptr::eq(Arc::as_ptr(&context.pool), pool))
            .map(|context| context.worker)
    })
}

/// The pool the current thread is a worker of, if any.
pub(crate) fn current_pool() -> Option<Arc<PoolInner>> {
    CURRENT_WORKER.with_borrow(|current| current.as_ref().map(|context| Arc::clone(&context.pool)))
}

/// Whether the current thread is a worker of any pool.
pub(crate) fn is_worker_thread() -> bool {
    CURRENT_WORKER.with_borrow(Option::is_some)
}

/// Executes one task from the current worker's queues (or by stealing), if the current thread
/// is a worker and there is something to do.
///
/// Used by blocking waits so that a worker keeps making progress on other tasks instead of
/// blocking its OS thread. Returns whether a task was executed. Workers that are suspending or
/// shutting down never help.
pub(crate) fn help_one() -> bool {
    let Some(context) = CURRENT_WORKER.with_borrow(Clone::clone) else {
        return false;
    };

    // The borrow is released before the task runs, as the task may itself wait and help.
    context.pool.help_as(context.worker)
}
