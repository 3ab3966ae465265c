use std::fmt::{self, Debug};

use crate::Priority;

/// A unit of deferred work as the scheduler sees it.
///
/// The closure is expected to deal with its own panics and outcome delivery (see
/// [`PackagedTask`][crate::PackagedTask]); the scheduler only moves it between queues and
/// eventually calls it exactly once.
pub(crate) struct Task {
    work: Box<dyn FnOnce() + Send>,
    priority: Priority,
}

impl Task {
    pub(crate) fn new<F>(priority: Priority, work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            work: Box::new(work),
            priority,
        }
    }

    pub(crate) fn priority(&self) -> Priority {
        self.priority
    }

    pub(crate) fn run(self) {
        (self.work)();
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("work", &"<closure>")
            .field("priority", &self.priority)
            .finish()
    }
}
