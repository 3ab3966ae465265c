use crate::Priority;

/// Per-task scheduling options for [`ThreadPool::submit_with()`][crate::ThreadPool::submit_with].
///
/// # Example
///
/// ```
/// use many_tasks::{Priority, TaskOptions};
///
/// let options = TaskOptions::new().priority(Priority::High).target_worker(0);
///
/// assert_eq!(options.get_priority(), Priority::High);
/// assert_eq!(options.get_target_worker(), Some(0));
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TaskOptions {
    priority: Priority,
    target_worker: Option<usize>,
}

impl TaskOptions {
    /// Options for a normal-priority task placed wherever the pool sees fit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scheduling priority. Ignored by policies without priority support.
    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Asks for the task to be queued on a specific worker (0-based position in the pool).
    ///
    /// Static policies keep the task on that worker. Stealing policies use the hint for the
    /// initial placement only. If the worker is suspended, the task goes to an active worker.
    #[must_use]
    pub fn target_worker(mut self, worker: usize) -> Self {
        self.target_worker = Some(worker);
        self
    }

    /// The scheduling priority.
    #[must_use]
    pub fn get_priority(&self) -> Priority {
        self.priority
    }

    /// The requested worker, if any.
    #[must_use]
    pub fn get_target_worker(&self) -> Option<usize> {
        self.target_worker
    }
}
