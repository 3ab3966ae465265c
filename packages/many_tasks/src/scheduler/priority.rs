/// Scheduling priority of a task.
///
/// Policies that honor priorities serve all `High` tasks before any `Normal` task and all
/// `Normal` tasks before any `Low` task, both from a worker's own queues and when stealing.
/// Policies without priority support treat every task as `Normal`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum Priority {
    /// Served only when no higher-priority work is available.
    Low,

    /// The priority of tasks submitted without explicit options.
    #[default]
    Normal,

    /// Served before all other work.
    High,
}

impl Priority {
    /// Every priority, in the order workers serve them.
    pub(crate) const SERVICE_ORDER: [Self; 3] = [Self::High, Self::Normal, Self::Low];

    /// Position of this priority's queue in a worker's per-priority queue list.
    pub(crate) const fn queue_slot(self) -> usize {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}
