use std::str::FromStr;

use derive_more::Display;
use thiserror::Error;

/// The work-distribution discipline of a thread pool.
///
/// The policy is chosen per pool when the resource partitioner is configured and cannot be
/// changed afterwards. Policy names display and parse in kebab-case (`local-priority-fifo`).
///
/// | policy | local queue order | cross-worker behavior |
/// |---|---|---|
/// | `Local` | FIFO | none |
/// | `LocalPriorityFifo` | by priority, FIFO within priority | round-robin stealing |
/// | `LocalPriorityLifo` | by priority, LIFO within priority | round-robin stealing |
/// | `AbpPriority` | by priority, double-ended | thieves take the opposite end |
/// | `Hierarchy` | by priority, FIFO within priority | same NUMA domain first, rotating |
/// | `Static` | FIFO on the worker chosen at submission | none |
/// | `StaticPriority` | by priority on the worker chosen at submission | none |
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum SchedulingPolicy {
    /// Each worker executes only its own tasks, in submission order.
    #[display("local")]
    Local,

    /// Priority queues served in FIFO order; idle workers steal round-robin.
    #[display("local-priority-fifo")]
    LocalPriorityFifo,

    /// Priority queues served in LIFO order; idle workers steal round-robin.
    #[display("local-priority-lifo")]
    LocalPriorityLifo,

    /// Priority deques; the owner works at one end while thieves take from the other.
    #[display("abp-priority")]
    AbpPriority,

    /// Priority queues; idle workers steal from topologically nearby workers first.
    #[display("hierarchy")]
    Hierarchy,

    /// Tasks are bound to the worker chosen at submission and never move.
    #[display("static")]
    Static,

    /// Like [`Static`][Self::Static] but each worker serves tasks by priority.
    #[display("static-priority")]
    StaticPriority,
}

impl SchedulingPolicy {
    /// Every policy.
    pub const ALL: [Self; 7] = [
        Self::Local,
        Self::LocalPriorityFifo,
        Self::LocalPriorityLifo,
        Self::AbpPriority,
        Self::Hierarchy,
        Self::Static,
        Self::StaticPriority,
    ];

    /// Whether idle workers take tasks queued on other workers.
    #[must_use]
    pub const fn supports_stealing(self) -> bool {
        matches!(
            self,
            Self::LocalPriorityFifo | Self::LocalPriorityLifo | Self::AbpPriority | Self::Hierarchy
        )
    }

    /// Whether tasks stay on the worker they were submitted to.
    ///
    /// Static pools refuse to suspend a worker that still has tasks bound to it.
    #[must_use]
    pub const fn is_static(self) -> bool {
        matches!(self, Self::Static | Self::StaticPriority)
    }

    /// Whether the policy honors [`Priority`][crate::Priority].
    #[must_use]
    pub const fn uses_priorities(self) -> bool {
        !matches!(self, Self::Local | Self::Static)
    }

    pub(crate) const fn discipline(self) -> QueueDiscipline {
        match self {
            Self::LocalPriorityLifo => QueueDiscipline::Lifo,
            Self::AbpPriority => QueueDiscipline::Deque,
            Self::Local
            | Self::LocalPriorityFifo
            | Self::Hierarchy
            | Self::Static
            | Self::StaticPriority => QueueDiscipline::Fifo,
        }
    }

    pub(crate) const fn victim_order(self) -> VictimOrder {
        match self {
            Self::LocalPriorityFifo | Self::LocalPriorityLifo | Self::AbpPriority => {
                VictimOrder::RoundRobin
            }
            Self::Hierarchy => VictimOrder::Nearest,
            Self::Local | Self::Static | Self::StaticPriority => VictimOrder::None,
        }
    }
}

impl FromStr for SchedulingPolicy {
    type Err = UnknownPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|policy| policy.to_string() == s)
            .ok_or_else(|| UnknownPolicyError {
                name: s.to_string(),
            })
    }
}

/// A string did not name any [`SchedulingPolicy`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("'{name}' is not a known scheduling policy")]
pub struct UnknownPolicyError {
    name: String,
}

/// Which end of a queue the owner and thieves take tasks from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum QueueDiscipline {
    /// Everyone takes the oldest task.
    Fifo,

    /// Everyone takes the newest task.
    Lifo,

    /// The owner takes the newest task, thieves take the oldest.
    Deque,
}

/// How a worker orders the other workers when looking for something to steal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum VictimOrder {
    None,
    RoundRobin,
    Nearest,
}
