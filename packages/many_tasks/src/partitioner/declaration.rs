use std::num::NonZero;

use crate::{ProcessingUnitIndex, SchedulerMode, SchedulingPolicy};

/// Describes one thread pool to be carved out by the
/// [`ResourcePartitioner`][crate::ResourcePartitioner].
///
/// By default, the pool shares whatever processing units are left over after pools with
/// explicit claims have been satisfied. Use [`processing_units()`][Self::processing_units],
/// [`processing_unit_list()`][Self::processing_unit_list] or
/// [`num_threads()`][Self::num_threads] to claim a fixed set or a fixed number instead.
///
/// # Example
///
/// ```
/// use many_tasks::{PoolDeclaration, SchedulerMode, SchedulingPolicy};
///
/// let io = PoolDeclaration::new("io", SchedulingPolicy::Static)
///     .processing_unit_list("0-1")
///     .scheduler_mode(SchedulerMode::default() | SchedulerMode::ENABLE_ELASTICITY);
///
/// assert_eq!(io.name(), "io");
/// ```
#[derive(Clone, Debug)]
pub struct PoolDeclaration {
    name: String,
    policy: SchedulingPolicy,
    mode: SchedulerMode,
    claim: Claim,
}

/// How a pool obtains its processing units.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Claim {
    /// An even share of the unclaimed processing units.
    Share,

    /// Exactly these processing units.
    Units(Vec<ProcessingUnitIndex>),

    /// Exactly the processing units in this cpulist string.
    List(String),

    /// This many unclaimed processing units, in topology order.
    Count(NonZero<usize>),
}

impl PoolDeclaration {
    /// Declares a pool with the given name and scheduling policy.
    #[must_use]
    pub fn new(name: impl Into<String>, policy: SchedulingPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            mode: SchedulerMode::default(),
            claim: Claim::Share,
        }
    }

    /// Claims exactly the given processing units (by topology index).
    #[must_use]
    pub fn processing_units(
        mut self,
        units: impl IntoIterator<Item = ProcessingUnitIndex>,
    ) -> Self {
        self.claim = Claim::Units(units.into_iter().collect());
        self
    }

    /// Claims exactly the processing units in a cpulist string such as `"0-3,8"`.
    ///
    /// The string is validated when the partitioner is built.
    #[must_use]
    pub fn processing_unit_list(mut self, cpulist: impl Into<String>) -> Self {
        self.claim = Claim::List(cpulist.into());
        self
    }

    /// Claims this many processing units from those not explicitly claimed by any pool.
    #[must_use]
    pub fn num_threads(mut self, count: NonZero<usize>) -> Self {
        self.claim = Claim::Count(count);
        self
    }

    /// Sets the scheduler mode the pool starts with.
    ///
    /// Defaults to [`SchedulerMode::default()`].
    #[must_use]
    pub fn scheduler_mode(mut self, mode: SchedulerMode) -> Self {
        self.mode = mode;
        self
    }

    /// The name of the pool.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scheduling policy of the pool.
    #[must_use]
    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    /// The scheduler mode the pool starts with.
    #[must_use]
    pub fn get_scheduler_mode(&self) -> SchedulerMode {
        self.mode
    }

    pub(crate) fn claim(&self) -> &Claim {
        &self.claim
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use new_zealand::nz;

    use super::*;

    #[test]
    fn defaults_to_sharing_with_default_mode() {
        let declaration = PoolDeclaration::new("default", SchedulingPolicy::Local);

        assert_eq!(declaration.claim(), &Claim::Share);
        assert_eq!(declaration.get_scheduler_mode(), SchedulerMode::default());
        assert_eq!(declaration.policy(), SchedulingPolicy::Local);
    }

    #[test]
    fn last_claim_wins() {
        let declaration = PoolDeclaration::new("x", SchedulingPolicy::Hierarchy)
            .processing_units([1, 2])
            .num_threads(nz!(3));

        assert_eq!(declaration.claim(), &Claim::Count(nz!(3)));
    }
}
