//! Topology for platforms without native support (and Miri).
//!
//! Processor count comes from `available_parallelism()`, every processing unit is placed in
//! NUMA domain 0 and thread pinning is a no-op. Pools still work, they just do not get the
//! cache locality benefits of pinned workers.

use std::num::NonZero;
use std::thread;

use nonempty::NonEmpty;

use crate::{OsProcessorId, ProcessingUnit};

/// Builds a single-domain topology with one unit per processor reported by the standard library.
#[expect(
    clippy::cast_possible_truncation,
    reason = "processor counts are far below u32::MAX"
)]
pub(crate) fn processing_units() -> NonEmpty<ProcessingUnit> {
    let count = thread::available_parallelism().map_or(1, NonZero::get);

    let mut units = (0..count).map(|index| ProcessingUnit::new(index, index as OsProcessorId, 0));

    let first = units
        .next()
        .expect("count is at least 1 so there is always a first unit");

    NonEmpty::from((first, units.collect()))
}

#[derive(Debug, Default)]
pub(crate) struct FallbackPlatform;

impl FallbackPlatform {
    pub(crate) const fn new() -> Self {
        Self
    }

    #[expect(clippy::unused_self, reason = "matches the native platform signature")]
    pub(crate) fn discover(&self) -> NonEmpty<ProcessingUnit> {
        processing_units()
    }

    #[cfg_attr(test, mutants::skip)] // Intentionally does nothing.
    #[expect(clippy::unused_self, reason = "matches the native platform signature")]
    pub(crate) fn pin_current_thread_to(&self, _unit: &ProcessingUnit) {}

    #[cfg_attr(test, mutants::skip)] // Intentionally does nothing.
    #[expect(clippy::unused_self, reason = "matches the native platform signature")]
    pub(crate) fn set_current_thread_low_priority(&self, _low: bool) {}
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn units_are_indexed_in_order_in_one_domain() {
        let units = FallbackPlatform::new().discover();

        let expected = thread::available_parallelism().map_or(1, NonZero::get);
        assert_eq!(units.len(), expected);

        for (position, unit) in units.iter().enumerate() {
            assert_eq!(unit.index(), position);
            assert_eq!(unit.numa_domain(), 0);
        }
    }
}
