use std::fmt::{self, Debug};

use nonempty::NonEmpty;

#[cfg(not(all(target_os = "linux", not(miri))))]
use crate::topology::fallback::FallbackPlatform as BuildTargetPlatform;
#[cfg(all(target_os = "linux", not(miri)))]
use crate::topology::linux::LinuxPlatform as BuildTargetPlatform;
use crate::{ProcessingUnit, Topology};

/// The processing units of the machine the process is running on.
///
/// Only processors that are online and permitted by the process affinity mask are included.
/// The list is captured once, when the value is created, and does not change afterwards.
///
/// # Example
///
/// ```
/// use many_tasks::{SystemTopology, Topology};
///
/// let topology = SystemTopology::new();
/// let units = topology.list_processing_units();
///
/// println!("this machine has {} usable processing units", units.len());
/// ```
pub struct SystemTopology {
    units: NonEmpty<ProcessingUnit>,
    platform: BuildTargetPlatform,
}

impl SystemTopology {
    /// Inspects the current system.
    #[must_use]
    pub fn new() -> Self {
        let platform = BuildTargetPlatform::new();
        let units = platform.discover();

        Self { units, platform }
    }
}

impl Default for SystemTopology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology for SystemTopology {
    fn list_processing_units(&self) -> NonEmpty<ProcessingUnit> {
        self.units.clone()
    }

    fn pin_current_thread_to(&self, unit: &ProcessingUnit) {
        self.platform.pin_current_thread_to(unit);
    }

    fn set_current_thread_low_priority(&self, low: bool) {
        self.platform.set_current_thread_low_priority(low);
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl Debug for SystemTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemTopology")
            .field("units", &self.units.len())
            .field("platform", &self.platform)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(SystemTopology: Send, Sync, Debug);

    #[test]
    fn indexes_match_positions() {
        let topology = SystemTopology::new();

        for (position, unit) in topology.list_processing_units().iter().enumerate() {
            assert_eq!(unit.index(), position);
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)] // Miri cannot talk to the real platform.
    fn can_pin_to_first_unit() {
        let topology = SystemTopology::new();
        let first = topology.list_processing_units().head;

        std::thread::spawn(move || {
            topology.pin_current_thread_to(&first);
        })
        .join()
        .unwrap();
    }
}
