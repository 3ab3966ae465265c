//! Read-only view of the processing units that thread pools are carved from.
//!
//! The runtime never inspects the hardware directly. Everything it needs (the ordered list of
//! processing units, their NUMA domains and how to pin a thread to one) comes from a
//! [`Topology`] implementation. [`SystemTopology`] describes the machine the process runs on;
//! tests typically use [`fake::FakeTopology`][crate::fake::FakeTopology] instead.

use std::fmt::{self, Debug, Display};

use nonempty::NonEmpty;

mod fallback;
#[cfg(all(target_os = "linux", not(miri)))]
mod linux;
mod system;

pub use system::SystemTopology;

/// Position of a processing unit in the topology's ordered list.
///
/// This is the identity used throughout the runtime: pool declarations, partitions and
/// hierarchy-aware stealing all refer to processing units by this index.
pub type ProcessingUnitIndex = usize;

/// Identifies a processor the way the operating system tooling does.
///
/// Not guaranteed to be contiguous or to start from zero.
pub type OsProcessorId = u32;

/// Identifies a NUMA domain (memory region).
pub type NumaDomainId = u32;

/// One schedulable hardware execution context (a core or hardware thread).
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ProcessingUnit {
    index: ProcessingUnitIndex,
    numa_domain: NumaDomainId,

    /// The operating system processors a thread bound to this unit may run on.
    /// Typically exactly one.
    affinity_mask: NonEmpty<OsProcessorId>,
}

impl ProcessingUnit {
    /// Creates a processing unit that maps to a single operating system processor.
    #[must_use]
    pub fn new(
        index: ProcessingUnitIndex,
        os_processor_id: OsProcessorId,
        numa_domain: NumaDomainId,
    ) -> Self {
        Self {
            index,
            numa_domain,
            affinity_mask: NonEmpty::singleton(os_processor_id),
        }
    }

    /// Creates a processing unit that may execute on any of several operating system processors.
    #[must_use]
    pub fn with_affinity_mask(
        index: ProcessingUnitIndex,
        numa_domain: NumaDomainId,
        affinity_mask: NonEmpty<OsProcessorId>,
    ) -> Self {
        Self {
            index,
            numa_domain,
            affinity_mask,
        }
    }

    /// The position of this unit in the topology's ordered list.
    #[must_use]
    #[inline]
    pub fn index(&self) -> ProcessingUnitIndex {
        self.index
    }

    /// The NUMA domain the unit belongs to.
    #[must_use]
    #[inline]
    pub fn numa_domain(&self) -> NumaDomainId {
        self.numa_domain
    }

    /// The operating system processors a thread bound to this unit may run on.
    #[must_use]
    #[inline]
    pub fn affinity_mask(&self) -> &NonEmpty<OsProcessorId> {
        &self.affinity_mask
    }
}

impl Display for ProcessingUnit {
    #[cfg_attr(test, mutants::skip)] // No API contract for the format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = cpulist::emit(self.affinity_mask.iter().copied());
        write!(
            f,
            "PU {} (processors {mask}, NUMA domain {})",
            self.index, self.numa_domain
        )
    }
}

/// Furnishes the ordered list of processing units and binds threads to them.
///
/// Implementations must return the same list every time `list_processing_units()` is called
/// and the `index` of every unit must equal its position in that list.
pub trait Topology: Debug + Send + Sync + 'static {
    /// Returns the processing units in topology order.
    fn list_processing_units(&self) -> NonEmpty<ProcessingUnit>;

    /// Restricts the current thread to execute only on the given processing unit.
    ///
    /// Failure to apply the affinity is not fatal; implementations log and carry on.
    fn pin_current_thread_to(&self, unit: &ProcessingUnit);

    /// Lowers (`true`) or restores (`false`) the OS scheduling priority of the current thread.
    ///
    /// Used by idle workers in pools with the `REDUCE_THREAD_PRIORITY` mode.
    fn set_current_thread_low_priority(&self, low: bool);
}

/// Topological distance between two units, used to order steal victims.
///
/// Units in the same NUMA domain are always closer than units in different domains;
/// within the same tier, closer positions in topology order are nearer.
pub(crate) fn distance(a: &ProcessingUnit, b: &ProcessingUnit) -> (bool, usize) {
    (a.numa_domain != b.numa_domain, a.index.abs_diff(b.index))
}
