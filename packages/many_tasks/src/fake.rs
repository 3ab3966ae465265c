//! Fake topology for testing.
//!
//! A fake topology lets tests run thread pools with a predetermined number of processing units
//! and NUMA domains, regardless of the machine the tests execute on. Pinning does not touch
//! the operating system; it is only recorded so that tests can verify it happened.
//!
//! Only available when the `test-util` feature is enabled.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use many_tasks::fake::TopologyBuilder;
//! use many_tasks::{PoolDeclaration, ResourcePartitioner, SchedulingPolicy};
//! use new_zealand::nz;
//!
//! let topology = Arc::new(TopologyBuilder::from_counts(nz!(8), nz!(2)).build());
//!
//! let partitioner = ResourcePartitioner::builder()
//!     .topology(topology)
//!     .os_threads(nz!(8))
//!     .pool(PoolDeclaration::new("default", SchedulingPolicy::Local))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(partitioner.get_num_threads("default").unwrap(), 8);
//! ```

use std::cell::Cell;
use std::num::NonZero;
use std::sync::atomic::{AtomicUsize, Ordering};

use nonempty::NonEmpty;
use parking_lot::Mutex;

use crate::{NumaDomainId, OsProcessorId, ProcessingUnit, ProcessingUnitIndex, Topology};

thread_local! {
    static PINNED_UNIT: Cell<Option<ProcessingUnitIndex>> = const { Cell::new(None) };
}

/// Builds a [`FakeTopology`].
///
/// There are two ways to describe the processing units:
///
/// 1. [`from_counts()`][Self::from_counts] splits a number of units into contiguous blocks,
///    one per NUMA domain, the way sockets are typically enumerated.
/// 2. [`new()`][Self::new] followed by [`processing_unit()`][Self::processing_unit] for each
///    unit, to place every unit in an explicitly chosen NUMA domain.
#[derive(Clone, Debug, Default)]
pub struct TopologyBuilder {
    numa_domains: Vec<NumaDomainId>,
}

impl TopologyBuilder {
    /// Creates an empty builder. Add units with [`processing_unit()`][Self::processing_unit].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder with `unit_count` units spread evenly over `numa_domain_count`
    /// contiguous domains.
    ///
    /// If there are more domains than units, the excess domains are left empty.
    #[must_use]
    #[expect(
        clippy::arithmetic_side_effects,
        clippy::cast_possible_truncation,
        reason = "unit and NUMA domain counts are small and the divisor is non-zero"
    )]
    pub fn from_counts(unit_count: NonZero<usize>, numa_domain_count: NonZero<usize>) -> Self {
        let numa_domains = (0..unit_count.get())
            .map(|index| (index * numa_domain_count.get() / unit_count.get()) as NumaDomainId)
            .collect();

        Self { numa_domains }
    }

    /// Appends a processing unit in the given NUMA domain.
    #[must_use]
    pub fn processing_unit(mut self, numa_domain: NumaDomainId) -> Self {
        self.numa_domains.push(numa_domain);
        self
    }

    /// Creates the fake topology.
    ///
    /// # Panics
    ///
    /// Panics if no processing units were added.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "fake topologies are far smaller than u32::MAX"
    )]
    pub fn build(self) -> FakeTopology {
        let units = self
            .numa_domains
            .into_iter()
            .enumerate()
            .map(|(index, numa_domain)| {
                ProcessingUnit::new(index, index as OsProcessorId, numa_domain)
            })
            .collect::<Vec<_>>();

        let units = NonEmpty::from_vec(units)
            .expect("a fake topology must have at least one processing unit");

        FakeTopology {
            units,
            pins: Mutex::new(Vec::new()),
            low_priority_requests: AtomicUsize::new(0),
        }
    }
}

/// A [`Topology`] with a predetermined set of processing units.
///
/// Created via [`TopologyBuilder`].
#[derive(Debug)]
pub struct FakeTopology {
    units: NonEmpty<ProcessingUnit>,
    pins: Mutex<Vec<ProcessingUnitIndex>>,
    low_priority_requests: AtomicUsize,
}

impl FakeTopology {
    /// The processing units that threads have been pinned to so far, in ascending order.
    ///
    /// A unit appears once for every pin request.
    #[must_use]
    pub fn pinned_units(&self) -> Vec<ProcessingUnitIndex> {
        let mut pins = self.pins.lock().clone();
        pins.sort_unstable();
        pins
    }

    /// How many times a thread asked to lower its priority.
    #[must_use]
    pub fn low_priority_requests(&self) -> usize {
        self.low_priority_requests.load(Ordering::Relaxed)
    }

    /// The processing unit the current thread was last pinned to by any fake topology.
    ///
    /// Lets a task observe which worker it is executing on.
    #[must_use]
    pub fn current_thread_unit() -> Option<ProcessingUnitIndex> {
        PINNED_UNIT.with(Cell::get)
    }
}

impl Topology for FakeTopology {
    fn list_processing_units(&self) -> NonEmpty<ProcessingUnit> {
        self.units.clone()
    }

    fn pin_current_thread_to(&self, unit: &ProcessingUnit) {
        PINNED_UNIT.with(|pinned| pinned.set(Some(unit.index())));
        self.pins.lock().push(unit.index());
    }

    fn set_current_thread_low_priority(&self, low: bool) {
        if low {
            self.low_priority_requests.fetch_add(1, Ordering::Relaxed);
        }
    }
}
