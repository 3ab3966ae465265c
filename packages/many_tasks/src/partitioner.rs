//! Carves the processing units of a topology into named thread pools before the runtime starts.

use std::num::NonZero;
use std::sync::Arc;

use foldhash::{HashMap, HashMapExt, HashSet, HashSetExt};
use nonempty::NonEmpty;
use tracing::debug;

use crate::{
    ConfigurationError, Error, ProcessingUnit, ProcessingUnitIndex, Result, SchedulerMode,
    SchedulingPolicy, SystemTopology, Topology,
};

mod declaration;

pub(crate) use declaration::Claim;
pub use declaration::PoolDeclaration;

/// The name of the pool that is the default pool when one is declared with it.
pub const DEFAULT_POOL_NAME: &str = "default";

/// An immutable, validated assignment of processing units to named thread pools.
///
/// Every processing unit belongs to at most one pool and every pool owns at least one. Pass the
/// partitioner to [`Runtime::start()`][crate::Runtime::start] to create the pools.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use many_tasks::fake::TopologyBuilder;
/// use many_tasks::{PoolDeclaration, ResourcePartitioner, SchedulingPolicy};
/// use new_zealand::nz;
///
/// let partitioner = ResourcePartitioner::builder()
///     .topology(Arc::new(TopologyBuilder::from_counts(nz!(8), nz!(1)).build()))
///     .pool(PoolDeclaration::new("default", SchedulingPolicy::LocalPriorityFifo))
///     .pool(PoolDeclaration::new("io", SchedulingPolicy::Local).processing_unit_list("6-7"))
///     .build()
///     .unwrap();
///
/// assert_eq!(partitioner.get_num_threads("default").unwrap(), 6);
/// assert_eq!(partitioner.get_num_threads("io").unwrap(), 2);
/// ```
#[derive(Debug)]
pub struct ResourcePartitioner {
    topology: Arc<dyn Topology>,
    os_threads: usize,
    partitions: NonEmpty<PoolPartition>,
    default_pool: usize,
}

/// The resolved configuration of one pool.
#[derive(Debug)]
pub(crate) struct PoolPartition {
    pub(crate) name: String,
    pub(crate) policy: SchedulingPolicy,
    pub(crate) mode: SchedulerMode,
    pub(crate) units: NonEmpty<ProcessingUnit>,
}

impl ResourcePartitioner {
    /// Starts configuring a partitioner.
    #[must_use]
    pub fn builder() -> ResourcePartitionerBuilder {
        ResourcePartitionerBuilder::new()
    }

    /// The total number of OS worker threads across all pools.
    #[must_use]
    pub fn os_threads(&self) -> usize {
        self.os_threads
    }

    /// The number of worker threads (equal to processing units) assigned to the named pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if no pool has this name.
    pub fn get_num_threads(&self, pool_name: &str) -> Result<usize> {
        self.partition(pool_name).map(|partition| partition.units.len())
    }

    /// The processing units assigned to the named pool, in topology order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if no pool has this name.
    pub fn processing_units(&self, pool_name: &str) -> Result<&NonEmpty<ProcessingUnit>> {
        self.partition(pool_name).map(|partition| &partition.units)
    }

    /// The names of all pools, in declaration order.
    pub fn pool_names(&self) -> impl Iterator<Item = &str> {
        self.partitions.iter().map(|partition| partition.name.as_str())
    }

    /// The name of the default pool.
    #[must_use]
    pub fn default_pool_name(&self) -> &str {
        &self.default_partition().name
    }

    /// The topology the processing units come from.
    #[must_use]
    pub fn topology(&self) -> &Arc<dyn Topology> {
        &self.topology
    }

    pub(crate) fn into_parts(self) -> (Arc<dyn Topology>, NonEmpty<PoolPartition>, usize) {
        (self.topology, self.partitions, self.default_pool)
    }

    fn default_partition(&self) -> &PoolPartition {
        self.partitions
            .get(self.default_pool)
            .expect("default pool index is validated on construction")
    }

    fn partition(&self, pool_name: &str) -> Result<&PoolPartition> {
        self.partitions
            .iter()
            .find(|partition| partition.name == pool_name)
            .ok_or_else(|| Error::UnknownPool {
                name: pool_name.to_string(),
            })
    }
}

/// Configures and validates a [`ResourcePartitioner`].
///
/// Defaults to the [`SystemTopology`] of the current machine. The OS thread count defaults to
/// every processing unit if some pool shares the unclaimed processing units, otherwise to the
/// number of processing units the pools claim.
#[derive(Debug, Default)]
pub struct ResourcePartitionerBuilder {
    topology: Option<Arc<dyn Topology>>,
    os_threads: Option<NonZero<usize>>,
    declarations: Vec<PoolDeclaration>,
}

impl ResourcePartitionerBuilder {
    /// Creates a builder with no pools declared.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the given topology instead of the system topology.
    #[must_use]
    pub fn topology(mut self, topology: Arc<dyn Topology>) -> Self {
        self.topology = Some(topology);
        self
    }

    /// Sets the total number of OS worker threads across all pools.
    #[must_use]
    pub fn os_threads(mut self, count: NonZero<usize>) -> Self {
        self.os_threads = Some(count);
        self
    }

    /// Declares a pool. Pools are partitioned in declaration order.
    #[must_use]
    pub fn pool(mut self, declaration: PoolDeclaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    /// Validates the configuration and assigns processing units to pools.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] describing the first problem found.
    pub fn build(self) -> std::result::Result<ResourcePartitioner, ConfigurationError> {
        let topology = self
            .topology
            .unwrap_or_else(|| Arc::new(SystemTopology::new()));

        let units = topology.list_processing_units();

        let (partitions, os_threads) =
            partition(&units, self.os_threads.map(NonZero::get), self.declarations)?;

        let default_pool = partitions
            .iter()
            .position(|partition| partition.name == DEFAULT_POOL_NAME)
            .unwrap_or(0);

        for partition in &partitions {
            debug!(
                pool = %partition.name,
                policy = %partition.policy,
                units = ?partition.units.iter().map(ProcessingUnit::index).collect::<Vec<_>>(),
                "pool partitioned"
            );
        }

        Ok(ResourcePartitioner {
            topology,
            os_threads,
            partitions,
            default_pool,
        })
    }
}

/// Assigns processing units to the declared pools. Returns the partitions and the thread count.
#[expect(
    clippy::arithmetic_side_effects,
    reason = "counts are bounded by the topology size and checked before subtraction"
)]
fn partition(
    units: &NonEmpty<ProcessingUnit>,
    requested_threads: Option<usize>,
    declarations: Vec<PoolDeclaration>,
) -> std::result::Result<(NonEmpty<PoolPartition>, usize), ConfigurationError> {
    let declarations = NonEmpty::from_vec(declarations).ok_or(ConfigurationError::NoPools)?;

    let available = units.len();

    if let Some(requested) = requested_threads {
        if requested > available {
            return Err(ConfigurationError::TooManyThreads {
                requested,
                available,
            });
        }
    }

    reject_duplicate_names(&declarations)?;

    // Explicit claims first; they may name any processing unit in the topology.
    let mut owner_of: HashMap<ProcessingUnitIndex, usize> = HashMap::new();
    let mut assigned: Vec<Vec<ProcessingUnitIndex>> = vec![Vec::new(); declarations.len()];

    for (pool, declaration) in declarations.iter().enumerate() {
        let Some(indexes) = explicit_units(declaration, available)? else {
            continue;
        };

        for index in indexes {
            if let Some(&first) = owner_of.get(&index) {
                return Err(ConfigurationError::OverlappingProcessingUnits {
                    index,
                    first_pool: pool_name(&declarations, first),
                    second_pool: declaration.name().to_string(),
                });
            }

            owner_of.insert(index, pool);

            if let Some(target) = assigned.get_mut(pool) {
                target.push(index);
            }
        }
    }

    let counted: usize = declarations
        .iter()
        .filter_map(|declaration| match declaration.claim() {
            Claim::Count(count) => Some(count.get()),
            _ => None,
        })
        .sum();

    let sharing = declarations
        .iter()
        .filter(|declaration| *declaration.claim() == Claim::Share)
        .count();

    let fixed = owner_of.len() + counted;

    let os_threads = match requested_threads {
        Some(requested) => requested,
        None if sharing > 0 => available,
        None => fixed,
    };

    // Counted pools can ask for more threads than there are units, even without an explicit
    // thread count.
    if os_threads > available {
        return Err(ConfigurationError::TooManyThreads {
            requested: os_threads,
            available,
        });
    }

    if fixed > os_threads {
        return Err(ConfigurationError::TooManyThreads {
            requested: fixed,
            available: os_threads,
        });
    }

    let mut remaining = os_threads - fixed;

    if sharing == 0 && remaining > 0 {
        return Err(ConfigurationError::UnassignedThreads {
            requested: os_threads,
            assigned: fixed,
        });
    }

    // Unclaimed units are handed out in topology order, counted pools before sharing ones.
    let mut unclaimed = units
        .iter()
        .map(ProcessingUnit::index)
        .filter(|index| !owner_of.contains_key(index));

    let share = remaining.checked_div(sharing).unwrap_or(0);
    let mut extra = remaining.checked_rem(sharing).unwrap_or(0);

    for (pool, declaration) in declarations.iter().enumerate() {
        let take = match declaration.claim() {
            Claim::Count(count) => count.get(),
            _ => continue,
        };

        if let Some(target) = assigned.get_mut(pool) {
            target.extend(unclaimed.by_ref().take(take));
        }
    }

    for (pool, declaration) in declarations.iter().enumerate() {
        if *declaration.claim() != Claim::Share {
            continue;
        }

        let mut take = share;
        if extra > 0 {
            take += 1;
            extra -= 1;
        }
        remaining -= take;

        if let Some(target) = assigned.get_mut(pool) {
            target.extend(unclaimed.by_ref().take(take));
        }
    }

    debug_assert_eq!(remaining, 0);

    let partitions = declarations
        .into_iter()
        .zip(assigned)
        .map(|(declaration, mut indexes)| {
            indexes.sort_unstable();

            let pool_units = indexes
                .into_iter()
                .filter_map(|index| units.get(index).cloned())
                .collect::<Vec<_>>();

            let units = NonEmpty::from_vec(pool_units).ok_or_else(|| {
                ConfigurationError::InsufficientProcessingUnits {
                    pool: declaration.name().to_string(),
                }
            })?;

            Ok(PoolPartition {
                name: declaration.name().to_string(),
                policy: declaration.policy(),
                mode: declaration.get_scheduler_mode(),
                units,
            })
        })
        .collect::<std::result::Result<Vec<_>, ConfigurationError>>()?;

    let partitions =
        NonEmpty::from_vec(partitions).expect("there is one partition per declaration");

    Ok((partitions, os_threads))
}

fn reject_duplicate_names(
    declarations: &NonEmpty<PoolDeclaration>,
) -> std::result::Result<(), ConfigurationError> {
    let mut seen = HashSet::with_capacity(declarations.len());

    for declaration in declarations {
        if !seen.insert(declaration.name()) {
            return Err(ConfigurationError::DuplicatePoolName {
                name: declaration.name().to_string(),
            });
        }
    }

    Ok(())
}

/// Resolves an explicit claim into topology indexes. Returns `None` for pools without one.
fn explicit_units(
    declaration: &PoolDeclaration,
    available: usize,
) -> std::result::Result<Option<Vec<ProcessingUnitIndex>>, ConfigurationError> {
    let indexes = match declaration.claim() {
        Claim::Units(indexes) => indexes.clone(),
        Claim::List(cpulist) => cpulist::parse(cpulist)
            .map_err(|source| ConfigurationError::InvalidProcessingUnitList {
                pool: declaration.name().to_string(),
                source,
            })?
            .into_iter()
            .map(|index| index as ProcessingUnitIndex)
            .collect(),
        Claim::Share | Claim::Count(_) => return Ok(None),
    };

    if indexes.is_empty() {
        return Err(ConfigurationError::EmptyPool {
            pool: declaration.name().to_string(),
        });
    }

    if let Some(&index) = indexes.iter().find(|index| **index >= available) {
        return Err(ConfigurationError::UnknownProcessingUnit {
            pool: declaration.name().to_string(),
            index,
        });
    }

    Ok(Some(indexes))
}

fn pool_name(declarations: &NonEmpty<PoolDeclaration>, pool: usize) -> String {
    declarations
        .get(pool)
        .map(|declaration| declaration.name().to_string())
        .unwrap_or_default()
}
