//! Linux topology discovery via sysfs and thread pinning via `sched_setaffinity()`.

use std::mem;

use foldhash::{HashMap, HashMapExt};
use libc::cpu_set_t;
use nonempty::NonEmpty;
use tracing::{debug, warn};

use crate::topology::fallback;
use crate::{NumaDomainId, OsProcessorId, ProcessingUnit};

mod bindings;
mod filesystem;

pub(crate) use bindings::*;
pub(crate) use filesystem::*;

/// Niceness applied to idle workers in pools that reduce thread priority.
const IDLE_NICE: i32 = 10;

/// Niceness that idle workers return to when they pick up work again.
const NORMAL_NICE: i32 = 0;

#[derive(Debug)]
pub(crate) struct LinuxPlatform {
    bindings: BindingsFacade,
    filesystem: FilesystemFacade,
}

impl LinuxPlatform {
    pub(crate) const fn new() -> Self {
        Self {
            bindings: BindingsFacade::target(),
            filesystem: FilesystemFacade::target(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_facades(bindings: BindingsFacade, filesystem: FilesystemFacade) -> Self {
        Self {
            bindings,
            filesystem,
        }
    }

    /// Lists the online processors this process is allowed to execute on, in ascending
    /// processor ID order.
    ///
    /// If sysfs is unavailable (e.g. in restricted containers), we fall back to the
    /// platform-independent logic.
    pub(crate) fn discover(&self) -> NonEmpty<ProcessingUnit> {
        let Some(online) = self
            .filesystem
            .get_cpu_online_contents()
            .and_then(|contents| parse_cpulist(&contents, "online processors"))
        else {
            warn!("unable to read online processors from sysfs, using fallback topology");
            return fallback::processing_units();
        };

        let allowed = match self.bindings.sched_getaffinity_current() {
            Ok(cpuset) => Some(cpuset),
            Err(error) => {
                debug!(%error, "unable to query process affinity, assuming all processors allowed");
                None
            }
        };

        let numa_domains = self.numa_domain_by_processor();

        let units = online
            .into_iter()
            .filter(|&id| allowed.as_ref().is_none_or(|cpuset| is_in_cpuset(cpuset, id)))
            .enumerate()
            .map(|(index, id)| {
                let numa_domain = numa_domains.get(&id).copied().unwrap_or_default();
                ProcessingUnit::new(index, id, numa_domain)
            })
            .collect::<Vec<_>>();

        if let Some(units) = NonEmpty::from_vec(units) {
            debug!(count = units.len(), "discovered processing units");
            units
        } else {
            warn!("no online processors are in the process affinity mask, using fallback topology");
            fallback::processing_units()
        }
    }

    fn numa_domain_by_processor(&self) -> HashMap<OsProcessorId, NumaDomainId> {
        let mut result = HashMap::new();

        let Some(nodes) = self
            .filesystem
            .get_numa_node_possible_contents()
            .and_then(|contents| parse_cpulist(&contents, "possible NUMA nodes"))
        else {
            // Kernel without NUMA support; everything is in domain 0.
            return result;
        };

        for node in nodes {
            // Possible but offline nodes have no cpulist file.
            let Some(processors) = self
                .filesystem
                .get_numa_node_cpulist_contents(node)
                .and_then(|contents| parse_cpulist(&contents, "NUMA node processors"))
            else {
                continue;
            };

            for processor in processors {
                result.insert(processor, node);
            }
        }

        result
    }

    pub(crate) fn pin_current_thread_to(&self, unit: &ProcessingUnit) {
        // SAFETY: All zeroes is a valid cpu_set_t.
        let mut cpuset: cpu_set_t = unsafe { mem::zeroed() };

        for &id in unit.affinity_mask() {
            let Ok(id) = usize::try_from(id) else {
                continue;
            };

            if id >= cpuset_capacity() {
                warn!(id, "processor ID does not fit in cpu_set_t, not pinning to it");
                continue;
            }

            // SAFETY: We checked above that the ID is within the bounds of the set.
            unsafe {
                libc::CPU_SET(id, &mut cpuset);
            }
        }

        if let Err(error) = self.bindings.sched_setaffinity_current(&cpuset) {
            // Pinning is an optimization; an unpinned worker still executes tasks correctly.
            warn!(%error, unit = %unit, "failed to pin thread to processing unit");
        }
    }

    pub(crate) fn set_current_thread_low_priority(&self, low: bool) {
        let nice = if low { IDLE_NICE } else { NORMAL_NICE };

        // Raising priority back may be denied without CAP_SYS_NICE.
        if let Err(error) = self.bindings.set_current_thread_nice(nice) {
            debug!(%error, nice, "failed to change thread priority");
        }
    }
}

fn parse_cpulist(contents: &str, what: &str) -> Option<Vec<u32>> {
    match cpulist::parse(contents.trim()) {
        Ok(list) => Some(list),
        Err(error) => {
            warn!(%error, what, "malformed cpulist in sysfs");
            None
        }
    }
}

fn cpuset_capacity() -> usize {
    size_of::<cpu_set_t>().saturating_mul(8)
}

fn is_in_cpuset(cpuset: &cpu_set_t, id: OsProcessorId) -> bool {
    let Ok(id) = usize::try_from(id) else {
        return false;
    };

    if id >= cpuset_capacity() {
        return false;
    }

    // SAFETY: We checked above that the ID is within the bounds of the set.
    unsafe { libc::CPU_ISSET(id, cpuset) }
}
