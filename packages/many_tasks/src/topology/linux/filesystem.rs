#![cfg_attr(
    test,
    expect(
        clippy::struct_field_names,
        reason = "false positive from automock generated code"
    )
)]

use std::fmt::{self, Debug};
use std::fs;
#[cfg(test)]
use std::sync::Arc;

/// The parts of the sysfs virtual filesystem that describe processors and NUMA nodes.
///
/// All reads return `None` if the file does not exist. That is normal on kernels built
/// without NUMA support, in which case every processor is treated as part of node 0.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Filesystem: Debug + Send + Sync + 'static {
    /// Contents of `/sys/devices/system/cpu/online` (cpulist format).
    fn get_cpu_online_contents(&self) -> Option<String>;

    /// Contents of `/sys/devices/system/node/possible` (cpulist format).
    fn get_numa_node_possible_contents(&self) -> Option<String>;

    /// Contents of `/sys/devices/system/node/node{n}/cpulist` (cpulist format).
    fn get_numa_node_cpulist_contents(&self, node_index: u32) -> Option<String>;
}

#[derive(Debug, Default)]
pub(crate) struct BuildTargetFilesystem;

#[cfg_attr(coverage_nightly, coverage(off))] // Exercised by integration tests on real Linux.
impl Filesystem for BuildTargetFilesystem {
    fn get_cpu_online_contents(&self) -> Option<String> {
        fs::read_to_string("/sys/devices/system/cpu/online").ok()
    }

    fn get_numa_node_possible_contents(&self) -> Option<String> {
        fs::read_to_string("/sys/devices/system/node/possible").ok()
    }

    fn get_numa_node_cpulist_contents(&self, node_index: u32) -> Option<String> {
        fs::read_to_string(format!("/sys/devices/system/node/node{node_index}/cpulist")).ok()
    }
}

/// Hides the real/mock choice behind a single wrapper type.
#[derive(Clone)]
pub(crate) enum FilesystemFacade {
    Target(&'static BuildTargetFilesystem),

    #[cfg(test)]
    Mock(Arc<MockFilesystem>),
}

impl FilesystemFacade {
    pub(crate) const fn target() -> Self {
        Self::Target(&BuildTargetFilesystem)
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockFilesystem) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

impl Filesystem for FilesystemFacade {
    fn get_cpu_online_contents(&self) -> Option<String> {
        match self {
            Self::Target(filesystem) => filesystem.get_cpu_online_contents(),
            #[cfg(test)]
            Self::Mock(mock) => mock.get_cpu_online_contents(),
        }
    }

    fn get_numa_node_possible_contents(&self) -> Option<String> {
        match self {
            Self::Target(filesystem) => filesystem.get_numa_node_possible_contents(),
            #[cfg(test)]
            Self::Mock(mock) => mock.get_numa_node_possible_contents(),
        }
    }

    fn get_numa_node_cpulist_contents(&self, node_index: u32) -> Option<String> {
        match self {
            Self::Target(filesystem) => filesystem.get_numa_node_cpulist_contents(node_index),
            #[cfg(test)]
            Self::Mock(mock) => mock.get_numa_node_cpulist_contents(node_index),
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl Debug for FilesystemFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target(inner) => inner.fmt(f),
            #[cfg(test)]
            Self::Mock(inner) => inner.fmt(f),
        }
    }
}
