#![cfg_attr(
    test,
    expect(
        clippy::struct_field_names,
        reason = "false positive from automock generated code"
    )
)]

use std::fmt::{self, Debug};
use std::io;
use std::mem;
#[cfg(test)]
use std::sync::Arc;

use libc::cpu_set_t;

/// The thread affinity and priority syscalls that worker pinning relies on.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Bindings: Debug + Send + Sync + 'static {
    /// Restricts the calling thread to the processors in `cpuset`.
    fn sched_setaffinity_current(&self, cpuset: &cpu_set_t) -> Result<(), io::Error>;

    /// The processors the calling thread (and thus the process, at startup) may run on.
    fn sched_getaffinity_current(&self) -> Result<cpu_set_t, io::Error>;

    /// Sets the nice value of the calling thread only, not of the whole process.
    fn set_current_thread_nice(&self, nice: i32) -> Result<(), io::Error>;
}

/// Maps the libc "0 on success, -1 and errno on failure" convention to a `Result`.
fn zero_or_errno(result: libc::c_int) -> Result<(), io::Error> {
    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[derive(Debug, Default)]
pub(crate) struct BuildTargetBindings;

#[cfg_attr(coverage_nightly, coverage(off))] // Only reachable on a real Linux host.
impl Bindings for BuildTargetBindings {
    fn sched_setaffinity_current(&self, cpuset: &cpu_set_t) -> Result<(), io::Error> {
        // SAFETY: pid 0 is the calling thread and the size matches the set we pass.
        zero_or_errno(unsafe { libc::sched_setaffinity(0, size_of::<cpu_set_t>(), cpuset) })
    }

    fn sched_getaffinity_current(&self) -> Result<cpu_set_t, io::Error> {
        // SAFETY: cpu_set_t is a plain bit array, so the empty set is all zeroes.
        let mut cpuset: cpu_set_t = unsafe { mem::zeroed() };

        // SAFETY: pid 0 is the calling thread and the size matches the set we write into.
        zero_or_errno(unsafe {
            libc::sched_getaffinity(0, size_of::<cpu_set_t>(), &raw mut cpuset)
        })?;

        Ok(cpuset)
    }

    fn set_current_thread_nice(&self, nice: i32) -> Result<(), io::Error> {
        // PRIO_PROCESS with a thread ID adjusts just that thread.
        // SAFETY: gettid takes no arguments and cannot fail.
        let tid = unsafe { libc::syscall(libc::SYS_gettid) };

        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "thread IDs are positive and fit in id_t"
        )]
        let tid = tid as libc::id_t;

        // SAFETY: Plain integer arguments; an unknown tid is reported through errno.
        zero_or_errno(unsafe { libc::setpriority(libc::PRIO_PROCESS, tid, nice) })
    }
}

/// Real syscalls in production, a shared mock in unit tests.
#[derive(Clone)]
pub(crate) enum BindingsFacade {
    Target(&'static BuildTargetBindings),

    #[cfg(test)]
    Mock(Arc<MockBindings>),
}

impl BindingsFacade {
    pub(crate) const fn target() -> Self {
        Self::Target(&BuildTargetBindings)
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockBindings) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

impl Bindings for BindingsFacade {
    fn sched_setaffinity_current(&self, cpuset: &cpu_set_t) -> Result<(), io::Error> {
        match self {
            Self::Target(bindings) => bindings.sched_setaffinity_current(cpuset),
            #[cfg(test)]
            Self::Mock(mock) => mock.sched_setaffinity_current(cpuset),
        }
    }

    fn sched_getaffinity_current(&self) -> Result<cpu_set_t, io::Error> {
        match self {
            Self::Target(bindings) => bindings.sched_getaffinity_current(),
            #[cfg(test)]
            Self::Mock(mock) => mock.sched_getaffinity_current(),
        }
    }

    fn set_current_thread_nice(&self, nice: i32) -> Result<(), io::Error> {
        match self {
            Self::Target(bindings) => bindings.set_current_thread_nice(nice),
            #[cfg(test)]
            Self::Mock(mock) => mock.set_current_thread_nice(nice),
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // Debug output is not part of the contract.
impl Debug for BindingsFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target(inner) => inner.fmt(f),
            #[cfg(test)]
            Self::Mock(inner) => inner.fmt(f),
        }
    }
}
