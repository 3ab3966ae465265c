use std::fmt::{self, Display};
use std::ops::{BitOr, BitOrAssign};

/// Independently combinable flags that tune how the workers of a thread pool behave.
///
/// The mode of a running pool can be changed at any time via
/// [`ThreadPool::set_scheduler_mode()`][crate::ThreadPool::set_scheduler_mode] and related
/// methods. Workers observe the new mode on their next loop iteration.
///
/// The default mode is `DO_BACKGROUND_WORK | DELAY_EXIT`. Elasticity must be opted into.
///
/// # Example
///
/// ```
/// use many_tasks::SchedulerMode;
///
/// let mode = SchedulerMode::default() | SchedulerMode::ENABLE_ELASTICITY;
///
/// assert!(mode.contains(SchedulerMode::ENABLE_ELASTICITY));
/// assert!(mode.contains(SchedulerMode::DELAY_EXIT));
/// assert!(!mode.contains(SchedulerMode::REDUCE_THREAD_PRIORITY));
/// ```
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct SchedulerMode(u32);

impl SchedulerMode {
    /// No flags set.
    pub const NONE: Self = Self(0);

    /// Idle workers perform bounded maintenance such as releasing excess queue storage.
    pub const DO_BACKGROUND_WORK: Self = Self(1 << 0);

    /// Idle workers lower their OS scheduling priority and nap instead of parking.
    pub const REDUCE_THREAD_PRIORITY: Self = Self(1 << 1);

    /// Idle workers spin briefly before parking, to pick up bursts of work sooner.
    pub const DELAY_EXIT: Self = Self(1 << 2);

    /// Allows suspending and resuming individual workers.
    pub const ENABLE_ELASTICITY: Self = Self(1 << 3);

    const NAMED: [(Self, &'static str); 4] = [
        (Self::DO_BACKGROUND_WORK, "do-background-work"),
        (Self::REDUCE_THREAD_PRIORITY, "reduce-thread-priority"),
        (Self::DELAY_EXIT, "delay-exit"),
        (Self::ENABLE_ELASTICITY, "enable-elasticity"),
    ];

    const ALL_BITS: u32 = 0b1111;

    /// Whether every flag set in `other` is also set in `self`.
    #[must_use]
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// The flags set in either `self` or `other`.
    #[must_use]
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// The flags set in `self` but not in `other`.
    #[must_use]
    #[inline]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// The raw bit representation.
    #[must_use]
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Creates a mode from raw bits, ignoring bits that do not correspond to any flag.
    #[must_use]
    #[inline]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL_BITS)
    }
}

impl Default for SchedulerMode {
    fn default() -> Self {
        Self::DO_BACKGROUND_WORK.union(Self::DELAY_EXIT)
    }
}

impl BitOr for SchedulerMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl BitOrAssign for SchedulerMode {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl Display for SchedulerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .peekable();

        if names.peek().is_none() {
            return f.write_str("none");
        }

        for (position, name) in names.enumerate() {
            if position > 0 {
                f.write_str("|")?;
            }

            f.write_str(name)?;
        }

        Ok(())
    }
}

impl fmt::Debug for SchedulerMode {
    #[cfg_attr(test, mutants::skip)] // No API contract for the format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchedulerMode({self})")
    }
}
