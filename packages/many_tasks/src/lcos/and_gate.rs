use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::lcos::{Callback, SharedState};
use crate::{GateError, SharedTaskFuture};

/// Becomes ready once each of its segments has been set exactly once.
///
/// Segments can be set from any thread, in any order. The gate opens when the last segment is
/// set; a gate with zero segments is open from the start. Share the gate between producers by
/// wrapping it in an [`Arc`].
///
/// # Example
///
/// ```
/// use many_tasks::AndGate;
///
/// let gate = AndGate::new(2);
/// let opened = gate.future();
///
/// gate.set(1).unwrap();
/// assert!(!opened.is_ready());
///
/// gate.set(0).unwrap();
/// assert!(opened.is_ready());
/// ```
#[derive(Debug)]
pub struct AndGate {
    segments: Box<[AtomicBool]>,
    remaining: AtomicUsize,
    state: Arc<SharedState<()>>,
}

impl AndGate {
    /// Creates a gate with the given number of segments, none of them set.
    #[must_use]
    pub fn new(segments: usize) -> Self {
        let state = if segments == 0 {
            SharedState::with_outcome(Ok(()))
        } else {
            SharedState::new()
        };

        Self {
            segments: (0..segments).map(|_| AtomicBool::new(false)).collect(),
            remaining: AtomicUsize::new(segments),
            state: Arc::new(state),
        }
    }

    /// Sets one segment. Setting the last unset segment opens the gate.
    ///
    /// # Errors
    ///
    /// Fails if the segment does not exist or was already set. The gate is unaffected.
    pub fn set(&self, segment: usize) -> Result<(), GateError> {
        let flag = self
            .segments
            .get(segment)
            .ok_or(GateError::SegmentOutOfRange {
                segment,
                segments: self.segments.len(),
            })?;

        if flag.swap(true, Ordering::AcqRel) {
            return Err(GateError::SegmentAlreadySet { segment });
        }

        // Each segment decrements exactly once, so this cannot underflow.
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Only the last setter gets here.
            drop(self.state.complete(Ok(())));
        }

        Ok(())
    }

    /// The number of segments the gate was created with.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// The number of segments not yet set.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Whether every segment has been set.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// A future that becomes ready when the gate opens.
    pub fn future(&self) -> SharedTaskFuture<()> {
        SharedTaskFuture::from_state(Arc::clone(&self.state))
    }

    pub(crate) fn on_open(&self, callback: Callback) {
        self.state.on_ready(callback);
    }
}
