use thiserror::Error;

use crate::ProcessingUnitIndex;

/// Errors that can occur when partitioning processing units into thread pools.
///
/// These are fatal configuration problems detected before any worker thread is started.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// No thread pools were declared.
    #[error("at least one thread pool must be declared")]
    NoPools,

    /// An explicit OS thread count was requested but every pool claims a fixed set of processing
    /// units and together they use fewer threads than that.
    #[error("requested {requested} OS threads but the declared pools only use {assigned}")]
    UnassignedThreads {
        /// The requested thread count.
        requested: usize,

        /// The number of threads the pools claimed.
        assigned: usize,
    },

    /// More OS threads were requested than there are processing units in the topology,
    /// or explicit processing unit claims exceed the requested thread count.
    #[error("requested {requested} OS threads but only {available} processing units are available")]
    TooManyThreads {
        /// The number of threads that were requested (or claimed explicitly).
        requested: usize,

        /// The number of processing units that can be used.
        available: usize,
    },

    /// Two pool declarations used the same name.
    #[error("thread pool name '{name}' is declared more than once")]
    DuplicatePoolName {
        /// The duplicated name.
        name: String,
    },

    /// Two pools (or one pool twice) claimed the same processing unit.
    #[error("processing unit {index} is claimed by both '{first_pool}' and '{second_pool}'")]
    OverlappingProcessingUnits {
        /// The processing unit claimed more than once.
        index: ProcessingUnitIndex,

        /// The pool that claimed the processing unit first.
        first_pool: String,

        /// The pool that attempted to claim it again.
        second_pool: String,
    },

    /// A pool referenced a processing unit that the topology does not contain.
    #[error("thread pool '{pool}' references processing unit {index} which does not exist")]
    UnknownProcessingUnit {
        /// The pool with the invalid reference.
        pool: String,

        /// The invalid processing unit index.
        index: ProcessingUnitIndex,
    },

    /// A pool's processing unit list was not valid cpulist syntax.
    #[error("thread pool '{pool}' has an invalid processing unit list")]
    InvalidProcessingUnitList {
        /// The pool with the invalid list.
        pool: String,

        /// The parse error reported by the cpulist parser.
        #[source]
        source: cpulist::Error,
    },

    /// After honoring explicit claims, some pool could not receive even one processing unit.
    #[error("thread pool '{pool}' could not be assigned any processing units")]
    InsufficientProcessingUnits {
        /// The pool left without processing units.
        pool: String,
    },

    /// A pool explicitly declared an empty processing unit set.
    #[error("thread pool '{pool}' declares an empty processing unit set")]
    EmptyPool {
        /// The pool with no processing units.
        pool: String,
    },
}

/// A thread pool operation was rejected because it conflicts with the pool's configuration.
///
/// These errors are recoverable: the pool is left unchanged and the caller may retry
/// differently or not at all.
#[derive(Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum UnsupportedOperation {
    /// Elasticity operations require the `ENABLE_ELASTICITY` scheduler mode flag.
    #[error("thread pool '{pool}' does not have elasticity enabled")]
    ElasticityDisabled {
        /// The pool that rejected the operation.
        pool: String,
    },

    /// The worker index is outside the pool's processing unit set.
    #[error("thread pool '{pool}' has no worker {worker}")]
    UnknownWorker {
        /// The pool that rejected the operation.
        pool: String,

        /// The requested worker index.
        worker: usize,
    },

    /// The pool uses a non-stealing static policy and the worker still has tasks bound to it.
    #[error("thread pool '{pool}' cannot suspend worker {worker} with {pending} bound tasks")]
    PendingStaticWork {
        /// The pool that rejected the operation.
        pool: String,

        /// The worker that was to be suspended.
        worker: usize,

        /// How many tasks were queued for the worker.
        pending: usize,
    },

    /// A pool always keeps at least one worker running so that submitted work is serviced.
    #[error("thread pool '{pool}' cannot suspend its last active worker")]
    LastActiveWorker {
        /// The pool that rejected the operation.
        pool: String,
    },
}

/// Errors returned by the runtime and thread pool APIs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The resource partitioner rejected its configuration.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A thread pool rejected an elasticity operation.
    #[error(transparent)]
    UnsupportedOperation(#[from] UnsupportedOperation),

    /// The pool is shutting down (or has shut down) and no longer accepts work.
    #[error("thread pool '{pool}' is shutting down")]
    RuntimeShuttingDown {
        /// The pool that rejected the request.
        pool: String,
    },

    /// No thread pool with the given name exists.
    #[error("no thread pool named '{name}'")]
    UnknownPool {
        /// The requested name.
        name: String,
    },
}

/// A specialized `Result` type for runtime operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a task future did not produce a value.
///
/// Errors stay inside the future they belong to. A caller that never inspects a failed future
/// never learns about the failure.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum TaskError {
    /// The task body panicked.
    #[error("task panicked: {message}")]
    Execution {
        /// The panic message, if the payload was a string.
        message: String,
    },

    /// The task was cancelled before it started.
    #[error("task was cancelled before it started")]
    Cancelled,

    /// The task (or continuation) could not be scheduled because its pool is shutting down.
    #[error("thread pool is shutting down")]
    RuntimeShuttingDown,

    /// The promise was dropped without a value, e.g. because its task never executed.
    #[error("the promise was dropped without being satisfied")]
    BrokenPromise,

    /// The channel was closed before a value became available.
    #[error("the channel was closed")]
    ChannelClosed,
}

/// The outcome of a task: its return value or the reason there is none.
pub type TaskResult<T> = std::result::Result<T, TaskError>;

/// A [`Promise`][crate::Promise] operation conflicted with the promise's state.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum PromiseError {
    /// The future already has an outcome (set earlier or cancelled).
    #[error("the promise has already been satisfied")]
    AlreadySatisfied,

    /// The future of this promise was already retrieved.
    #[error("the future of this promise has already been retrieved")]
    FutureAlreadyRetrieved,
}

/// An [`AndGate`][crate::AndGate] segment could not be set.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum GateError {
    /// The segment index is not below the gate's segment count.
    #[error("segment {segment} is out of range for a gate with {segments} segments")]
    SegmentOutOfRange {
        /// The requested segment.
        segment: usize,

        /// The number of segments in the gate.
        segments: usize,
    },

    /// The segment was already set.
    #[error("segment {segment} was already set")]
    SegmentAlreadySet {
        /// The requested segment.
        segment: usize,
    },
}

/// A [`ReceiveBuffer`][crate::ReceiveBuffer] step was used more than once.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ReceiveBufferError {
    /// A value for the step was already stored.
    #[error("a value for step {step} was already stored")]
    AlreadyStored {
        /// The step in question.
        step: usize,
    },

    /// The value of the step was already requested.
    #[error("the value of step {step} was already requested")]
    AlreadyReceived {
        /// The step in question.
        step: usize,
    },
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::error::Error as _;
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);
    assert_impl_all!(ConfigurationError: Send, Sync, Debug);
    assert_impl_all!(UnsupportedOperation: Send, Sync, Debug);
    assert_impl_all!(TaskError: Send, Sync, Debug, Clone);

    #[test]
    fn configuration_error_converts_transparently() {
        let error: Error = ConfigurationError::NoPools.into();

        assert!(matches!(error, Error::Configuration(ConfigurationError::NoPools)));
        assert_eq!(
            error.to_string(),
            ConfigurationError::NoPools.to_string()
        );
    }

    #[test]
    fn invalid_list_exposes_parse_error_as_source() {
        let parse_error = cpulist::parse("1-x").unwrap_err();

        let error = ConfigurationError::InvalidProcessingUnitList {
            pool: "default".to_string(),
            source: parse_error,
        };

        assert!(error.source().is_some());
        assert!(error.to_string().contains("default"));
    }

    #[test]
    fn unsupported_operation_mentions_pool_and_worker() {
        let error = UnsupportedOperation::PendingStaticWork {
            pool: "io".to_string(),
            worker: 3,
            pending: 7,
        };

        let message = error.to_string();
        assert!(message.contains("io"));
        assert!(message.contains('3'));
        assert!(message.contains('7'));
    }

    #[test]
    fn task_error_includes_panic_message() {
        let error = TaskError::Execution {
            message: "division by zero".to_string(),
        };

        assert!(error.to_string().contains("division by zero"));
        assert_eq!(error.clone(), error);
    }
}
