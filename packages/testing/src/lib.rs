#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing and examples in `many_tasks` packages.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// How long a watchdog-guarded test may run before we declare it hung.
///
/// Pool tests spin up real worker threads and drain large task batches, so this is
/// more generous than a typical unit test budget.
const DEFAULT_WATCHDOG_TIMEOUT: Duration = Duration::from_secs(60);

/// How often [`wait_until()`] re-evaluates its predicate.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Runs a test with a timeout to prevent infinite hangs.
///
/// If the test takes longer than 60 seconds, the calling thread panics so that CI does not
/// hang on a deadlocked worker pool. The test body itself keeps running on its own thread
/// until the process exits.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog is disabled
/// and the test function is executed directly, allowing mutation testing to detect hangs.
///
/// # Panics
///
/// Panics if the test exceeds the timeout or if the test body panics (the original panic
/// is resumed on the calling thread).
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let answer = with_watchdog(|| 2 + 2);
/// assert_eq!(answer, 4);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    with_watchdog_timeout(DEFAULT_WATCHDOG_TIMEOUT, test_fn)
}

/// Same as [`with_watchdog()`] but with a caller-chosen timeout.
///
/// # Panics
///
/// Panics if the test exceeds `timeout` or if the test body panics.
pub fn with_watchdog_timeout<F, R>(timeout: Duration, test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_handle = thread::spawn(move || {
        let result = test_fn();
        // If this fails, the receiver has already timed out and nobody cares.
        drop(tx.send(result));
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_handle.join().expect("test thread should not panic after sending result");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded {timeout:?} timeout");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_handle.join() {
            Ok(()) => panic!("test thread disconnected unexpectedly"),
            Err(e) => std::panic::resume_unwind(e),
        },
    }
}

/// Polls `predicate` until it returns `true` or `timeout` elapses.
///
/// Returns whether the predicate was satisfied. Useful for observing effects of
/// fire-and-forget tasks without sleeping for a fixed duration.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use testing::wait_until;
///
/// assert!(wait_until(Duration::from_millis(10), || true));
/// ```
pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now()
        .checked_add(timeout)
        .expect("timeout is small enough to fit in an Instant");

    loop {
        if predicate() {
            return true;
        }

        if Instant::now() >= deadline {
            return false;
        }

        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn watchdog_returns_value() {
        let result = with_watchdog(|| 42);
        assert_eq!(result, 42);
    }

    #[test]
    #[should_panic]
    fn watchdog_resumes_test_panic() {
        with_watchdog(|| panic!("intentional"));
    }

    #[test]
    fn wait_until_observes_eventual_change() {
        let counter = Arc::new(AtomicUsize::new(0));

        let worker = thread::spawn({
            let counter = Arc::clone(&counter);
            move || {
                thread::sleep(Duration::from_millis(5));
                counter.store(3, Ordering::Release);
            }
        });

        assert!(wait_until(Duration::from_secs(5), || {
            counter.load(Ordering::Acquire) == 3
        }));

        worker.join().unwrap();
    }

    #[test]
    fn wait_until_gives_up() {
        assert!(!wait_until(Duration::from_millis(5), || false));
    }
}
