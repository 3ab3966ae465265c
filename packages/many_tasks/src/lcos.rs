//! Local control objects: the synchronization primitives tasks coordinate through.
//!
//! Every LCO is built on one shared completion state with a single-writer, many-reader
//! discipline. The first producer to complete it wins and everything that waits on it (blocked
//! threads, helping workers, `async` pollers and attached continuations) is released at once.
//! Continuations run in the order they were attached.

use std::any::Any;
use std::sync::Arc;

mod and_gate;
mod channel;
mod future;
mod packaged_task;
mod promise;
mod receive_buffer;
mod shared_future;
mod shared_state;
mod when_all;

pub use and_gate::*;
pub use channel::*;
pub use future::*;
pub use packaged_task::*;
pub use promise::*;
pub use receive_buffer::*;
pub use shared_future::*;
pub(crate) use shared_state::*;
pub use when_all::*;

/// Creates a future that already holds `value`.
pub fn make_ready_future<T>(value: T) -> TaskFuture<T> {
    TaskFuture::from_state(Arc::new(SharedState::with_outcome(Ok(value))))
}

/// Extracts the message from a panic payload, for reporting panics that were caught.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic payload is not a string".to_string()
    }
}
