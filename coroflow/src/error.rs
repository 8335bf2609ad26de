//! Error types surfaced by tasks, generators and event adapters.
//!
//! Recoverable conditions raised by the bridge (timeouts, closed or
//! destroyed sources) are ordinary values; contract violations such as
//! polling a finished task twice are panics and never appear here.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

/// An error observed when retrieving the result of a [`Task`](crate::task::Task).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task frame was destroyed before it produced a result.
    #[error("task frame was destroyed before it completed")]
    BrokenPromise,

    /// The task body panicked; the payload message is preserved.
    #[error("task body panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Returns `true` if the frame was destroyed before completing.
    pub fn is_broken_promise(&self) -> bool {
        matches!(self, TaskError::BrokenPromise)
    }

    /// Returns `true` if the task body panicked.
    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked(_))
    }
}

/// An error reported by an [`AsyncGenerator`](crate::generator::AsyncGenerator)
/// while advancing.
///
/// The error is reported once, at the `begin()` or `advance()` that
/// resumed the failing producer. The generator is finished afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError<E> {
    /// The producer body returned an error.
    #[error("generator body failed: {0}")]
    Body(E),

    /// The producer body panicked.
    #[error("generator body panicked: {0}")]
    Panicked(String),
}

impl<E> GeneratorError<E> {
    /// Returns the body error, if the producer failed with one.
    pub fn into_body(self) -> Option<E> {
        match self {
            GeneratorError::Body(err) => Some(err),
            GeneratorError::Panicked(_) => None,
        }
    }
}

/// Why an event adapter resolved without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum WaitError {
    /// The configured deadline elapsed before the event arrived.
    #[error("timed out waiting for the event")]
    TimedOut,

    /// The source signalled closure before the event arrived.
    #[error("event source was closed")]
    SourceClosed,

    /// The source was destroyed before the event arrived.
    #[error("event source was destroyed")]
    SourceDestroyed,
}

/// Error returned by [`timeout`](crate::time::timeout) when the deadline
/// is reached before the wrapped future completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} elapsed")]
pub struct Elapsed(pub Duration);

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages_are_extracted() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "code 7");
    }

    #[test]
    fn display_mentions_the_cause() {
        assert_eq!(
            TaskError::Panicked("boom".into()).to_string(),
            "task body panicked: boom"
        );
        assert_eq!(
            GeneratorError::Body("bad input").to_string(),
            "generator body failed: bad input"
        );
        assert_eq!(WaitError::TimedOut.to_string(), "timed out waiting for the event");
    }
}
