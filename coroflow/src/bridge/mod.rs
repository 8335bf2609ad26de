//! Bridges from callback-style event sources to awaitables.
//!
//! An event source exposes a [`Signal`] per kind of event. This module
//! turns such a signal into:
//! - a one-shot future ([`make_awaiter`]),
//! - an [`AsyncGenerator`](crate::generator::AsyncGenerator) of every
//!   emission ([`make_generator_awaiter`]),
//! - the result of an [`Operation`] ([`wait_for_operation`]).
//!
//! Adapters hold sources weakly. A source closed or dropped while being
//! awaited resolves the adapter instead of leaving it hanging, and every
//! adapter resumes its awaiting frame exactly once.

mod awaiter;
mod listener;
mod operation;
mod signal;

pub use awaiter::{IntoResult, Outcome, SignalAwaiter, make_awaiter};
pub use listener::make_generator_awaiter;
pub use operation::{Operation, OperationAwaiter, wait_for_operation};
pub use signal::{CloseReason, Connection, Signal, WeakSignal};
