//! Ready-made event sources.
//!
//! Small collaborators built on [`Signal`](crate::bridge::Signal) and
//! the event loop, covering the usual shapes of callback-driven work:
//! - [`Timer`], a single-shot or repeating timer,
//! - [`Deferred`], a one-shot result provided later,
//! - [`Worker`], a closure running on a background thread.

mod deferred;
mod timer;
mod worker;

pub use deferred::Deferred;
pub use timer::Timer;
pub use worker::Worker;
