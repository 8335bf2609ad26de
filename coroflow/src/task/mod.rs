//! Asynchronous task primitives.
//!
//! This module defines [`Task`], the owned, resumable computation every
//! other abstraction in the crate is awaited from, together with:
//! - its lifecycle ([`TaskState`]),
//! - [`wait_for`], the synchronous bridge from blocking code.
//!
//! A task is lazy when built with [`Task::new`] and eager when built with
//! [`Task::spawn`]. Awaiting a task that is already finished, or that
//! finishes synchronously when started inline, never goes through the
//! event loop.

mod core;
mod handle;
mod state;

pub use handle::Task;
pub use state::TaskState;

use crate::runtime::Runtime;
use crate::runtime::context;

use std::future::Future;

/// Blocks the current thread until `future` completes and returns its
/// output.
///
/// The future runs on the thread's current runtime, or on a default
/// runtime built for the duration of the call.
///
/// # Panics
///
/// Panics if called from inside a task body, or if `future` panics.
///
/// # Examples
///
/// ```rust,ignore
/// let value = coroflow::task::wait_for(async {
///     sleep(Duration::from_millis(5)).await;
///     7
/// });
/// assert_eq!(value, 7);
/// ```
pub fn wait_for<F>(future: F) -> F::Output
where
    F: Future + 'static,
    F::Output: 'static,
{
    match context::current() {
        Some(core) => core.block_on(future),
        None => Runtime::default().block_on(future),
    }
}
