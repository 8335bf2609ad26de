//! The event loop.
//!
//! This module contains the single-threaded loop every other part of
//! the crate runs on. It is responsible for:
//! - resuming frames when their waker fires,
//! - firing timers in deadline order,
//! - providing the thread-local context adapters use to reach the loop,
//! - enabling cooperative multitasking via yielding.
//!
//! Most users only touch [`RuntimeBuilder`](builder::RuntimeBuilder),
//! [`Runtime`] and [`yield_now`](yield_now::yield_now).

mod injector;
mod waker;

pub(crate) mod builder;
pub(crate) mod context;
pub(crate) mod core;
pub(crate) mod timer;
pub(crate) mod yield_now;

pub use self::core::Runtime;
