//! # coroflow
//!
//! **coroflow** lets callback-driven code be written as sequential
//! `async` code. It provides three building blocks on top of a small,
//! single-threaded event loop:
//!
//! - [`Task`], an owned, resumable computation with continuations and a
//!   blocking wait,
//! - [`AsyncGenerator`], a lazily produced asynchronous sequence,
//! - the [`bridge`], which turns a [`Signal`] fired by an event source
//!   into something a task can await, optionally bounded by a timeout.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use coroflow::sources::Timer;
//! use coroflow::{AsyncGenerator, make_awaiter};
//! use std::time::Duration;
//!
//! #[coroflow::main]
//! async fn main() {
//!     let timer = Timer::single_shot(Duration::from_millis(100));
//!     timer.start();
//!     make_awaiter(timer.timeout(), None).await;
//!
//!     let mut ticks = AsyncGenerator::new(|co| async move {
//!         for n in 0..3 {
//!             co.yield_(n).await;
//!         }
//!     });
//!
//!     while let Some(Ok(n)) = ticks.next().await {
//!         println!("tick {n}");
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`task`]: Tasks and the blocking bridge [`wait_for`]
//! - [`generator`]: Async generators and their iterators
//! - [`bridge`]: Signals and the adapters that await them
//! - [`sources`]: Ready-made event sources (timers, deferred results,
//!   background workers)
//! - [`time`]: Sleep, timeout and instrumentation
//! - [`error`]: Error types

mod runtime;
mod utils;

pub mod bridge;
pub mod error;
pub mod generator;
pub mod sources;
pub mod task;
pub mod time;

pub use bridge::{Signal, make_awaiter, make_generator_awaiter, wait_for_operation};
pub use error::{GeneratorError, TaskError, WaitError};
pub use generator::{AsyncGenerator, Generator};
pub use runtime::Runtime;
pub use runtime::builder::RuntimeBuilder;
pub use runtime::yield_now::yield_now;
pub use task::{Task, wait_for};

pub use coroflow_macros::*;
