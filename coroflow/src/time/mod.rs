//! Time utilities driven by the event loop's timer queue.
//!
//! It includes:
//! - [`sleep`] for suspending a task until a deadline,
//! - [`timeout`] for bounding how long a future may take,
//! - [`instrumented`] for measuring how long a future took.

mod instrumented;
mod sleep;
mod timeout;

#[doc(inline)]
pub use instrumented::{Instrumented, instrumented};

#[doc(inline)]
pub use sleep::{Sleep, sleep};

#[doc(inline)]
pub use timeout::{Timeout, timeout};

pub use crate::error::Elapsed;
