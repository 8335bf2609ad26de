use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use pin_project::pin_project;

/// Wraps a future and measures the time it takes to complete.
///
/// The returned future resolves to a tuple containing:
/// - the output of the wrapped future,
/// - the elapsed time since the first poll.
///
/// # Examples
///
/// ```rust,ignore
/// let (value, elapsed) = instrumented(async { 42 }).await;
/// println!("Completed in {:?}", elapsed);
/// ```
pub fn instrumented<F>(future: F) -> Instrumented<F> {
    Instrumented {
        future,
        start: None,
    }
}

/// A future that measures the execution time of another future.
///
/// Timing starts on the first poll, not at construction time.
#[pin_project]
#[must_use = "futures do nothing unless awaited"]
pub struct Instrumented<F> {
    #[pin]
    future: F,

    /// Instant of the first poll.
    start: Option<Instant>,
}

impl<F: Future> Future for Instrumented<F> {
    type Output = (F::Output, Duration);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let start = *this.start.get_or_insert_with(Instant::now);

        this.future
            .poll(cx)
            .map(|output| (output, start.elapsed()))
    }
}
