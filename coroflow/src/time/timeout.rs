use super::sleep::{Sleep, sleep};
use crate::error::Elapsed;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use pin_project::pin_project;

/// Requires `future` to complete within `duration`.
///
/// The wrapped future is polled first, so a future that is ready at the
/// deadline still wins. On expiry the future is dropped with the
/// `Timeout`.
///
/// # Examples
///
/// ```rust,ignore
/// match timeout(Duration::from_millis(50), slow()).await {
///     Ok(value) => println!("{value}"),
///     Err(elapsed) => println!("{elapsed}"),
/// }
/// ```
pub fn timeout<F>(duration: Duration, future: F) -> Timeout<F>
where
    F: Future,
{
    Timeout {
        future,
        sleep: sleep(duration),
        duration,
    }
}

/// Future returned by [`timeout`].
#[pin_project]
#[must_use = "futures do nothing unless awaited"]
pub struct Timeout<F> {
    #[pin]
    future: F,
    sleep: Sleep,
    duration: Duration,
}

impl<F: Future> Future for Timeout<F> {
    type Output = Result<F::Output, Elapsed>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if let Poll::Ready(value) = this.future.poll(cx) {
            return Poll::Ready(Ok(value));
        }

        if Pin::new(this.sleep).poll(cx).is_ready() {
            return Poll::Ready(Err(Elapsed(*this.duration)));
        }

        Poll::Pending
    }
}
