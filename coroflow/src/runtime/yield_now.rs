use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future that hands control back to the event loop exactly once.
struct YieldOnce {
    yielded: bool,
}

impl Future for YieldOnce {
    type Output = ();

    /// On the first poll the frame reschedules itself at the back of the
    /// ready queue and suspends; the second poll completes.
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.yielded {
            return Poll::Ready(());
        }

        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Suspends the current task and lets every other ready frame run once
/// before it resumes.
///
/// # Examples
///
/// ```rust,ignore
/// async fn busy() {
///     for chunk in work() {
///         process(chunk);
///         yield_now().await;
///     }
/// }
/// ```
pub async fn yield_now() {
    YieldOnce { yielded: false }.await
}
