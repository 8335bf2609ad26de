use super::awaiter::{IntoResult, SignalAwaiter};
use super::signal::Signal;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use tracing::debug;

/// An asynchronous operation that reports completion through a signal.
///
/// This is the contract of pending replies, process handles, timers and
/// similar sources: a result may already be available, and if it is not,
/// the `completion` signal fires once when it becomes available.
pub trait Operation {
    /// Arguments carried by the completion signal.
    type Args: Clone + 'static;

    /// The result read out once the operation completed.
    type Output;

    /// Returns `true` if [`result`](Self::result) can be read now.
    fn is_result_available(&self) -> bool;

    /// Signal emitted when the operation completes.
    fn completion(&self) -> &Signal<Self::Args>;

    /// Reads the result, or `None` if the operation has none to give.
    fn result(&self) -> Option<Self::Output>;
}

/// Returns a future resolving to the result of `operation`.
///
/// Availability is checked first, so an operation that already
/// completed resolves without suspending. Otherwise the future waits for
/// the completion signal and resolves to `None` on timeout or if the
/// signal is closed or dropped.
///
/// # Examples
///
/// ```rust,ignore
/// let reply = Deferred::new();
/// // ... handed to whatever resolves it
/// let value = wait_for_operation(&reply, Some(Duration::from_secs(5))).await;
/// ```
pub fn wait_for_operation<O: Operation>(
    operation: &O,
    timeout: Option<Duration>,
) -> OperationAwaiter<'_, O> {
    OperationAwaiter {
        operation,
        timeout,
        completion: None,
    }
}

/// Future returned by [`wait_for_operation`].
#[must_use = "futures do nothing unless awaited"]
pub struct OperationAwaiter<'a, O: Operation> {
    operation: &'a O,
    timeout: Option<Duration>,

    /// Set once the operation was found pending.
    completion: Option<IntoResult<O::Args>>,
}

impl<O: Operation> OperationAwaiter<'_, O> {
    /// Returns `true` if the awaiting frame had to suspend.
    pub fn did_suspend(&self) -> bool {
        self.completion
            .as_ref()
            .is_some_and(|completion| completion.did_suspend())
    }
}

impl<O: Operation> Future for OperationAwaiter<'_, O> {
    type Output = Option<O::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.completion.is_none() {
            if this.operation.is_result_available() {
                return Poll::Ready(this.operation.result());
            }

            let signal = this.operation.completion().downgrade();
            this.completion = Some(SignalAwaiter::new(signal, this.timeout).into_result());
        }

        let Some(completion) = this.completion.as_mut() else {
            return Poll::Pending;
        };

        match ready!(Pin::new(completion).poll(cx)) {
            Ok(_) => Poll::Ready(this.operation.result()),
            Err(err) => {
                debug!(%err, "operation did not complete");
                Poll::Ready(None)
            }
        }
    }
}
