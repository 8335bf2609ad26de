use crate::runtime::context;
use crate::runtime::timer::{TimerAction, TimerHandle};

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

/// Creates a future that completes after the given duration.
///
/// The deadline is computed when `sleep` is called; the timer is
/// registered with the current event loop on first poll.
///
/// # Panics
///
/// Panics if polled outside of a running runtime.
///
/// # Examples
///
/// ```rust,ignore
/// use std::time::Duration;
///
/// sleep(Duration::from_millis(10)).await;
/// ```
pub fn sleep(duration: Duration) -> Sleep {
    Sleep::until(Instant::now() + duration)
}

/// A future that completes once a specific deadline is reached.
///
/// The timer is cancelled if the future is dropped before completion,
/// so an abandoned sleep never wakes its task.
#[derive(Debug)]
pub struct Sleep {
    /// Absolute point in time when the sleep completes.
    deadline: Instant,

    /// Timer armed on the loop, with the waker it will fire.
    registered: Option<(TimerHandle, Waker)>,
}

impl Sleep {
    /// Creates a `Sleep` completing at `deadline`.
    pub fn until(deadline: Instant) -> Self {
        Self {
            deadline,
            registered: None,
        }
    }

    /// The instant at which the sleep completes.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns `true` once the deadline has passed.
    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

impl Future for Sleep {
    type Output = ();

    /// Registers a timer on the first poll, and again whenever the
    /// future is polled from a different task.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.is_elapsed() {
            if let Some((handle, _)) = this.registered.take() {
                handle.cancel();
            }
            return Poll::Ready(());
        }

        if let Some((handle, waker)) = &this.registered {
            if waker.will_wake(cx.waker()) && !handle.is_cancelled() {
                return Poll::Pending;
            }
            handle.cancel();
        }

        let waker = cx.waker().clone();
        let handle = context::with_current("Sleep", |core| {
            core.schedule(this.deadline, TimerAction::Wake(waker.clone()))
        });
        this.registered = Some((handle, waker));

        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some((handle, _)) = self.registered.take() {
            handle.cancel();
        }
    }
}
