use crate::error::{TaskError, panic_message};

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread;

use parking_lot::Mutex;
use tracing::debug;

struct State<T> {
    result: Option<Result<T, TaskError>>,
    waker: Option<Waker>,
}

/// A closure running on its own OS thread, awaitable from the loop.
///
/// The background thread stores its result and wakes the awaiting task
/// through its waker; the task resumes on the loop thread. A panic on
/// the background thread resolves the worker with
/// [`TaskError::Panicked`].
///
/// # Examples
///
/// ```rust,ignore
/// let digest = Worker::spawn(move || checksum(&bytes)).await?;
/// ```
#[must_use = "dropping a Worker discards its result"]
pub struct Worker<T> {
    state: Arc<Mutex<State<T>>>,
    taken: bool,
}

impl<T: Send + 'static> Worker<T> {
    /// Runs `f` on a new thread.
    pub fn spawn<F>(f: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let state = Arc::new(Mutex::new(State {
            result: None,
            waker: None,
        }));

        let shared = state.clone();
        thread::spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(f))
                .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())));

            let waker = {
                let mut state = shared.lock();
                state.result = Some(result);
                state.waker.take()
            };

            debug!("worker thread finished");
            if let Some(waker) = waker {
                waker.wake();
            }
        });

        Self {
            state,
            taken: false,
        }
    }
}

impl<T> Worker<T> {
    /// Returns `true` once the closure returned or panicked.
    pub fn is_finished(&self) -> bool {
        self.taken || self.state.lock().result.is_some()
    }
}

impl<T> Future for Worker<T> {
    type Output = Result<T, TaskError>;

    /// # Panics
    ///
    /// Panics if polled again after returning `Ready`.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        assert!(!this.taken, "Worker polled after completion");

        let mut state = this.state.lock();
        match state.result.take() {
            Some(result) => {
                this.taken = true;
                Poll::Ready(result)
            }
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
