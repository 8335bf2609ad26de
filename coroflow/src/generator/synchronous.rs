use super::co::{Co, Handoff, Turn};
use super::{GeneratorState, NEXT_GENERATOR_ID};

use std::fmt;
use std::future::Future;
use std::iter::FusedIterator;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::Ordering;
use std::task::{Context, Poll, Waker};

use tracing::{debug, trace};

/// A lazily evaluated sequence of `T` produced without an event loop.
///
/// The body is written like an [`AsyncGenerator`](super::AsyncGenerator)
/// body but may only suspend in [`Co::yield_`]. Each call to
/// [`next`](Iterator::next) runs it on the calling thread up to its next
/// yield.
///
/// ```rust,ignore
/// let squares = Generator::new(|co| async move {
///     for n in 0u32.. {
///         co.yield_(n * n).await;
///     }
/// });
///
/// let first: Vec<u32> = squares.take(4).collect();
/// ```
///
/// A panic in the body propagates out of the `next` that resumed it.
pub struct Generator<T> {
    id: u64,

    handoff: Rc<Handoff<T>>,

    /// `None` once the body finished.
    frame: Option<Pin<Box<dyn Future<Output = ()>>>>,

    state: GeneratorState,
}

impl<T: 'static> Generator<T> {
    /// Creates a generator from `body`.
    ///
    /// `body` is called immediately to build the frame, but the returned
    /// future is not polled until the first `next`.
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Co<T>) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        let handoff = Rc::new(Handoff::new());
        let frame = Box::pin(body(Co::new(handoff.clone())));

        Self {
            id: NEXT_GENERATOR_ID.fetch_add(1, Ordering::Relaxed),
            handoff,
            frame: Some(frame),
            state: GeneratorState::NotStarted,
        }
    }
}

impl<T> Generator<T> {
    /// Current state of the producer frame.
    pub fn state(&self) -> GeneratorState {
        self.state
    }

    fn finish(&mut self, state: GeneratorState) {
        self.state = state;
        self.frame = None;
        self.handoff.clear();
        debug!(generator = self.id, state = ?self.state, "producer finished");
    }
}

impl<T> Iterator for Generator<T> {
    type Item = T;

    /// Resumes the body and moves its next value out.
    ///
    /// # Panics
    ///
    /// Panics if the body panics, or if it suspends on anything other
    /// than [`Co::yield_`]. The generator is finished either way.
    fn next(&mut self) -> Option<T> {
        let frame = self.frame.as_mut()?;

        if self.state == GeneratorState::SuspendedAtYield {
            self.handoff.resume_producer();
        }
        self.state = GeneratorState::Running;

        let mut cx = Context::from_waker(Waker::noop());
        let poll = panic::catch_unwind(AssertUnwindSafe(|| frame.as_mut().poll(&mut cx)));

        match poll {
            Ok(Poll::Pending) if self.handoff.turn() == Turn::Consumer => {
                self.state = GeneratorState::SuspendedAtYield;
                trace!(generator = self.id, "producer yielded");
                self.handoff.take()
            }
            Ok(Poll::Pending) => {
                self.finish(GeneratorState::FinishedWithError);
                panic!("generator body suspended outside yield_; use AsyncGenerator to await events");
            }
            Ok(Poll::Ready(())) => {
                self.finish(GeneratorState::Finished);
                None
            }
            Err(payload) => {
                self.finish(GeneratorState::FinishedWithError);
                panic::resume_unwind(payload)
            }
        }
    }
}

impl<T> FusedIterator for Generator<T> {}

impl<T> Drop for Generator<T> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            trace!(generator = self.id, state = ?self.state, "destroying producer frame");
            drop(frame);
        }
    }
}

impl<T> fmt::Debug for Generator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}
