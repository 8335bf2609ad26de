//! Lazily produced asynchronous sequences.
//!
//! An [`AsyncGenerator`] owns a producer frame that hands values to a
//! single consumer one at a time:
//!
//! ```rust,ignore
//! let mut numbers = AsyncGenerator::new(|co| async move {
//!     for n in 0..3 {
//!         sleep(Duration::from_millis(10)).await;
//!         co.yield_(n).await;
//!     }
//! });
//!
//! let end = numbers.end();
//! let mut it = numbers.begin().await?;
//! while it != end {
//!     println!("{}", *it.get());
//!     it.advance().await?;
//! }
//! ```
//!
//! The producer only runs while the consumer is waiting in `begin`,
//! `advance` or `next`; while it awaits an external event the consumer
//! is parked with it. Dropping the generator destroys the frame wherever
//! it is suspended.
//!
//! [`Generator`] runs the same kind of body as a plain [`Iterator`], for
//! sequences that never wait on the event loop.

mod co;
mod iter;
mod synchronous;

pub use co::{Co, Yield};
pub use iter::{Advance, Begin, GeneratorIterator};
pub use synchronous::Generator;

use crate::error::{GeneratorError, panic_message};
use co::{Handoff, Turn};

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, ready};

use futures_lite::Stream;
use tracing::{debug, trace};

static NEXT_GENERATOR_ID: AtomicU64 = AtomicU64::new(0);

type ProducerFrame<E> = Pin<Box<dyn Future<Output = Result<(), E>>>>;

/// Lifecycle of a generator's producer frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorState {
    /// Created; the body has not been polled.
    NotStarted,

    /// The body is being polled.
    Running,

    /// The body yielded and waits for the consumer to advance.
    SuspendedAtYield,

    /// The body awaits something other than the consumer.
    SuspendedAwaitingExternal,

    /// The body returned.
    Finished,

    /// The body failed; the error was reported to the consumer.
    FinishedWithError,
}

/// A lazily evaluated, asynchronously produced sequence of `T`.
///
/// `E` is the error type of a fallible body built with
/// [`try_new`](Self::try_new).
pub struct AsyncGenerator<T, E = Infallible> {
    /// Identity of the producer frame, used by iterator equality.
    id: u64,

    handoff: Rc<Handoff<T>>,

    /// `None` once the body finished.
    frame: Option<ProducerFrame<E>>,

    state: GeneratorState,
}

impl<T: 'static> AsyncGenerator<T> {
    /// Creates a generator whose body cannot fail.
    ///
    /// `body` is called immediately to build the frame, but the returned
    /// future is not polled until the first `begin` or `next`.
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Co<T>) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        let handoff = Rc::new(Handoff::new());
        let producer = body(Co::new(handoff.clone()));

        Self::from_frame(
            handoff,
            Box::pin(async move {
                producer.await;
                Ok(())
            }),
        )
    }
}

impl<T: 'static, E: 'static> AsyncGenerator<T, E> {
    /// Creates a generator whose body may fail with `E`.
    ///
    /// An error returned by the body is reported once, by the `begin` or
    /// `advance` that resumed it, as [`GeneratorError::Body`].
    pub fn try_new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Co<T>) -> Fut,
        Fut: Future<Output = Result<(), E>> + 'static,
    {
        let handoff = Rc::new(Handoff::new());
        let producer = body(Co::new(handoff.clone()));

        Self::from_frame(handoff, Box::pin(producer))
    }

    fn from_frame(handoff: Rc<Handoff<T>>, frame: ProducerFrame<E>) -> Self {
        Self {
            id: NEXT_GENERATOR_ID.fetch_add(1, Ordering::Relaxed),
            handoff,
            frame: Some(frame),
            state: GeneratorState::NotStarted,
        }
    }
}

impl<T, E> AsyncGenerator<T, E> {
    /// Current state of the producer frame.
    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// Starts the producer and resolves to an iterator at its first
    /// value, or to the end sentinel if the body yields nothing.
    ///
    /// On a generator that already started, resolves to the current
    /// position without resuming the producer.
    pub fn begin(&mut self) -> Begin<'_, T, E> {
        Begin::new(self)
    }

    /// Returns the end sentinel.
    pub fn end<'a>(&self) -> GeneratorIterator<'a, T, E> {
        GeneratorIterator::sentinel()
    }

    /// Resumes the producer and moves the next value out.
    ///
    /// Resolves to `None` once the sequence is over. A body failure is
    /// reported once as `Some(Err(..))`.
    pub fn next(&mut self) -> Next<'_, T, E> {
        Next { generator: self }
    }

    /// Polls toward the first position: starts the producer, or reports
    /// where a started one stands.
    pub(crate) fn poll_start(&mut self, cx: &mut Context<'_>) -> Poll<Result<bool, GeneratorError<E>>> {
        match self.state {
            GeneratorState::SuspendedAtYield => Poll::Ready(Ok(true)),
            GeneratorState::Finished | GeneratorState::FinishedWithError => Poll::Ready(Ok(false)),
            _ => self.poll_resume(cx),
        }
    }

    /// Gives the producer the turn and polls it with the consumer's
    /// context.
    ///
    /// Resolves to `Ok(true)` when a value was yielded and `Ok(false)`
    /// when the body is over.
    pub(crate) fn poll_resume(&mut self, cx: &mut Context<'_>) -> Poll<Result<bool, GeneratorError<E>>> {
        let Some(frame) = self.frame.as_mut() else {
            return Poll::Ready(Ok(false));
        };

        if self.state == GeneratorState::SuspendedAtYield {
            self.handoff.resume_producer();
        }
        self.state = GeneratorState::Running;

        let poll = panic::catch_unwind(AssertUnwindSafe(|| frame.as_mut().poll(cx)));

        let outcome = match poll {
            Ok(Poll::Pending) if self.handoff.turn() == Turn::Consumer => {
                self.state = GeneratorState::SuspendedAtYield;
                trace!(generator = self.id, "producer yielded");
                return Poll::Ready(Ok(true));
            }
            Ok(Poll::Pending) => {
                self.state = GeneratorState::SuspendedAwaitingExternal;
                return Poll::Pending;
            }
            Ok(Poll::Ready(Ok(()))) => Ok(false),
            Ok(Poll::Ready(Err(err))) => Err(GeneratorError::Body(err)),
            Err(payload) => Err(GeneratorError::Panicked(panic_message(payload.as_ref()))),
        };

        self.state = match outcome {
            Ok(_) => GeneratorState::Finished,
            Err(_) => GeneratorState::FinishedWithError,
        };
        self.frame = None;
        self.handoff.clear();
        debug!(generator = self.id, state = ?self.state, "producer finished");

        Poll::Ready(outcome)
    }

    fn poll_next_value(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<T, GeneratorError<E>>>> {
        let step = ready!(self.poll_resume(cx));

        Poll::Ready(match step {
            Ok(true) => self.handoff.take().map(Ok),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        })
    }
}

impl<T, E> Drop for AsyncGenerator<T, E> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            trace!(generator = self.id, state = ?self.state, "destroying producer frame");
            drop(frame);
        }
    }
}

impl<T, E> fmt::Debug for AsyncGenerator<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncGenerator")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

/// Future returned by [`AsyncGenerator::next`].
#[must_use = "futures do nothing unless awaited"]
pub struct Next<'g, T, E> {
    generator: &'g mut AsyncGenerator<T, E>,
}

impl<T, E> Future for Next<'_, T, E> {
    type Output = Option<Result<T, GeneratorError<E>>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().generator.poll_next_value(cx)
    }
}

impl<T, E> Stream for AsyncGenerator<T, E> {
    type Item = Result<T, GeneratorError<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_next_value(cx)
    }
}

/// Iterates an [`AsyncGenerator`] inside an async body.
///
/// Each element is moved out of the generator and bound to the pattern.
/// The expression evaluates to `Result<(), GeneratorError<E>>`: `Err`
/// if the producer failed, `Ok` once it finished or the body `break`s.
///
/// # Examples
///
/// ```rust,ignore
/// let mut sum = 0;
/// async_for!(n in numbers => {
///     sum += n;
/// })?;
/// ```
#[macro_export]
macro_rules! async_for {
    ($item:pat in $generator:expr => $body:block) => {{
        let generator = &mut $generator;
        let end = generator.end();

        match generator.begin().await {
            ::std::result::Result::Err(err) => ::std::result::Result::Err(err),
            ::std::result::Result::Ok(mut it) => {
                let mut outcome = ::std::result::Result::Ok(());

                while it != end {
                    if let ::std::option::Option::Some($item) = it.take() $body

                    if let ::std::result::Result::Err(err) = it.advance().await {
                        outcome = ::std::result::Result::Err(err);
                        break;
                    }
                }

                outcome
            }
        }
    }};
}
