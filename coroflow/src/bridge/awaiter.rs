use super::signal::{CloseReason, Control, Receiver, Signal, WeakSignal};
use crate::error::WaitError;
use crate::runtime::context;
use crate::runtime::timer::{TimerAction, TimerHandle};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

/// How a [`SignalAwaiter`] resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The signal emitted.
    Emitted,

    /// The timeout elapsed first.
    TimedOut,

    /// The signal was closed first.
    SourceClosed,

    /// The signal was dropped first, or was already gone.
    SourceDestroyed,
}

impl From<WaitError> for Outcome {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::TimedOut => Outcome::TimedOut,
            WaitError::SourceClosed => Outcome::SourceClosed,
            WaitError::SourceDestroyed => Outcome::SourceDestroyed,
        }
    }
}

impl From<CloseReason> for WaitError {
    fn from(reason: CloseReason) -> Self {
        match reason {
            CloseReason::Closed => WaitError::SourceClosed,
            CloseReason::Destroyed => WaitError::SourceDestroyed,
        }
    }
}

/// State shared by an awaiter, its signal receiver and its timer.
///
/// Whichever trigger swaps `resolved` first stores the result, disarms
/// the other triggers and wakes the awaiting frame; later triggers are
/// ignored.
struct Pending<A> {
    resolved: AtomicBool,
    result: RefCell<Option<Result<A, WaitError>>>,
    waker: RefCell<Option<Waker>>,

    source: WeakSignal<A>,

    /// Key of the receiver while it is connected.
    connection: Cell<Option<u64>>,

    timer: RefCell<Option<TimerHandle>>,
}

impl<A> Pending<A> {
    fn resolve(&self, result: Result<A, WaitError>) -> bool {
        if self.resolved.swap(true, Ordering::AcqRel) {
            trace!("late trigger ignored");
            return false;
        }

        self.disarm();
        *self.result.borrow_mut() = Some(result);

        let waker = self.waker.borrow_mut().take();
        if let Some(waker) = waker {
            waker.wake();
        }

        true
    }

    /// Disconnects the receiver and cancels the timer, whichever are
    /// still armed.
    fn disarm(&self) {
        if let Some(key) = self.connection.take() {
            self.source.disconnect(key);
        }

        let timer = self.timer.borrow_mut().take();
        if let Some(timer) = timer {
            timer.cancel();
        }
    }
}

struct AwaitReceiver<A> {
    pending: Rc<Pending<A>>,
}

impl<A: Clone> Receiver<A> for AwaitReceiver<A> {
    fn on_emit(&mut self, args: &A) -> Control {
        // The signal drops this receiver itself.
        self.pending.connection.set(None);
        self.pending.resolve(Ok(args.clone()));

        Control::Disconnect
    }

    fn on_close(self: Box<Self>, reason: CloseReason) {
        self.pending.connection.set(None);
        self.pending.resolve(Err(reason.into()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Waiting,
    Done,
}

/// Awaits the next emission of a [`Signal`].
///
/// Built by [`make_awaiter`]. Resolves to `Some(args)` on emission and to
/// `None` if the timeout elapses or the signal is closed or dropped
/// first; [`outcome`](Self::outcome) tells which. Use
/// [`into_result`](Self::into_result) to get a [`WaitError`] instead.
///
/// Dropping the awaiter before it resolves disconnects it from the
/// signal and cancels its timer.
pub struct SignalAwaiter<A> {
    pending: Rc<Pending<A>>,
    timeout: Option<Duration>,
    stage: Stage,
    suspended: bool,
    outcome: Option<Outcome>,
}

impl<A: Clone + 'static> SignalAwaiter<A> {
    /// Creates an awaiter for the next emission of the signal behind
    /// `source`.
    pub fn new(source: WeakSignal<A>, timeout: Option<Duration>) -> Self {
        Self {
            pending: Rc::new(Pending {
                resolved: AtomicBool::new(false),
                result: RefCell::new(None),
                waker: RefCell::new(None),
                source,
                connection: Cell::new(None),
                timer: RefCell::new(None),
            }),
            timeout,
            stage: Stage::Idle,
            suspended: false,
            outcome: None,
        }
    }

    /// Returns `true` if awaiting would resolve without suspending.
    ///
    /// That is the case when the signal is already closed or gone.
    pub fn ready(&self) -> bool {
        self.stage == Stage::Done || !self.pending.source.is_alive()
    }

    /// Returns `true` if the awaiting frame had to suspend.
    pub fn did_suspend(&self) -> bool {
        self.suspended
    }

    /// How the awaiter resolved, once it has.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Turns the awaiter into a future reporting why no value arrived.
    pub fn into_result(self) -> IntoResult<A> {
        IntoResult { awaiter: self }
    }

    fn complete(&mut self, result: Result<A, WaitError>) -> Poll<Result<A, WaitError>> {
        let outcome = match &result {
            Ok(_) => Outcome::Emitted,
            Err(err) => Outcome::from(*err),
        };

        self.stage = Stage::Done;
        self.outcome = Some(outcome);
        debug!(?outcome, suspended = self.suspended, "signal awaiter resolved");

        Poll::Ready(result)
    }

    /// Connects to the signal and arms the timer.
    fn suspend(&mut self, cx: &mut Context<'_>) {
        *self.pending.waker.borrow_mut() = Some(cx.waker().clone());

        let receiver = Box::new(AwaitReceiver {
            pending: self.pending.clone(),
        });

        match self.pending.source.connect_receiver(receiver) {
            Some(key) => self.pending.connection.set(Some(key)),
            None => {
                let reason = self.pending.source.close_reason();
                let err = reason.map_or(WaitError::SourceDestroyed, WaitError::from);
                self.pending.resolve(Err(err));
                return;
            }
        }

        if let Some(timeout) = self.timeout {
            let pending = Rc::downgrade(&self.pending);
            let deadline = Instant::now() + timeout;

            let handle = context::with_current("a signal timeout", |core| {
                core.schedule(
                    deadline,
                    TimerAction::Call(Box::new(move || {
                        if let Some(pending) = pending.upgrade() {
                            pending.resolve(Err(WaitError::TimedOut));
                        }
                    })),
                )
            });

            *self.pending.timer.borrow_mut() = Some(handle);
        }

        self.stage = Stage::Waiting;
        self.suspended = true;
    }

    fn poll_outcome(&mut self, cx: &mut Context<'_>) -> Poll<Result<A, WaitError>> {
        match self.stage {
            Stage::Done => panic!("SignalAwaiter polled after completion"),
            Stage::Idle => {
                if let Some(reason) = self.pending.source.close_reason() {
                    self.pending.resolved.store(true, Ordering::Release);
                    return self.complete(Err(reason.into()));
                }

                self.suspend(cx);
            }
            Stage::Waiting => {
                let mut waker = self.pending.waker.borrow_mut();
                match waker.as_ref() {
                    Some(current) if current.will_wake(cx.waker()) => {}
                    _ => *waker = Some(cx.waker().clone()),
                }
            }
        }

        let result = self.pending.result.borrow_mut().take();
        match result {
            Some(result) => self.complete(result),
            None => Poll::Pending,
        }
    }
}

impl<A: Clone + 'static> Future for SignalAwaiter<A> {
    type Output = Option<A>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().poll_outcome(cx).map(Result::ok)
    }
}

impl<A> Drop for SignalAwaiter<A> {
    fn drop(&mut self) {
        if self.stage == Stage::Waiting && !self.pending.resolved.swap(true, Ordering::AcqRel) {
            trace!("signal awaiter dropped while waiting");
            self.pending.disarm();
        }
    }
}

impl<A> fmt::Debug for SignalAwaiter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalAwaiter")
            .field("timeout", &self.timeout)
            .field("suspended", &self.suspended)
            .field("outcome", &self.outcome)
            .finish()
    }
}

/// Future returned by [`SignalAwaiter::into_result`].
#[must_use = "futures do nothing unless awaited"]
pub struct IntoResult<A> {
    awaiter: SignalAwaiter<A>,
}

impl<A> IntoResult<A> {
    /// How the inner awaiter resolved, once it has.
    pub fn outcome(&self) -> Option<Outcome> {
        self.awaiter.outcome
    }

    /// Returns `true` if the awaiting frame had to suspend.
    pub fn did_suspend(&self) -> bool {
        self.awaiter.suspended
    }
}

impl<A: Clone + 'static> Future for IntoResult<A> {
    type Output = Result<A, WaitError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().awaiter.poll_outcome(cx)
    }
}

/// Returns a future resolving to the next emission of `signal`.
///
/// With a `timeout`, the future resolves to `None` if nothing is emitted
/// in time. It also resolves to `None` if the signal is closed or
/// dropped while waiting, and without suspending if that already
/// happened.
///
/// # Panics
///
/// Awaiting with a timeout panics outside a running runtime.
///
/// # Examples
///
/// ```rust,ignore
/// let finished = make_awaiter(&process.finished, Some(Duration::from_secs(1)));
/// match finished.await {
///     Some(code) => println!("exited with {code}"),
///     None => println!("gave up"),
/// }
/// ```
pub fn make_awaiter<A>(signal: &Signal<A>, timeout: Option<Duration>) -> SignalAwaiter<A>
where
    A: Clone + 'static,
{
    SignalAwaiter::new(signal.downgrade(), timeout)
}
