use super::signal::{CloseReason, Control, Receiver, Signal, WeakSignal};
use crate::error::WaitError;
use crate::generator::AsyncGenerator;
use crate::time::{Sleep, sleep};

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use tracing::debug;

/// Emissions received but not consumed yet.
struct Buffer<A> {
    items: RefCell<VecDeque<A>>,
    ended: Cell<Option<CloseReason>>,
    waker: RefCell<Option<Waker>>,
}

impl<A> Buffer<A> {
    fn wake(&self) {
        let waker = self.waker.borrow_mut().take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

struct BufferReceiver<A> {
    buffer: Rc<Buffer<A>>,
}

impl<A: Clone> Receiver<A> for BufferReceiver<A> {
    fn on_emit(&mut self, args: &A) -> Control {
        self.buffer.items.borrow_mut().push_back(args.clone());
        self.buffer.wake();

        Control::Keep
    }

    fn on_close(self: Box<Self>, reason: CloseReason) {
        self.buffer.ended.set(Some(reason));
        self.buffer.wake();
    }
}

/// Disconnects the buffering receiver when the producer frame goes away.
struct Subscription<A> {
    source: WeakSignal<A>,
    key: Option<u64>,
}

impl<A> Drop for Subscription<A> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.source.disconnect(key);
        }
    }
}

/// Resolves to the oldest buffered emission, the end of the source, or a
/// timeout.
struct NextEmission<'a, A> {
    buffer: &'a Buffer<A>,
    deadline: Option<Sleep>,
}

impl<A> Future for NextEmission<'_, A> {
    type Output = Result<A, WaitError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(args) = this.buffer.items.borrow_mut().pop_front() {
            return Poll::Ready(Ok(args));
        }

        if let Some(reason) = this.buffer.ended.get() {
            return Poll::Ready(Err(reason.into()));
        }

        *this.buffer.waker.borrow_mut() = Some(cx.waker().clone());

        if let Some(deadline) = this.deadline.as_mut() {
            if Pin::new(deadline).poll(cx).is_ready() {
                return Poll::Ready(Err(WaitError::TimedOut));
            }
        }

        Poll::Pending
    }
}

/// Returns a generator yielding every emission of `signal`, in order.
///
/// The generator subscribes immediately; emissions arriving while the
/// consumer is busy, or before the first `begin`, are buffered. Buffered
/// emissions are drained before the end of the source is reported.
///
/// The buffer is unbounded. A generator that is kept but never advanced
/// holds a copy of every emission until it is dropped, which also
/// disconnects it from the signal.
///
/// The sequence ends cleanly when the signal is closed or dropped. With
/// a `timeout`, a wait longer than `timeout` for the next emission
/// finishes the generator with `GeneratorError::Body(WaitError::TimedOut)`.
///
/// # Examples
///
/// ```rust,ignore
/// let mut lines = make_generator_awaiter(&socket.ready_read, None);
/// while let Some(Ok(line)) = lines.next().await {
///     println!("{line}");
/// }
/// ```
pub fn make_generator_awaiter<A>(
    signal: &Signal<A>,
    timeout: Option<Duration>,
) -> AsyncGenerator<A, WaitError>
where
    A: Clone + 'static,
{
    let buffer = Rc::new(Buffer {
        items: RefCell::new(VecDeque::new()),
        ended: Cell::new(None),
        waker: RefCell::new(None),
    });

    let key = signal.connect_receiver(Box::new(BufferReceiver {
        buffer: buffer.clone(),
    }));
    if key.is_none() {
        buffer.ended.set(Some(CloseReason::Closed));
    }

    let subscription = Subscription {
        source: signal.downgrade(),
        key,
    };

    AsyncGenerator::try_new(move |co| async move {
        let _subscription = subscription;

        loop {
            let next = NextEmission {
                buffer: &buffer,
                deadline: timeout.map(sleep),
            };

            match next.await {
                Ok(args) => {
                    co.yield_(args).await;
                }
                Err(WaitError::TimedOut) => {
                    debug!(?timeout, "signal listener timed out");
                    return Err(WaitError::TimedOut);
                }
                Err(reason) => {
                    debug!(%reason, "signal listener finished");
                    return Ok(());
                }
            }
        }
    })
}
