use super::state::TaskState;
use crate::error::{TaskError, panic_message};
use crate::runtime::context::PollGuard;
use crate::runtime::core::{Core, Registration, Runnable};

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use tracing::{debug, trace};

/// The boxed frame of a task.
///
/// The output is already a `Result` so that combinators can forward the
/// error of an inner task unchanged.
pub(crate) type Frame<T> = Pin<Box<dyn Future<Output = Result<T, TaskError>>>>;

/// Callback invoked with the result of a task instead of storing it.
pub(crate) type Continuation<T> = Box<dyn FnOnce(Result<T, TaskError>)>;

/// Shared state of one task.
///
/// The [`Task`](super::Task) handle and the event loop both point at the
/// cell: the handle strongly, the loop weakly unless the task was
/// detached. Everything lives on the loop thread, so plain `Cell` and
/// `RefCell` are enough.
pub(crate) struct TaskCell<T> {
    state: Cell<TaskState>,

    /// The frame; `None` once finished or destroyed.
    frame: RefCell<Option<Frame<T>>>,

    /// Result waiting to be picked up by the awaiting consumer.
    result: RefCell<Option<Result<T, TaskError>>>,

    /// Waker of the consumer awaiting the result.
    waiter: RefCell<Option<Waker>>,

    /// Consumer callback, when the result is delivered by continuation.
    continuation: RefCell<Option<Continuation<T>>>,

    /// Set once the frame is started on a loop.
    registration: RefCell<Option<Registration>>,

    /// Cancellation requested while the frame was being polled.
    cancel_requested: Cell<bool>,
}

impl<T: 'static> TaskCell<T> {
    pub(crate) fn new(frame: Frame<T>) -> Self {
        Self {
            state: Cell::new(TaskState::NotStarted),
            frame: RefCell::new(Some(frame)),
            result: RefCell::new(None),
            waiter: RefCell::new(None),
            continuation: RefCell::new(None),
            registration: RefCell::new(None),
            cancel_requested: Cell::new(false),
        }
    }

    /// A cell that finished before it was ever started.
    pub(crate) fn ready(value: T) -> Self {
        Self {
            state: Cell::new(TaskState::Completed),
            frame: RefCell::new(None),
            result: RefCell::new(Some(Ok(value))),
            waiter: RefCell::new(None),
            continuation: RefCell::new(None),
            registration: RefCell::new(None),
            cancel_requested: Cell::new(false),
        }
    }

    /// Registers the frame with `core` and runs it up to its first
    /// suspension point. Does nothing if the frame already started.
    pub(crate) fn start(self: &Rc<Self>, core: &Rc<Core>) {
        if self.state.get() != TaskState::NotStarted {
            return;
        }

        let frame: Weak<dyn Runnable> = Rc::downgrade(self) as Weak<dyn Runnable>;
        let registration = core.register(frame);
        debug!(frame = registration.id, "task started");

        *self.registration.borrow_mut() = Some(registration);
        self.clone().run();
    }
}

impl<T> TaskCell<T> {
    pub(crate) fn state(&self) -> TaskState {
        self.state.get()
    }

    /// Key of the frame in its loop, once started.
    pub(crate) fn frame_id(&self) -> Option<usize> {
        self.registration.borrow().as_ref().map(|r| r.id)
    }

    /// The loop the frame was started on, if it is still alive.
    pub(crate) fn core(&self) -> Option<Rc<Core>> {
        self.registration
            .borrow()
            .as_ref()
            .and_then(|r| r.core.upgrade())
    }

    pub(crate) fn take_result(&self) -> Option<Result<T, TaskError>> {
        self.result.borrow_mut().take()
    }

    pub(crate) fn set_waiter(&self, waker: &Waker) {
        let mut waiter = self.waiter.borrow_mut();

        match waiter.as_ref() {
            Some(current) if current.will_wake(waker) => {}
            _ => *waiter = Some(waker.clone()),
        }
    }

    pub(crate) fn set_continuation(&self, continuation: Continuation<T>) {
        *self.continuation.borrow_mut() = Some(continuation);
    }

    /// Hands the result to the continuation, or stores it and wakes the
    /// awaiting consumer.
    fn deliver(&self, result: Result<T, TaskError>) {
        let continuation = self.continuation.borrow_mut().take();

        match continuation {
            Some(continuation) => continuation(result),
            None => {
                *self.result.borrow_mut() = Some(result);

                let waiter = self.waiter.borrow_mut().take();
                if let Some(waiter) = waiter {
                    waiter.wake();
                }
            }
        }
    }

    /// Removes the frame from its loop.
    ///
    /// Returns the loop's owning reference, if the task was detached, so
    /// the caller decides when it is dropped.
    fn unregister(&self) -> Option<Rc<dyn Runnable>> {
        let registration = self.registration.borrow_mut().take()?;
        let core = registration.core.upgrade()?;

        core.deregister(registration.id);
        core.release(registration.id)
    }

    fn finish(&self, result: Result<T, TaskError>) {
        let state = self.state.get();
        let owned = self.unregister();
        debug!(?state, "task finished");

        self.deliver(result);
        drop(owned);
    }

    /// Destroys the frame and reports [`TaskError::BrokenPromise`].
    ///
    /// Deferred until the current poll returns if the frame is being
    /// polled.
    pub(crate) fn cancel(&self) {
        if self.state.get().is_terminal() {
            return;
        }

        let Ok(mut slot) = self.frame.try_borrow_mut() else {
            self.cancel_requested.set(true);
            return;
        };

        let frame = slot.take();
        drop(slot);

        self.state.set(TaskState::Cancelled);
        let owned = self.unregister();
        debug!("task cancelled");

        // Unwinds the frame's locals; in-flight adapters disconnect here.
        drop(frame);

        self.deliver(Err(TaskError::BrokenPromise));
        drop(owned);
    }
}

impl<T: 'static> Runnable for TaskCell<T> {
    fn run(self: Rc<Self>) {
        if self.state.get().is_terminal() {
            return;
        }

        let Some(waker) = self.registration.borrow().as_ref().map(|r| r.waker.clone()) else {
            return;
        };

        let Ok(mut slot) = self.frame.try_borrow_mut() else {
            trace!("frame already being polled");
            return;
        };

        let Some(frame) = slot.as_mut() else {
            return;
        };

        self.state.set(TaskState::Running);
        trace!("polling frame");

        let poll = {
            let _polling = PollGuard::enter();
            let mut cx = Context::from_waker(&waker);
            panic::catch_unwind(AssertUnwindSafe(|| frame.as_mut().poll(&mut cx)))
        };

        let result = match poll {
            Ok(Poll::Pending) => {
                self.state.set(TaskState::Suspended);
                drop(slot);

                if self.cancel_requested.get() {
                    TaskCell::cancel(&self);
                }
                return;
            }
            Ok(Poll::Ready(result)) => result,
            Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
        };

        let finished = slot.take();
        drop(slot);

        // Terminal before the frame's locals are dropped, so a destructor
        // that reaches back into this task sees it finished.
        self.state.set(match &result {
            Ok(_) => TaskState::Completed,
            Err(_) => TaskState::Failed,
        });
        drop(finished);

        self.finish(result);
    }

    fn cancel(&self) {
        TaskCell::cancel(self);
    }
}
