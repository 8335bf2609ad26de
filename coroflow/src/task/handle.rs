use super::core::TaskCell;
use super::state::TaskState;
use crate::error::TaskError;
use crate::runtime::Runtime;
use crate::runtime::context::{self, enter_context};
use crate::runtime::core::{Core, Runnable};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tracing::{error, warn};

/// A deferred computation producing a `T`.
///
/// A `Task` exclusively owns its frame. Awaiting it yields
/// `Result<T, TaskError>`; every other way of consuming the result
/// ([`attach_continuation`](Self::attach_continuation),
/// [`block_until_complete`](Self::block_until_complete),
/// [`detach`](Self::detach)) takes the task by value, so a result is
/// observed by exactly one consumer.
///
/// Dropping a task that has not finished destroys its frame on the spot:
/// the destructors of the body's locals run before `drop` returns.
///
/// # Examples
///
/// ```rust,ignore
/// let task = Task::spawn(async {
///     sleep(Duration::from_millis(10)).await;
///     42
/// });
///
/// assert_eq!(task.await, Ok(42));
/// ```
#[must_use = "dropping a Task destroys its frame; call `detach()` to let it run in the background"]
pub struct Task<T> {
    /// `None` once the result was taken or the cell was handed off.
    cell: Option<Rc<TaskCell<T>>>,
}

impl<T: 'static> Task<T> {
    /// Creates a lazy task.
    ///
    /// The body does not run until the task is awaited, started,
    /// attached to a continuation or blocked on.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = T> + 'static,
    {
        Self::from_frame(Box::pin(async move { Ok(future.await) }))
    }

    /// Creates a task and starts it on the current runtime.
    ///
    /// The body runs synchronously until its first suspension point.
    ///
    /// # Panics
    ///
    /// Panics if no runtime is running on this thread.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + 'static,
    {
        let task = Self::new(future);
        task.start();
        task
    }

    /// Creates a task that already holds `value`.
    pub fn ready(value: T) -> Self {
        Self {
            cell: Some(Rc::new(TaskCell::ready(value))),
        }
    }

    fn from_frame(frame: super::core::Frame<T>) -> Self {
        Self {
            cell: Some(Rc::new(TaskCell::new(frame))),
        }
    }

    fn cell(&self) -> &Rc<TaskCell<T>> {
        self.cell
            .as_ref()
            .expect("Task polled after its result was taken")
    }

    fn into_cell(mut self) -> Rc<TaskCell<T>> {
        self.cell
            .take()
            .expect("Task polled after its result was taken")
    }

    /// Starts a lazy task on the current runtime.
    ///
    /// Does nothing if the task already started.
    ///
    /// # Panics
    ///
    /// Panics if the task has not started and no runtime is running on
    /// this thread.
    pub fn start(&self) {
        let cell = self.cell();

        if cell.state() == TaskState::NotStarted {
            context::with_current("starting a Task", |core| cell.start(core));
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.cell
            .as_ref()
            .map_or(TaskState::Completed, |cell| cell.state())
    }

    /// Returns `true` if awaiting the task would not suspend.
    pub fn is_ready(&self) -> bool {
        self.state().is_terminal()
    }

    /// Destroys the frame if the task has not finished.
    ///
    /// Awaiting the task afterwards yields [`TaskError::BrokenPromise`].
    pub fn cancel(&self) {
        if let Some(cell) = &self.cell {
            cell.cancel();
        }
    }

    /// Delivers the result to `continuation` instead of a waiting
    /// consumer.
    ///
    /// If the task already finished, `continuation` runs immediately,
    /// before this method returns. Otherwise the task is started if
    /// needed and handed to the runtime, which keeps it alive until it
    /// finishes. If the runtime is dropped first, the continuation
    /// receives [`TaskError::BrokenPromise`].
    ///
    /// # Panics
    ///
    /// Panics if the task has not started and no runtime is running on
    /// this thread.
    pub fn attach_continuation<F>(self, continuation: F)
    where
        F: FnOnce(Result<T, TaskError>) + 'static,
    {
        let cell = self.into_cell();

        if cell.state().is_terminal() {
            if let Some(result) = cell.take_result() {
                continuation(result);
            }
            return;
        }

        cell.set_continuation(Box::new(continuation));

        if cell.state() == TaskState::NotStarted {
            context::with_current("attaching a continuation", |core| cell.start(core));
        }

        if cell.state().is_terminal() {
            return;
        }

        if let (Some(id), Some(core)) = (cell.frame_id(), cell.core()) {
            let frame: Rc<dyn Runnable> = cell;
            core.adopt(id, frame);
        }
    }

    /// Returns a lazy task resolving to `f` applied to this task's value.
    ///
    /// An error of this task is forwarded unchanged and `f` is not
    /// called.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let doubled = Task::spawn(async { 21 }).then(|n| n * 2);
    /// assert_eq!(doubled.await, Ok(42));
    /// ```
    pub fn then<R, F>(self, f: F) -> Task<R>
    where
        R: 'static,
        F: FnOnce(T) -> R + 'static,
    {
        Task::from_frame(Box::pin(async move {
            let value = self.await?;
            Ok(f(value))
        }))
    }

    /// Returns a lazy task that awaits the task produced by `f`.
    pub fn and_then<R, F>(self, f: F) -> Task<R>
    where
        R: 'static,
        F: FnOnce(T) -> Task<R> + 'static,
    {
        Task::from_frame(Box::pin(async move {
            let value = self.await?;
            f(value).await
        }))
    }

    /// Lets the task run to completion in the background.
    ///
    /// The result is discarded. A panic in the body is logged at `error`
    /// level, a destroyed frame at `warn` level.
    pub fn detach(self) {
        self.attach_continuation(|result| match result {
            Ok(_) => {}
            Err(TaskError::Panicked(message)) => {
                error!(%message, "detached task panicked");
            }
            Err(err) => warn!(%err, "detached task did not complete"),
        });
    }

    /// Drives the event loop on this thread until the task finishes and
    /// returns its result.
    ///
    /// The task runs on the loop it was started on, otherwise on the
    /// thread's current runtime. If there is neither, a default runtime
    /// is built for the duration of the call.
    ///
    /// # Panics
    ///
    /// Panics if called from inside a task body; await the task there
    /// instead.
    pub fn block_until_complete(self) -> Result<T, TaskError> {
        assert!(
            !context::is_polling(),
            "block_until_complete called from within a running task; await the task instead"
        );

        match self.cell().core().or_else(context::current) {
            Some(core) => self.run_to_completion(&core),
            None => {
                let runtime = Runtime::default();
                self.run_to_completion(runtime.core())
            }
        }
    }

    /// Starts the task on `core` if needed and drives `core` until the
    /// task finishes.
    pub(crate) fn run_to_completion(self, core: &Rc<Core>) -> Result<T, TaskError> {
        let cell = self.into_cell();

        if cell.state() == TaskState::NotStarted {
            enter_context(core.clone(), || cell.start(core));
        }

        core.run_until(|| cell.state().is_terminal());

        cell.take_result().unwrap_or(Err(TaskError::BrokenPromise))
    }
}

impl<T: 'static> Future for Task<T> {
    type Output = Result<T, TaskError>;

    /// Starts a lazy task inline, so a body that never suspends completes
    /// within this poll.
    ///
    /// # Panics
    ///
    /// Panics if polled again after returning `Ready`.
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let cell = self.cell();

        if cell.state() == TaskState::NotStarted {
            context::with_current("awaiting a Task", |core| cell.start(core));
        }

        if let Some(result) = cell.take_result() {
            self.cell = None;
            return Poll::Ready(result);
        }

        cell.set_waiter(cx.waker());
        Poll::Pending
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.take() {
            cell.cancel();
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("state", &self.cell.as_ref().map(|cell| cell.state()))
            .finish()
    }
}
