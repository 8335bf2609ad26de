use super::context::{self, enter_context};
use super::injector::{Injector, InjectorHandle};
use super::timer::{TimerAction, TimerHandle, TimerQueue};
use super::waker::{WakeHandle, make_waker};
use crate::error::TaskError;
use crate::task::Task;
use crate::utils::Slab;

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::task::Waker;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

/// A frame the loop can resume and destroy.
///
/// The trait erases the output type of a frame so the loop can keep a
/// heterogeneous table of them.
pub(crate) trait Runnable {
    /// Resumes the frame once.
    fn run(self: Rc<Self>);

    /// Destroys the frame if it has not finished yet.
    fn cancel(&self);
}

/// Loop tuning, set through [`RuntimeBuilder`](super::builder::RuntimeBuilder).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Config {
    /// Ready frames resumed per turn before timers are serviced.
    pub(crate) event_budget: usize,

    /// Longest single park of an idle loop.
    pub(crate) max_park: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            event_budget: 64,
            max_park: Duration::from_millis(100),
        }
    }
}

/// A frame known to the loop.
struct FrameEntry {
    frame: Weak<dyn Runnable>,
    wake: Arc<WakeHandle>,
}

/// What a frame receives when it registers with the loop.
pub(crate) struct Registration {
    /// Key of the frame in the loop's frame table.
    pub(crate) id: usize,

    /// Waker that schedules the frame.
    pub(crate) waker: Waker,

    /// The loop the frame belongs to.
    pub(crate) core: Weak<Core>,
}

/// The single-threaded event loop.
///
/// The loop owns no frame it did not adopt: started tasks are referenced
/// weakly and stay alive through their [`Task`] handle, while detached
/// tasks are owned here until they finish.
pub(crate) struct Core {
    config: Config,

    /// Ids of frames woken since they last ran.
    injector: InjectorHandle,

    /// Every started, unfinished frame.
    frames: RefCell<Slab<FrameEntry>>,

    /// Frames whose handle was given up; the loop keeps them alive.
    detached: RefCell<HashMap<usize, Rc<dyn Runnable>>>,

    timers: RefCell<TimerQueue>,
}

impl Core {
    pub(crate) fn new(config: Config) -> Self {
        Self {
            config,
            injector: Arc::new(Injector::new()),
            frames: RefCell::new(Slab::new()),
            detached: RefCell::new(HashMap::new()),
            timers: RefCell::new(TimerQueue::new()),
        }
    }

    /// Adds a started frame to the frame table.
    pub(crate) fn register(self: &Rc<Self>, frame: Weak<dyn Runnable>) -> Registration {
        let mut frames = self.frames.borrow_mut();

        let wake = Arc::new(WakeHandle::new(frames.vacant_key(), self.injector.clone()));
        let id = frames.insert(FrameEntry {
            frame,
            wake: wake.clone(),
        });

        trace!(frame = id, "frame registered");

        Registration {
            id,
            waker: make_waker(wake),
            core: Rc::downgrade(self),
        }
    }

    /// Removes a finished or destroyed frame from the frame table.
    pub(crate) fn deregister(&self, id: usize) {
        if self.frames.borrow_mut().remove(id).is_some() {
            trace!(frame = id, "frame deregistered");
        }
    }

    /// Hands ownership of a running frame to the loop.
    pub(crate) fn adopt(&self, id: usize, frame: Rc<dyn Runnable>) {
        self.detached.borrow_mut().insert(id, frame);
    }

    /// Drops the loop's ownership of a frame, if it had any.
    ///
    /// The frame is returned rather than dropped so that the caller
    /// controls when its destructor runs.
    pub(crate) fn release(&self, id: usize) -> Option<Rc<dyn Runnable>> {
        self.detached.borrow_mut().remove(&id)
    }

    /// Schedules `action` to run at `deadline`.
    pub(crate) fn schedule(&self, deadline: Instant, action: TimerAction) -> TimerHandle {
        self.timers.borrow_mut().insert(deadline, action)
    }

    /// Runs `future` to completion on this loop.
    ///
    /// # Panics
    ///
    /// Panics if called while a frame is being polled on this thread, or
    /// if the future itself panics.
    pub(crate) fn block_on<F>(self: &Rc<Self>, future: F) -> F::Output
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        assert!(
            !context::is_polling(),
            "block_on called from within a running task; await the future instead"
        );

        match Task::new(future).run_to_completion(self) {
            Ok(value) => value,
            Err(TaskError::Panicked(message)) => panic!("{message}"),
            Err(TaskError::BrokenPromise) => {
                panic!("block_on future was destroyed before it completed")
            }
        }
    }

    /// Drives the loop on the current thread until `done` returns `true`.
    pub(crate) fn run_until(self: &Rc<Self>, mut done: impl FnMut() -> bool) {
        enter_context(self.clone(), || {
            while !done() {
                let progressed = self.turn();

                if done() {
                    break;
                }

                if !progressed {
                    self.park();
                }
            }
        });
    }

    /// Performs one loop iteration: resumes ready frames up to the event
    /// budget, then fires expired timers.
    ///
    /// Returns `true` if anything ran.
    fn turn(&self) -> bool {
        let mut progressed = false;

        for _ in 0..self.config.event_budget {
            let Some(id) = self.injector.pop() else {
                break;
            };

            progressed = true;
            self.resume(id);
        }

        let now = Instant::now();
        loop {
            let expired = self.timers.borrow_mut().pop_expired(now);
            let Some(timer) = expired else {
                break;
            };

            progressed = true;
            timer.fire();
        }

        progressed
    }

    /// Resumes the frame registered under `id`, if it still exists.
    fn resume(&self, id: usize) {
        let frame = {
            let frames = self.frames.borrow();
            frames.get(id).and_then(|entry| {
                entry.wake.clear();
                entry.frame.upgrade()
            })
        };

        match frame {
            Some(frame) => frame.run(),
            None => trace!(frame = id, "stale wake ignored"),
        }
    }

    /// Parks until the next timer deadline, a wake, or `max_park`.
    fn park(&self) {
        let now = Instant::now();
        let (next, queued) = {
            let mut timers = self.timers.borrow_mut();
            (timers.next_deadline(), timers.len())
        };
        let timeout = match next {
            Some(deadline) => deadline.saturating_duration_since(now).min(self.config.max_park),
            None => self.config.max_park,
        };

        if !timeout.is_zero() {
            trace!(?timeout, timers = queued, "loop parked");
            self.injector.park(timeout);
        }
    }

    /// Destroys every frame the loop owns and discards pending timers.
    fn shutdown(&self) {
        let detached: Vec<_> = self.detached.borrow_mut().drain().map(|(_, frame)| frame).collect();

        if !detached.is_empty() {
            warn!(count = detached.len(), "destroying unfinished detached tasks");
        }

        for frame in &detached {
            frame.cancel();
        }
        drop(detached);

        let timers = self.timers.borrow_mut().clear();
        debug!(
            timers = timers.len(),
            frames = self.frames.borrow().len(),
            "event loop shut down"
        );
    }
}

/// The main runtime handle.
///
/// `Runtime` owns a single-threaded event loop. It is responsible for:
/// - driving frames when they are woken,
/// - firing timers,
/// - providing a synchronous entry point via [`block_on`](Self::block_on).
///
/// A runtime is bound to the thread that built it. Dropping it destroys
/// detached tasks that have not finished; their continuations observe
/// [`TaskError::BrokenPromise`].
pub struct Runtime {
    core: Rc<Core>,
}

impl Runtime {
    pub(crate) fn new(config: Config) -> Self {
        debug!(?config, "event loop created");

        Self {
            core: Rc::new(Core::new(config)),
        }
    }

    pub(crate) fn core(&self) -> &Rc<Core> {
        &self.core
    }

    /// Starts `future` as an eager task on this runtime.
    ///
    /// The body runs synchronously until its first suspension point
    /// before this method returns.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let task = runtime.spawn(async { 42 });
    /// assert_eq!(runtime.block_on(task), Ok(42));
    /// ```
    pub fn spawn<F>(&self, future: F) -> Task<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        enter_context(self.core.clone(), || Task::spawn(future))
    }

    /// Runs a future to completion, blocking the current thread.
    ///
    /// This method is typically used as the synchronous entry point
    /// of the runtime (e.g. in `main` or tests).
    ///
    /// # Panics
    ///
    /// Panics if called from inside a task body, or if the future
    /// panics; the panic message is preserved.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let result = runtime.block_on(async {
    ///     42
    /// });
    /// assert_eq!(result, 42);
    /// ```
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        self.core.block_on(future)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.core.shutdown();
    }
}

impl Default for Runtime {
    fn default() -> Self {
        super::builder::RuntimeBuilder::new().build()
    }
}
