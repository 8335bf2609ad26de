use crate::bridge::{Operation, Signal};
use crate::runtime::context;
use crate::runtime::timer::{TimerAction, TimerHandle};

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use tracing::trace;

struct Inner {
    interval: Cell<Duration>,
    single_shot: Cell<bool>,
    armed: RefCell<Option<TimerHandle>>,
    timeout: Signal<()>,
}

impl Inner {
    fn arm(self: &Rc<Self>) {
        let weak: Weak<Inner> = Rc::downgrade(self);
        let deadline = Instant::now() + self.interval.get();

        let handle = context::with_current("starting a Timer", |core| {
            core.schedule(
                deadline,
                TimerAction::Call(Box::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.fire();
                    }
                })),
            )
        });

        let previous = self.armed.borrow_mut().replace(handle);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    fn fire(self: &Rc<Self>) {
        trace!(interval = ?self.interval.get(), "timer fired");

        // Re-armed before emitting so that a receiver calling `stop` wins.
        if self.single_shot.get() {
            self.armed.borrow_mut().take();
        } else {
            self.arm();
        }

        self.timeout.emit(());
    }

    fn disarm(&self) {
        let armed = self.armed.borrow_mut().take();
        if let Some(armed) = armed {
            armed.cancel();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// A timer emitting [`timeout`](Self::timeout) on the event loop.
///
/// Repeating by default; a single-shot timer becomes inactive after it
/// fires once. Dropping the timer stops it and reports the destruction
/// of its signal to anyone awaiting it.
///
/// # Examples
///
/// ```rust,ignore
/// let timer = Timer::single_shot(Duration::from_millis(20));
/// timer.start();
/// make_awaiter(timer.timeout(), None).await;
/// ```
pub struct Timer {
    inner: Rc<Inner>,
}

impl Timer {
    /// Creates a stopped, repeating timer.
    pub fn new(interval: Duration) -> Self {
        Self {
            inner: Rc::new(Inner {
                interval: Cell::new(interval),
                single_shot: Cell::new(false),
                armed: RefCell::new(None),
                timeout: Signal::new(),
            }),
        }
    }

    /// Creates a stopped timer that fires once per start.
    pub fn single_shot(interval: Duration) -> Self {
        let timer = Self::new(interval);
        timer.set_single_shot(true);
        timer
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval.get()
    }

    /// Changes the interval; takes effect on the next start or firing.
    pub fn set_interval(&self, interval: Duration) {
        self.inner.interval.set(interval);
    }

    pub fn is_single_shot(&self) -> bool {
        self.inner.single_shot.get()
    }

    pub fn set_single_shot(&self, single_shot: bool) {
        self.inner.single_shot.set(single_shot);
    }

    /// Starts the timer, restarting it if it is already active.
    ///
    /// # Panics
    ///
    /// Panics outside of a running runtime.
    pub fn start(&self) {
        self.inner.arm();
    }

    /// Stops the timer. Does nothing if it is not active.
    pub fn stop(&self) {
        self.inner.disarm();
    }

    /// Returns `true` while the timer is armed.
    pub fn is_active(&self) -> bool {
        self.inner
            .armed
            .borrow()
            .as_ref()
            .is_some_and(|handle| !handle.is_cancelled())
    }

    /// Emitted every time the timer fires.
    pub fn timeout(&self) -> &Signal<()> {
        &self.inner.timeout
    }
}

/// An inactive timer counts as completed.
impl Operation for Timer {
    type Args = ();
    type Output = ();

    fn is_result_available(&self) -> bool {
        !self.is_active()
    }

    fn completion(&self) -> &Signal<()> {
        self.timeout()
    }

    fn result(&self) -> Option<()> {
        Some(())
    }
}
