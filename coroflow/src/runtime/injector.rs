use parking_lot::Mutex;

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::Duration;

/// Shared handle to the ready queue of an event loop.
pub(crate) type InjectorHandle = Arc<Injector>;

/// Ready queue of an event loop.
///
/// Wakers push the id of the frame they belong to; the loop thread pops
/// ids and resumes the matching frame. Pushing is thread-safe so a waker
/// may be invoked from any thread, in which case the loop thread is
/// unparked.
pub(crate) struct Injector {
    /// Ids of frames ready to be resumed, in wake order.
    queue: Mutex<VecDeque<usize>>,

    /// Thread that drives the loop owning this queue.
    owner: Thread,
}

impl Injector {
    /// Creates an empty queue owned by the calling thread.
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            owner: thread::current(),
        }
    }

    /// Schedules the frame `id` and unparks the loop thread.
    pub(crate) fn push(&self, id: usize) {
        self.queue.lock().push_back(id);

        if thread::current().id() != self.owner.id() {
            self.owner.unpark();
        }
    }

    /// Takes the next ready frame id.
    pub(crate) fn pop(&self) -> Option<usize> {
        self.queue.lock().pop_front()
    }

    /// Returns `true` if no frame is waiting to be resumed.
    pub(crate) fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Parks the loop thread until a frame is scheduled or `timeout`
    /// elapses.
    ///
    /// Returns immediately if the queue is not empty. A wake that races
    /// with parking is not lost: `unpark` before `park_timeout` makes the
    /// latter return at once.
    pub(crate) fn park(&self, timeout: Duration) {
        if !self.is_empty() {
            return;
        }

        thread::park_timeout(timeout);
    }
}
