use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{self, AtomicBool};
use std::task::Waker;
use std::time::Instant;

use tracing::trace;

/// What happens when a timer fires.
pub(crate) enum TimerAction {
    /// Wake a suspended frame.
    Wake(Waker),

    /// Run a callback on the loop thread.
    Call(Box<dyn FnOnce()>),
}

impl TimerAction {
    fn fire(self) {
        match self {
            TimerAction::Wake(waker) => waker.wake(),
            TimerAction::Call(callback) => callback(),
        }
    }
}

/// Handle to a scheduled timer.
///
/// Cancelling is idempotent; a cancelled entry stays in the queue until
/// its deadline and is discarded instead of fired.
#[derive(Debug, Clone)]
pub(crate) struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    /// Prevents the timer from firing.
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, atomic::Ordering::Release);
    }

    /// Returns `true` if the timer was cancelled or already fired.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(atomic::Ordering::Acquire)
    }
}

/// An entry in the loop timer queue.
struct TimerEntry {
    /// The time at which the timer should fire.
    deadline: Instant,

    /// Insertion order, so entries sharing a deadline fire in FIFO order.
    seq: u64,

    action: TimerAction,

    /// Cancellation flag shared with the [`TimerHandle`].
    cancelled: Arc<AtomicBool>,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for TimerEntry {
    /// Reversed so that a `BinaryHeap<TimerEntry>` pops the earliest
    /// deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Queue size below which cancelled entries are left for `pop_expired`.
const PURGE_THRESHOLD: usize = 64;

/// Min-heap of pending timers.
///
/// Cancelled entries are dropped lazily when they reach the top, and in
/// bulk whenever the heap doubles past its size after the last purge.
pub(crate) struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
    next_seq: u64,

    /// Heap size that triggers the next purge.
    purge_at: usize,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            purge_at: PURGE_THRESHOLD,
        }
    }

    /// Schedules `action` to run at `deadline`.
    pub(crate) fn insert(&mut self, deadline: Instant, action: TimerAction) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let seq = self.next_seq;
        self.next_seq += 1;

        self.heap.push(TimerEntry {
            deadline,
            seq,
            action,
            cancelled: cancelled.clone(),
        });

        if self.heap.len() >= self.purge_at {
            self.purge();
        }

        TimerHandle { cancelled }
    }

    /// Drops every cancelled entry, releasing the wakers and callbacks
    /// they hold.
    fn purge(&mut self) {
        let before = self.heap.len();
        self.heap
            .retain(|entry| !entry.cancelled.load(atomic::Ordering::Acquire));
        self.purge_at = (self.heap.len() * 2).max(PURGE_THRESHOLD);

        trace!(
            purged = before - self.heap.len(),
            live = self.heap.len(),
            "cancelled timers purged"
        );
    }

    /// Removes the earliest live timer whose deadline is at or before
    /// `now`, marking it as spent.
    ///
    /// Cancelled entries met on the way are discarded.
    pub(crate) fn pop_expired(&mut self, now: Instant) -> Option<ExpiredTimer> {
        while let Some(entry) = self.heap.peek() {
            if entry.deadline > now {
                return None;
            }

            let entry = self.heap.pop()?;
            if entry.cancelled.swap(true, atomic::Ordering::AcqRel) {
                continue;
            }

            return Some(ExpiredTimer(entry.action));
        }

        None
    }

    /// Returns the deadline of the earliest live timer.
    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(entry) = self.heap.peek() {
            if !entry.cancelled.load(atomic::Ordering::Acquire) {
                return Some(entry.deadline);
            }
            self.heap.pop();
        }

        None
    }

    /// Number of entries still queued, cancelled ones included.
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    /// Drops every pending entry without firing it.
    pub(crate) fn clear(&mut self) -> Vec<TimerAction> {
        self.heap.drain().map(|entry| entry.action).collect()
    }
}

/// A timer taken out of the queue, ready to fire.
///
/// Firing is split from popping so the queue is not borrowed while the
/// action runs; actions are free to schedule new timers.
pub(crate) struct ExpiredTimer(TimerAction);

impl ExpiredTimer {
    pub(crate) fn fire(self) {
        self.0.fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn record(log: &Rc<RefCell<Vec<u32>>>, value: u32) -> TimerAction {
        let log = log.clone();
        TimerAction::Call(Box::new(move || log.borrow_mut().push(value)))
    }

    #[test]
    fn earliest_deadline_fires_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = TimerQueue::new();
        let now = Instant::now();

        queue.insert(now + Duration::from_millis(20), record(&log, 2));
        queue.insert(now + Duration::from_millis(10), record(&log, 1));
        queue.insert(now + Duration::from_millis(10), record(&log, 3));

        let later = now + Duration::from_millis(30);
        while let Some(timer) = queue.pop_expired(later) {
            timer.fire();
        }

        assert_eq!(*log.borrow(), vec![1, 3, 2]);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = TimerQueue::new();
        let now = Instant::now();

        let handle = queue.insert(now, record(&log, 1));
        handle.cancel();

        assert!(queue.pop_expired(now).is_none());
        assert!(queue.next_deadline().is_none());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn cancelled_timers_are_purged_as_the_queue_grows() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = TimerQueue::new();
        let far = Instant::now() + Duration::from_secs(30);

        let live = queue.insert(far, record(&log, 0));
        for n in 1..200 {
            queue.insert(far, record(&log, n)).cancel();
        }

        assert!(queue.len() < PURGE_THRESHOLD * 2);
        assert!(!live.is_cancelled());
        assert_eq!(queue.next_deadline(), Some(far));

        while let Some(timer) = queue.pop_expired(far) {
            timer.fire();
        }
        assert_eq!(*log.borrow(), vec![0]);
    }

    #[test]
    fn future_deadlines_stay_queued() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = TimerQueue::new();
        let now = Instant::now();
        let deadline = now + Duration::from_secs(60);

        let handle = queue.insert(deadline, record(&log, 1));

        assert!(queue.pop_expired(now).is_none());
        assert_eq!(queue.next_deadline(), Some(deadline));
        assert!(!handle.is_cancelled());
    }
}
