use super::injector::InjectorHandle;

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{RawWaker, RawWakerVTable, Waker};

/// The wake target of one registered frame.
///
/// Every [`Waker`] handed to a frame points at one of these. Waking
/// pushes the frame id on the loop's ready queue, at most once until the
/// loop resumes the frame.
pub(crate) struct WakeHandle {
    /// Key of the frame in the loop's frame table.
    id: usize,

    /// Ready queue of the owning loop.
    injector: InjectorHandle,

    /// Set while the frame id sits in the ready queue.
    queued: AtomicBool,
}

impl WakeHandle {
    pub(crate) fn new(id: usize, injector: InjectorHandle) -> Self {
        Self {
            id,
            injector,
            queued: AtomicBool::new(false),
        }
    }

    /// Schedules the frame unless it is already queued.
    pub(crate) fn wake(&self) {
        if !self.queued.swap(true, Ordering::AcqRel) {
            self.injector.push(self.id);
        }
    }

    /// Marks the frame as dequeued so the next wake schedules it again.
    ///
    /// Must be called by the loop before the frame is resumed.
    pub(crate) fn clear(&self) {
        self.queued.store(false, Ordering::Release);
    }
}

static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, wake_raw, wake_by_ref_raw, drop_raw);

/// Creates a [`Waker`] that schedules the frame behind `handle`.
pub(crate) fn make_waker(handle: Arc<WakeHandle>) -> Waker {
    // SAFETY: the pointer comes from `Arc::into_raw` and every vtable
    // entry below keeps the reference count balanced.
    unsafe { Waker::from_raw(RawWaker::new(Arc::into_raw(handle) as *const (), &VTABLE)) }
}

fn clone_raw(ptr: *const ()) -> RawWaker {
    let arc = unsafe { Arc::from_raw(ptr as *const WakeHandle) };
    let cloned = arc.clone();
    mem::forget(arc);

    RawWaker::new(Arc::into_raw(cloned) as *const (), &VTABLE)
}

fn wake_raw(ptr: *const ()) {
    let arc = unsafe { Arc::from_raw(ptr as *const WakeHandle) };
    arc.wake();
}

fn wake_by_ref_raw(ptr: *const ()) {
    let arc = unsafe { Arc::from_raw(ptr as *const WakeHandle) };
    arc.wake();
    mem::forget(arc);
}

fn drop_raw(ptr: *const ()) {
    unsafe { drop(Arc::from_raw(ptr as *const WakeHandle)) };
}
