use super::core::Core;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

thread_local! {
    /// The event loop driving the current thread.
    ///
    /// Set while a loop runs so that frames, timers and adapters can
    /// reach it without explicit parameter passing.
    static CURRENT_CORE: RefCell<Option<Rc<Core>>> = const { RefCell::new(None) };

    /// Number of frames currently being polled on this thread.
    ///
    /// Non-zero means the caller is inside a task body, where blocking
    /// on the loop would deadlock.
    static POLL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Restores the previously installed loop when dropped.
struct ContextGuard(Option<Rc<Core>>);

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.0.take();
        CURRENT_CORE.with(|current| *current.borrow_mut() = previous);
    }
}

/// Installs `core` as the current loop for the duration of `f`.
///
/// The previous loop, if any, is restored afterwards, even if `f`
/// unwinds.
pub(crate) fn enter_context<R>(core: Rc<Core>, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_CORE.with(|current| current.borrow_mut().replace(core));
    let _guard = ContextGuard(previous);

    f()
}

/// Returns the loop driving the current thread, if any.
pub(crate) fn current() -> Option<Rc<Core>> {
    CURRENT_CORE.with(|current| current.borrow().clone())
}

/// Runs `f` against the current loop.
///
/// # Panics
///
/// Panics if no loop is running on this thread; `what` names the
/// operation in the panic message.
pub(crate) fn with_current<R>(what: &str, f: impl FnOnce(&Rc<Core>) -> R) -> R {
    let core = current().unwrap_or_else(|| panic!("{what} requires a running coroflow runtime"));
    f(&core)
}

/// Returns `true` while a frame is being polled on this thread.
pub(crate) fn is_polling() -> bool {
    POLL_DEPTH.with(|depth| depth.get() > 0)
}

/// Marks the current thread as polling a frame until dropped.
pub(crate) struct PollGuard(());

impl PollGuard {
    pub(crate) fn enter() -> Self {
        POLL_DEPTH.with(|depth| depth.set(depth.get() + 1));
        PollGuard(())
    }
}

impl Drop for PollGuard {
    fn drop(&mut self) {
        POLL_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}
