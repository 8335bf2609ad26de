use crate::bridge::{Operation, Signal};

use std::cell::RefCell;
use std::rc::Rc;

struct Inner<T> {
    value: RefCell<Option<T>>,
    finished: Signal<T>,
}

/// A result that some other part of the program provides later.
///
/// The pattern of pending replies and process exits: whoever holds a
/// clone may [`resolve`](Self::resolve) it once, which stores the value
/// and emits [`finished`](Self::finished). Clones share the same state;
/// when the last clone is dropped, pending awaiters observe the
/// destruction of the source.
pub struct Deferred<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Deferred<T> {
    /// Creates an unresolved `Deferred`.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                value: RefCell::new(None),
                finished: Signal::new(),
            }),
        }
    }

    /// Returns `true` once resolved.
    pub fn is_finished(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Emitted once with the value passed to [`resolve`](Self::resolve).
    pub fn finished(&self) -> &Signal<T> {
        &self.inner.finished
    }

    /// Gives up on the result; pending awaiters resolve as closed.
    pub fn abandon(&self) {
        self.inner.finished.close();
    }
}

impl<T: Clone> Deferred<T> {
    /// Stores `value` and emits `finished`.
    ///
    /// Returns `false`, leaving the first value in place, if already
    /// resolved.
    pub fn resolve(&self, value: T) -> bool {
        if self.is_finished() {
            return false;
        }

        *self.inner.value.borrow_mut() = Some(value.clone());
        self.inner.finished.emit(value);
        true
    }

    /// A copy of the value, once resolved.
    pub fn value(&self) -> Option<T> {
        self.inner.value.borrow().clone()
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Operation for Deferred<T> {
    type Args = T;
    type Output = T;

    fn is_result_available(&self) -> bool {
        self.is_finished()
    }

    fn completion(&self) -> &Signal<T> {
        self.finished()
    }

    fn result(&self) -> Option<T> {
        self.value()
    }
}
