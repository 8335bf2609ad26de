use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

/// Why a signal stopped delivering emissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// The owner called [`Signal::close`].
    Closed,

    /// The owning [`Signal`] was dropped.
    Destroyed,
}

/// What a receiver wants after handling an emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Keep,
    Disconnect,
}

/// A subscriber connected to a [`Signal`].
pub(crate) trait Receiver<A> {
    /// Handles one emission.
    fn on_emit(&mut self, args: &A) -> Control;

    /// Called once if the signal closes while the receiver is connected.
    fn on_close(self: Box<Self>, reason: CloseReason);
}

/// Adapts a plain callback into a receiver that never disconnects itself.
struct Callback<F>(F);

impl<A, F: FnMut(&A)> Receiver<A> for Callback<F> {
    fn on_emit(&mut self, args: &A) -> Control {
        (self.0)(args);
        Control::Keep
    }

    fn on_close(self: Box<Self>, _reason: CloseReason) {}
}

enum Entry<A> {
    Idle(Box<dyn Receiver<A>>),

    /// The receiver is out of its slot, running `on_emit`.
    Busy,
}

/// Connected receivers keyed by connection number.
///
/// Numbers are never reused, so ascending key order is connection order.
struct Inner<A> {
    slots: RefCell<BTreeMap<u64, Entry<A>>>,
    next_key: Cell<u64>,
    closed: Cell<bool>,
}

impl<A> Inner<A> {
    fn connect(&self, receiver: Box<dyn Receiver<A>>) -> Option<u64> {
        if self.closed.get() {
            return None;
        }

        let key = self.next_key.get();
        self.next_key.set(key + 1);
        self.slots.borrow_mut().insert(key, Entry::Idle(receiver));

        Some(key)
    }

    fn disconnect(&self, key: u64) -> bool {
        self.slots.borrow_mut().remove(&key).is_some()
    }

    /// Closes every connected receiver with `reason`.
    fn shut(&self, reason: CloseReason) {
        self.closed.set(true);

        let entries = std::mem::take(&mut *self.slots.borrow_mut());
        trace!(?reason, receivers = entries.len(), "signal closed");

        for entry in entries.into_values() {
            if let Entry::Idle(receiver) = entry {
                receiver.on_close(reason);
            }
        }
    }
}

impl<A> Drop for Inner<A> {
    fn drop(&mut self) {
        if !self.closed.get() {
            self.shut(CloseReason::Destroyed);
        }
    }
}

/// A completion channel owned by an event source.
///
/// A source holds a `Signal` for every kind of event it reports and calls
/// [`emit`](Self::emit) when the event happens. Receivers run
/// synchronously, in connection order, on the emitting thread.
///
/// Dropping the `Signal` is how the source reports its own destruction:
/// connected adapters resolve with
/// [`WaitError::SourceDestroyed`](crate::error::WaitError::SourceDestroyed).
pub struct Signal<A> {
    inner: Rc<Inner<A>>,
}

impl<A> Signal<A> {
    /// Creates a signal with no receivers.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                slots: RefCell::new(BTreeMap::new()),
                next_key: Cell::new(0),
                closed: Cell::new(false),
            }),
        }
    }

    /// Connects a callback invoked with the arguments of every emission.
    ///
    /// Returns `None` if the signal is closed.
    pub fn connect<F>(&self, callback: F) -> Option<Connection<A>>
    where
        F: FnMut(&A) + 'static,
        A: 'static,
    {
        let key = self.inner.connect(Box::new(Callback(callback)))?;

        Some(Connection {
            signal: self.downgrade(),
            key,
        })
    }

    /// Delivers `args` to every connected receiver.
    ///
    /// Receivers may connect, disconnect or close the signal from inside
    /// the callback. Receivers connected during an emission first see the
    /// next one. Emitting on a closed signal does nothing.
    pub fn emit(&self, args: A) {
        if self.inner.closed.get() {
            trace!("emission on a closed signal dropped");
            return;
        }

        // Receivers connected from here on get larger keys and wait for
        // the next emission.
        let keys: Vec<u64> = self.inner.slots.borrow().keys().copied().collect();

        for key in keys {
            let receiver = {
                let mut slots = self.inner.slots.borrow_mut();
                match slots.get_mut(&key) {
                    Some(entry @ Entry::Idle(_)) => std::mem::replace(entry, Entry::Busy),
                    _ => continue,
                }
            };

            let Entry::Idle(mut receiver) = receiver else {
                continue;
            };

            let control = receiver.on_emit(&args);

            if self.inner.closed.get() {
                // Closed from inside the callback; the slot is gone.
                receiver.on_close(CloseReason::Closed);
                continue;
            }

            let mut slots = self.inner.slots.borrow_mut();
            if !matches!(slots.get(&key), Some(Entry::Busy)) {
                // Disconnected during the callback.
                continue;
            }

            match control {
                Control::Keep => {
                    if let Some(entry) = slots.get_mut(&key) {
                        *entry = Entry::Idle(receiver);
                    }
                }
                Control::Disconnect => {
                    slots.remove(&key);
                }
            }
        }
    }

    /// Stops the signal for good.
    ///
    /// Every connected adapter resolves with
    /// [`WaitError::SourceClosed`](crate::error::WaitError::SourceClosed);
    /// later connections fail and later emissions are dropped.
    pub fn close(&self) {
        if !self.inner.closed.get() {
            self.inner.shut(CloseReason::Closed);
        }
    }

    /// Returns `true` once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Number of connected receivers.
    pub fn receiver_count(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    /// Returns a liveness-checked reference to this signal.
    pub fn downgrade(&self) -> WeakSignal<A> {
        WeakSignal {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub(crate) fn connect_receiver(&self, receiver: Box<dyn Receiver<A>>) -> Option<u64> {
        self.inner.connect(receiver)
    }
}

impl<A> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("receivers", &self.receiver_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A reference to a [`Signal`] that does not keep it alive.
pub struct WeakSignal<A> {
    inner: Weak<Inner<A>>,
}

impl<A> WeakSignal<A> {
    /// Returns `true` if the signal still exists and is not closed.
    pub fn is_alive(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| !inner.closed.get())
    }

    /// Why the signal stopped, or `None` while it is alive.
    pub fn close_reason(&self) -> Option<CloseReason> {
        match self.inner.upgrade() {
            None => Some(CloseReason::Destroyed),
            Some(inner) if inner.closed.get() => Some(CloseReason::Closed),
            Some(_) => None,
        }
    }

    pub(crate) fn connect_receiver(&self, receiver: Box<dyn Receiver<A>>) -> Option<u64> {
        self.inner.upgrade()?.connect(receiver)
    }

    /// Removes the receiver under `key`; a no-op once the signal is gone.
    pub(crate) fn disconnect(&self, key: u64) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.disconnect(key))
    }
}

impl<A> Clone for WeakSignal<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// A callback connected with [`Signal::connect`].
///
/// Dropping the handle leaves the callback connected.
pub struct Connection<A> {
    signal: WeakSignal<A>,
    key: u64,
}

impl<A> Connection<A> {
    /// Disconnects the callback.
    ///
    /// Returns `false` if it was already disconnected or the signal is
    /// gone.
    pub fn disconnect(self) -> bool {
        self.signal.disconnect(self.key)
    }

    /// Returns `true` while the callback is still connected.
    pub fn is_connected(&self) -> bool {
        self.signal
            .inner
            .upgrade()
            .is_some_and(|inner| inner.slots.borrow().contains_key(&self.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        seen: Rc<RefCell<Vec<String>>>,
        once: bool,
    }

    impl Receiver<u32> for Recorder {
        fn on_emit(&mut self, args: &u32) -> Control {
            self.seen.borrow_mut().push(format!("emit {args}"));
            if self.once { Control::Disconnect } else { Control::Keep }
        }

        fn on_close(self: Box<Self>, reason: CloseReason) {
            self.seen.borrow_mut().push(format!("close {reason:?}"));
        }
    }

    #[test]
    fn receivers_run_in_connection_order() {
        let signal = Signal::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b"] {
            let seen = seen.clone();
            signal.connect(move |n: &u32| seen.borrow_mut().push(format!("{tag}{n}")));
        }

        signal.emit(1);
        signal.emit(2);

        assert_eq!(*seen.borrow(), ["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn reconnected_receivers_keep_connection_order() {
        let signal = Signal::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let connect = |tag: &'static str| {
            let seen = seen.clone();
            signal.connect(move |_: &u32| seen.borrow_mut().push(tag))
        };

        let a = connect("a");
        let _b = connect("b");
        assert!(a.is_some_and(Connection::disconnect));
        let _c = connect("c");

        signal.emit(1);

        assert_eq!(*seen.borrow(), ["b", "c"]);
    }

    #[test]
    fn receivers_connected_while_emitting_wait_for_the_next_emission() {
        let signal = Rc::new(Signal::new());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let mut first = {
            let seen = seen.clone();
            signal.connect(move |n: &u32| seen.borrow_mut().push(format!("first {n}")))
        };

        {
            let weak = Rc::downgrade(&signal);
            let seen = seen.clone();
            signal.connect(move |_: &u32| {
                // Frees the oldest key, then connects a late receiver.
                if let Some(first) = first.take() {
                    first.disconnect();
                }
                if let Some(signal) = weak.upgrade() {
                    let seen = seen.clone();
                    signal.connect(move |n: &u32| seen.borrow_mut().push(format!("late {n}")));
                }
            });
        }

        signal.emit(1);
        assert_eq!(*seen.borrow(), ["first 1"]);

        signal.emit(2);
        assert_eq!(*seen.borrow(), ["first 1", "late 2"]);
    }

    #[test]
    fn self_disconnecting_receiver_fires_once() {
        let signal = Signal::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        signal.connect_receiver(Box::new(Recorder {
            seen: seen.clone(),
            once: true,
        }));

        signal.emit(1);
        signal.emit(2);

        assert_eq!(*seen.borrow(), ["emit 1"]);
        assert_eq!(signal.receiver_count(), 0);
    }

    #[test]
    fn close_and_drop_notify_receivers() {
        let seen = Rc::new(RefCell::new(Vec::new()));

        let closed = Signal::new();
        closed.connect_receiver(Box::new(Recorder {
            seen: seen.clone(),
            once: false,
        }));
        closed.close();
        closed.emit(9);
        assert!(closed.connect(|_| {}).is_none());

        let dropped = Signal::new();
        let weak = dropped.downgrade();
        dropped.connect_receiver(Box::new(Recorder {
            seen: seen.clone(),
            once: false,
        }));
        drop(dropped);

        assert_eq!(*seen.borrow(), ["close Closed", "close Destroyed"]);
        assert_eq!(weak.close_reason(), Some(CloseReason::Destroyed));
        assert!(!weak.is_alive());
    }

    #[test]
    fn disconnect_from_inside_a_callback() {
        let signal = Rc::new(Signal::new());
        let hits = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Connection<u32>>>> = Rc::new(RefCell::new(None));

        let connection = {
            let hits = hits.clone();
            let slot = slot.clone();
            signal.connect(move |_| {
                hits.set(hits.get() + 1);
                if let Some(connection) = slot.borrow_mut().take() {
                    connection.disconnect();
                }
            })
        };
        *slot.borrow_mut() = connection;

        signal.emit(1);
        signal.emit(2);

        assert_eq!(hits.get(), 1);
    }
}
