use std::cell::{Cell, Ref, RefCell, RefMut};
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Whose move it is on the hand-off slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Turn {
    Producer,
    Consumer,
}

/// Content of the hand-off slot.
pub(crate) enum Slot<T> {
    /// Nothing was yielded since the producer last resumed.
    Vacant,

    /// The current value, owned by the consumer until the next advance.
    Yielded(T),

    /// The consumer moved the current value out.
    Taken,
}

/// The value hand-off between a producer frame and its consumer.
///
/// The producer writes a value and passes the turn; the consumer reads
/// or takes it and passes the turn back by resuming the producer.
pub(crate) struct Handoff<T> {
    slot: RefCell<Slot<T>>,
    turn: Cell<Turn>,
}

impl<T> Handoff<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: RefCell::new(Slot::Vacant),
            turn: Cell::new(Turn::Producer),
        }
    }

    pub(crate) fn turn(&self) -> Turn {
        self.turn.get()
    }

    /// Gives the producer its turn, leaving the slot for it to pick up.
    pub(crate) fn resume_producer(&self) {
        self.turn.set(Turn::Producer);
    }

    pub(crate) fn slot_ref(&self) -> Ref<'_, Slot<T>> {
        self.slot.borrow()
    }

    pub(crate) fn slot(&self) -> RefMut<'_, Slot<T>> {
        self.slot.borrow_mut()
    }

    /// Moves the current value out, leaving the slot `Taken`.
    pub(crate) fn take(&self) -> Option<T> {
        match mem::replace(&mut *self.slot.borrow_mut(), Slot::Taken) {
            Slot::Yielded(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn clear(&self) {
        *self.slot.borrow_mut() = Slot::Vacant;
        self.turn.set(Turn::Producer);
    }
}

/// The producer side of an [`AsyncGenerator`](super::AsyncGenerator).
///
/// Handed to the body closure; every `yield_` suspends the body until the
/// consumer advances.
pub struct Co<T> {
    handoff: Rc<Handoff<T>>,
}

impl<T> Co<T> {
    pub(crate) fn new(handoff: Rc<Handoff<T>>) -> Self {
        Self { handoff }
    }

    /// Publishes `value` as the current element and suspends until the
    /// consumer advances.
    ///
    /// Resolves to the value as the consumer left it, including any
    /// mutation made through
    /// [`get_mut`](super::GeneratorIterator::get_mut), or `None` if the
    /// consumer moved it out.
    ///
    /// # Panics
    ///
    /// Panics if awaited while the consumer holds the turn, e.g. when two
    /// yields are polled concurrently.
    pub fn yield_(&self, value: T) -> Yield<'_, T> {
        Yield {
            handoff: &self.handoff,
            value: Some(value),
            parked: false,
        }
    }
}

/// Future returned by [`Co::yield_`].
#[must_use = "a yielded value is only published when the future is awaited"]
pub struct Yield<'a, T> {
    handoff: &'a Handoff<T>,
    value: Option<T>,
    parked: bool,
}

impl<T> Unpin for Yield<'_, T> {}

impl<T> Future for Yield<'_, T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if !this.parked {
            assert!(
                this.handoff.turn() == Turn::Producer,
                "yield_ awaited outside the producer's turn"
            );

            if let Some(value) = this.value.take() {
                *this.handoff.slot() = Slot::Yielded(value);
            }
            this.handoff.turn.set(Turn::Consumer);
            this.parked = true;

            // No wake: the consumer learns about the value from the turn.
            return Poll::Pending;
        }

        if this.handoff.turn() == Turn::Consumer {
            return Poll::Pending;
        }

        match mem::replace(&mut *this.handoff.slot(), Slot::Vacant) {
            Slot::Yielded(value) => Poll::Ready(Some(value)),
            Slot::Vacant | Slot::Taken => Poll::Ready(None),
        }
    }
}
