use super::AsyncGenerator;
use super::co::Slot;
use crate::error::GeneratorError;

use std::cell::{Ref, RefMut};
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

/// A position in an [`AsyncGenerator`].
///
/// Either the producer's current value or the end sentinel returned by
/// [`AsyncGenerator::end`]. Two iterators are equal when they view the
/// same generator, or when both are the end sentinel.
pub struct GeneratorIterator<'g, T, E = Infallible> {
    /// `None` for the end sentinel.
    generator: Option<&'g mut AsyncGenerator<T, E>>,
}

impl<'g, T, E> GeneratorIterator<'g, T, E> {
    pub(crate) fn at(generator: &'g mut AsyncGenerator<T, E>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    pub(crate) fn sentinel() -> Self {
        Self { generator: None }
    }

    /// Returns `true` for the end sentinel.
    pub fn is_end(&self) -> bool {
        self.generator.is_none()
    }

    fn current(&self) -> &AsyncGenerator<T, E> {
        self.generator
            .as_deref()
            .expect("dereferenced the end iterator of an AsyncGenerator")
    }

    /// Borrows the current value without copying it.
    ///
    /// # Panics
    ///
    /// Panics on the end sentinel, or if the value was moved out with
    /// [`take`](Self::take).
    pub fn get(&self) -> Ref<'_, T> {
        Ref::map(self.current().handoff.slot_ref(), |slot| match slot {
            Slot::Yielded(value) => value,
            _ => panic!("the current value of an AsyncGenerator was already taken"),
        })
    }

    /// Mutably borrows the current value.
    ///
    /// The producer receives the mutated value back from its `yield_`.
    ///
    /// # Panics
    ///
    /// Panics on the end sentinel, or if the value was moved out with
    /// [`take`](Self::take).
    pub fn get_mut(&mut self) -> RefMut<'_, T> {
        RefMut::map(self.current().handoff.slot(), |slot| match slot {
            Slot::Yielded(value) => value,
            _ => panic!("the current value of an AsyncGenerator was already taken"),
        })
    }

    /// Moves the current value out.
    ///
    /// Returns `None` if it was already taken. The producer's `yield_`
    /// then resolves to `None`.
    ///
    /// # Panics
    ///
    /// Panics on the end sentinel.
    pub fn take(&mut self) -> Option<T> {
        self.current().handoff.take()
    }

    /// Returns a copy of the current value.
    ///
    /// # Panics
    ///
    /// Panics on the end sentinel, or if the value was moved out.
    pub fn cloned(&self) -> T
    where
        T: Clone,
    {
        self.get().clone()
    }

    /// Resumes the producer and moves this iterator to the next value,
    /// or to the end.
    ///
    /// A producer failure is returned once; the iterator is the end
    /// sentinel afterwards.
    ///
    /// # Panics
    ///
    /// The returned future panics if this iterator is the end sentinel.
    pub fn advance(&mut self) -> Advance<'_, 'g, T, E> {
        Advance { iterator: self }
    }
}

impl<'a, 'b, T, E> PartialEq<GeneratorIterator<'b, T, E>> for GeneratorIterator<'a, T, E> {
    fn eq(&self, other: &GeneratorIterator<'b, T, E>) -> bool {
        let this = self.generator.as_deref().map(|g| g.id);
        let that = other.generator.as_deref().map(|g| g.id);

        this == that
    }
}

impl<T, E> fmt::Debug for GeneratorIterator<'_, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.generator.as_deref() {
            Some(generator) => f
                .debug_struct("GeneratorIterator")
                .field("generator", &generator.id)
                .finish(),
            None => f.write_str("GeneratorIterator(end)"),
        }
    }
}

/// Future returned by [`AsyncGenerator::begin`].
#[must_use = "futures do nothing unless awaited"]
pub struct Begin<'g, T, E> {
    generator: Option<&'g mut AsyncGenerator<T, E>>,
}

impl<'g, T, E> Begin<'g, T, E> {
    pub(crate) fn new(generator: &'g mut AsyncGenerator<T, E>) -> Self {
        Self {
            generator: Some(generator),
        }
    }
}

impl<'g, T, E> Future for Begin<'g, T, E> {
    type Output = Result<GeneratorIterator<'g, T, E>, GeneratorError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let generator = this
            .generator
            .as_mut()
            .expect("Begin polled after completion");

        let step = ready!(generator.poll_start(cx));
        let generator = this.generator.take();

        Poll::Ready(match (step, generator) {
            (Ok(true), Some(generator)) => Ok(GeneratorIterator::at(generator)),
            (Ok(_), _) => Ok(GeneratorIterator::sentinel()),
            (Err(err), _) => Err(err),
        })
    }
}

/// Future returned by [`GeneratorIterator::advance`].
#[must_use = "futures do nothing unless awaited"]
pub struct Advance<'a, 'g, T, E> {
    iterator: &'a mut GeneratorIterator<'g, T, E>,
}

impl<T, E> Future for Advance<'_, '_, T, E> {
    type Output = Result<(), GeneratorError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let iterator = &mut self.get_mut().iterator;
        let generator = iterator
            .generator
            .as_mut()
            .expect("advance called on the end iterator of an AsyncGenerator");

        match ready!(generator.poll_resume(cx)) {
            Ok(true) => Poll::Ready(Ok(())),
            Ok(false) => {
                iterator.generator = None;
                Poll::Ready(Ok(()))
            }
            Err(err) => {
                iterator.generator = None;
                Poll::Ready(Err(err))
            }
        }
    }
}
