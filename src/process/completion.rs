//! One-Shot Completion Signal
//!
//! A value written exactly once by one execution context and awaited by
//! another. Used for the parent/child load and exit handshakes.
//!
//! # Ordering
//! `spin::Once` publishes the value with release semantics and readers
//! observe it with acquire semantics, so everything the producer wrote
//! before `complete` is visible to the waiter after `wait` returns.

use core::fmt;

use spin::Once;

use crate::error::RegistryError;

/// A one-shot completion carrying a value of type `T`.
pub struct Completion<T> {
    slot: Once<T>,
}

impl<T> Completion<T> {
    /// Create an unsignaled completion.
    pub const fn new() -> Self {
        Self { slot: Once::new() }
    }

    /// Publish `value` and release the waiter.
    ///
    /// Fails with `AlreadySignaled` if the completion was raised before;
    /// the first value is kept.
    pub fn complete(&self, value: T) -> Result<(), RegistryError> {
        let mut stored = false;
        self.slot.call_once(|| {
            stored = true;
            value
        });
        if stored {
            Ok(())
        } else {
            Err(RegistryError::AlreadySignaled)
        }
    }

    /// Check whether the completion has been raised.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.slot.is_completed()
    }

    /// Get the value if already raised, without blocking.
    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.slot.get()
    }

    /// Block until the value is published.
    ///
    /// Returns immediately if already raised. The caller's context spins;
    /// the scheduler is preemptive so the producer still makes progress.
    pub fn wait(&self) -> &T {
        self.slot.wait()
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.peek() {
            Some(value) => write!(f, "Completion({:?})", value),
            None => write!(f, "Completion(pending)"),
        }
    }
}
