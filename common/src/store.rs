//! Single-slot holder for the latest snapshot.

use std::sync::{Arc, Mutex, PoisonError};

use crate::Snapshot;

/// Convenience helper for passing the last of a value between threads. For example from a thread
/// interfacing with a sensor to another one serving the data.
///
/// The slot holds an `Arc<T>`; the mutex guards only the pointer swap, so writers build the value
/// fully before calling [`ValueStore::set`] and readers keep whatever `Arc` they got for as long
/// as they like.
#[derive(Debug)]
pub struct ValueStore<T>(Arc<Mutex<Option<Arc<T>>>>);

impl<T> Clone for ValueStore<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for ValueStore<T> {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }
}

impl<T> ValueStore<T> {
    /// Sets `value` as the last value and returns the shared handle to it.
    pub fn set(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        // The slot is only ever assigned whole, so a poisoned lock still holds a valid value.
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(value.clone());
        value
    }

    /// Gets the stored value without removing it.
    pub fn get(&self) -> Option<Arc<T>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Returned by [`ReadingStore::current`] before the first snapshot is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no reading has been published yet")]
pub struct NotReady;

/// The Reading Store: the current snapshot, written by the sampler and read by the HTTP handlers.
#[derive(Clone, Debug, Default)]
pub struct ReadingStore(ValueStore<Snapshot>);

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current snapshot. Readers already holding the previous one keep it.
    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        self.0.set(snapshot)
    }

    /// Returns whatever snapshot is current right now.
    pub fn current(&self) -> Result<Arc<Snapshot>, NotReady> {
        self.0.get().ok_or(NotReady)
    }
}
