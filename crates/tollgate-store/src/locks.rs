//! Per-key lock registry.
//!
//! Balance mutations must serialize per account (or per organization)
//! while mutations on distinct keys never block each other. The
//! registry hands out one `Arc<Mutex<()>>` per key; callers hold the
//! guard only for the read-validate-write-append critical section and
//! never across a network round-trip.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A registry of named locks, one per storage key.
#[derive(Default)]
pub struct LockRegistry {
    inner: Mutex<HashMap<Vec<u8>, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the lock handle for `key`.
    ///
    /// The registry mutex is held only for the map lookup, never while
    /// a caller's critical section runs.
    #[must_use]
    pub fn handle(&self, key: &[u8]) -> Arc<Mutex<()>> {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(key.to_vec())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Lock a handle, recovering from poisoning.
///
/// A poisoned lock means another thread panicked while holding it;
/// the protected state lives in RocksDB write batches, which are
/// either fully applied or not at all, so the guard itself carries no
/// state worth discarding.
#[must_use]
pub fn lock(handle: &Mutex<()>) -> MutexGuard<'_, ()> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}
