use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use portlink_contracts::{MAX_PORT_ID, MIN_PORT_ID};

use crate::error::BridgeError;

/// Correlation token linking an async call to its completion.
pub type PortId = i64;

/// Issues port ids for async calls. Strictly increasing per issue order
/// until the range is exhausted, then wraps back to `MIN_PORT_ID` under
/// the guard so concurrent issuers never hand out the same id twice
/// within one cycle.
pub struct PortCounter {
    next: AtomicI64,
    wrap_guard: Mutex<()>,
}

impl PortCounter {
    pub fn new() -> Self {
        PortCounter {
            next: AtomicI64::new(MIN_PORT_ID - 1),
            wrap_guard: Mutex::new(()),
        }
    }

    /// Never blocks except in the wrap window at the end of the range.
    pub fn issue(&self) -> PortId {
        let next = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        if next <= MAX_PORT_ID {
            return next;
        }

        let _guard = self
            .wrap_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let current = self.next.load(Ordering::Relaxed);
        if current > MAX_PORT_ID {
            self.next.store(MIN_PORT_ID, Ordering::Relaxed);
            return MIN_PORT_ID;
        }
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for PortCounter {
    fn default() -> Self {
        PortCounter::new()
    }
}

/// Outstanding async calls initiated by one side, keyed by port id.
///
/// An entry is created when the call is dispatched and removed exactly
/// once when its completion is delivered; a completion that finds no
/// entry is a protocol violation the caller must surface.
pub(crate) struct PendingCalls<T> {
    entries: Mutex<HashMap<PortId, T>>,
}

impl<T> PendingCalls<T> {
    pub(crate) fn new() -> Self {
        PendingCalls {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn begin(&self, port: PortId, slot: T) -> Result<(), BridgeError> {
        let mut entries = self.lock();
        if entries.contains_key(&port) {
            return Err(BridgeError::DuplicatePort(port));
        }
        entries.insert(port, slot);
        Ok(())
    }

    pub(crate) fn take(&self, port: PortId) -> Option<T> {
        self.lock().remove(&port)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PortId, T>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
