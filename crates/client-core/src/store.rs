use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

/// Owned snapshot cell with subscribe/notify semantics.
///
/// Values are replaced wholesale, never mutated in place, so subscribers
/// always observe a complete snapshot.
#[derive(Debug)]
pub struct StateCell<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> StateCell<T> {
    /// Create a cell holding `initial`.
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Clone the current snapshot.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Replace the snapshot wholesale and notify subscribers.
    pub fn replace(&self, next: T) {
        self.tx.send_replace(next);
    }

    /// Subscribe to snapshot replacements.
    ///
    /// Intermediate snapshots may be coalesced; receivers always see the
    /// latest value.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Default> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Boolean latch admitting one outstanding operation at a time.
///
/// A second attempt while the latch is held is a no-op for the caller, not
/// queued. The permit releases the latch on drop.
#[derive(Debug, Default)]
pub struct InFlight {
    busy: AtomicBool,
}

impl InFlight {
    /// Acquire the latch, or `None` when an operation is already running.
    pub fn try_begin(&self) -> Option<InFlightPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightPermit { latch: self })
    }

    /// Whether an operation currently holds the latch.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Latch hold released on drop.
#[derive(Debug)]
pub struct InFlightPermit<'a> {
    latch: &'a InFlight,
}

impl Drop for InFlightPermit<'_> {
    fn drop(&mut self) {
        self.latch.busy.store(false, Ordering::Release);
    }
}
