//! Slot-available signalling between token handlers and the dispatcher.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Condition variable guarding nothing but the wait itself.
///
/// The dispatcher parks here when no worker has a free slot; every
/// successful completion notifies. Waits are bounded and predicated, so a
/// missed or spurious wakeup costs at most one timeout interval.
pub struct SlotSignal {
    lock: Mutex<()>,
    slot_available: Condvar,
}

impl SlotSignal {
    /// Create an unsignalled instance.
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            slot_available: Condvar::new(),
        }
    }

    /// Wake every waiting dispatcher.
    pub fn notify_all(&self) {
        let _guard = self.lock.lock().unwrap();
        self.slot_available.notify_all();
    }

    /// Block until `condition` holds or `timeout` elapses.
    ///
    /// The predicate form guards against spurious wakeups.
    pub fn wait_timeout_while(&self, timeout: Duration, condition: impl Fn() -> bool) {
        let guard = self.lock.lock().unwrap();
        let _ = self
            .slot_available
            .wait_timeout_while(guard, timeout, |_| !condition())
            .unwrap();
    }
}

impl Default for SlotSignal {
    fn default() -> Self {
        Self::new()
    }
}
