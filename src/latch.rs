//! Edge-triggered boolean latch.
//!
//! Connection transitions are reported by the bus on its own dispatch
//! context while a caller awaits them. The latch is the meeting point:
//! setting never blocks, and a waiter that registered before a racing `set`
//! is still woken.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

pub(crate) struct Latch {
    flag: AtomicBool,
    notify: Notify,
}

impl Latch {
    pub(crate) fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Set the latch and wake every current waiter. Never blocks.
    pub(crate) fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Reset to clear. A `set` delivered before this point is discarded.
    pub(crate) fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Wait until the latch is set or `timeout` elapses. Returns whether
    /// the latch was observed set.
    pub(crate) async fn wait_for(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }

    async fn wait(&self) {
        loop {
            // Register interest before checking the flag so a set racing
            // with the check still wakes this waiter.
            let notified = self.notify.notified();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}
