//! Wake-up channel shared between a waiter and the semaphores it watches.

use crate::time::Deadline;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// Epoch counter that semaphores bump whenever their state changes.
///
/// A waiter reads the epoch, re-checks its condition, and only then blocks
/// until the epoch moves. A signal landing between the check and the block
/// has already moved the epoch, so the wake-up cannot be lost.
#[derive(Debug, Default)]
pub struct WaitNotifier {
    epoch: Mutex<u64>,
    condvar: Condvar,
}

impl WaitNotifier {
    /// Creates a notifier at epoch zero.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        *self.epoch.lock()
    }

    /// Advances the epoch and wakes every blocked waiter.
    pub fn notify(&self) {
        let mut epoch = self.epoch.lock();
        *epoch = epoch.wrapping_add(1);
        self.condvar.notify_all();
    }

    /// Blocks until the epoch differs from `seen` or `deadline` elapses.
    ///
    /// Returns whether the epoch moved.
    pub fn wait_for_change(&self, seen: u64, deadline: Deadline) -> bool {
        let mut epoch = self.epoch.lock();
        while *epoch == seen {
            match deadline.instant() {
                None => self.condvar.wait(&mut epoch),
                Some(instant) => {
                    if self.condvar.wait_until(&mut epoch, instant).timed_out() {
                        return *epoch != seen;
                    }
                }
            }
        }
        true
    }
}
