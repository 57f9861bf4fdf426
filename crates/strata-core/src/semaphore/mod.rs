//! Timeline semaphores and multi-semaphore waits.
//!
//! A timeline semaphore carries a monotonically advancing `u64` payload and
//! may enter a sticky failure state. Waits complete once the payload reaches
//! a target value, fail once the semaphore fails, or expire at a deadline.

mod host;
mod list;
mod notifier;
mod wait;

pub use host::HostSemaphore;
pub use list::{SemaphoreList, SemaphoreSet};
pub use notifier::WaitNotifier;
pub use wait::{poll_semaphores, wait_semaphores, WaitMode};

use crate::error::{HalError, Result};
use crate::resource::Resource;
use crate::time::{Deadline, Timeout};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Timeline semaphore interface implemented by each backend.
pub trait Semaphore: Resource + Debug {
    /// Current payload value, or the sticky failure if the semaphore failed.
    fn query(&self) -> Result<u64>;

    /// Sets the payload to `value` and wakes waiters whose target is reached.
    fn signal(&self, value: u64) -> Result<()>;

    /// Moves the semaphore into the failure state with `status`.
    fn fail(&self, status: HalError);

    /// Blocks until the payload reaches `value`, the semaphore fails or the
    /// timeout expires.
    fn wait(&self, value: u64, timeout: Timeout) -> Result<()>;

    /// Registers `notifier` to be woken on every state change.
    ///
    /// Registrations are counted: subscribing the same notifier twice needs
    /// two matching [`Semaphore::unsubscribe`] calls.
    fn subscribe(&self, notifier: &Arc<WaitNotifier>);

    /// Removes one registration of `notifier`.
    fn unsubscribe(&self, notifier: &Arc<WaitNotifier>);

    /// [`Semaphore::wait`] bounded by an absolute deadline.
    fn wait_with_deadline(&self, value: u64, deadline: Deadline) -> Result<()> {
        self.wait(value, Timeout::Deadline(deadline))
    }

    /// [`Semaphore::wait`] bounded by a duration from now.
    fn wait_with_timeout(&self, value: u64, timeout: Duration) -> Result<()> {
        self.wait(value, Timeout::Relative(timeout))
    }
}
