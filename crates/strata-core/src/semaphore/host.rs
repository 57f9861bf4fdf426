//! Host timeline semaphore built on a mutex and condition variable.

use super::notifier::WaitNotifier;
use super::Semaphore;
use crate::error::{HalError, Result};
use crate::resource::{Resource, ResourceHeader, ResourceKind, ResourceTracker};
use crate::time::Timeout;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
struct TimelineState {
    value: u64,
    failure: Option<HalError>,
}

/// Timeline semaphore signaled and waited on by host threads.
///
/// Behavior in the cases left to each backend:
/// - signaling a value at or below the current one replaces the value;
/// - signaling a failed semaphore returns its sticky failure;
/// - waiting on a failed semaphore returns its sticky failure, even when the
///   last value reached the target;
/// - failing an already failed semaphore keeps the first failure.
pub struct HostSemaphore {
    header: ResourceHeader,
    state: Mutex<TimelineState>,
    condvar: Condvar,
    subscribers: Mutex<Vec<Arc<WaitNotifier>>>,
}

impl HostSemaphore {
    /// Creates a semaphore at `initial_value`.
    pub fn new(initial_value: u64, tracker: Option<Arc<ResourceTracker>>) -> Arc<Self> {
        Arc::new(Self {
            header: ResourceHeader::new(ResourceKind::Semaphore, tracker),
            state: Mutex::new(TimelineState {
                value: initial_value,
                failure: None,
            }),
            condvar: Condvar::new(),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Number of registered wait notifiers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn notify_subscribers(&self) {
        for notifier in self.subscribers.lock().iter() {
            notifier.notify();
        }
    }
}

impl Semaphore for HostSemaphore {
    fn query(&self) -> Result<u64> {
        let state = self.state.lock();
        match &state.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(state.value),
        }
    }

    fn signal(&self, value: u64) -> Result<()> {
        {
            let mut state = self.state.lock();
            if let Some(failure) = &state.failure {
                return Err(failure.clone());
            }
            if value <= state.value {
                tracing::warn!(
                    semaphore = %self.header.id(),
                    current = state.value,
                    requested = value,
                    "semaphore signaled with a value that does not advance it"
                );
            }
            state.value = value;
            self.condvar.notify_all();
        }
        self.notify_subscribers();
        Ok(())
    }

    fn fail(&self, status: HalError) {
        {
            let mut state = self.state.lock();
            if state.failure.is_some() {
                return;
            }
            tracing::debug!(
                semaphore = %self.header.id(),
                value = state.value,
                %status,
                "semaphore failed"
            );
            state.failure = Some(status);
            self.condvar.notify_all();
        }
        self.notify_subscribers();
    }

    fn wait(&self, value: u64, timeout: Timeout) -> Result<()> {
        let deadline = timeout.to_deadline();
        let mut state = self.state.lock();
        loop {
            if let Some(failure) = &state.failure {
                return Err(failure.clone());
            }
            if state.value >= value {
                return Ok(());
            }
            if deadline.has_elapsed() {
                return Err(HalError::DeadlineExceeded);
            }
            match deadline.instant() {
                None => self.condvar.wait(&mut state),
                Some(instant) => {
                    // Timing out falls through to the re-check above.
                    let _ = self.condvar.wait_until(&mut state, instant);
                }
            }
        }
    }

    fn subscribe(&self, notifier: &Arc<WaitNotifier>) {
        self.subscribers.lock().push(notifier.clone());
    }

    fn unsubscribe(&self, notifier: &Arc<WaitNotifier>) {
        let mut subscribers = self.subscribers.lock();
        if let Some(index) = subscribers
            .iter()
            .position(|subscriber| Arc::ptr_eq(subscriber, notifier))
        {
            subscribers.swap_remove(index);
        }
    }
}

impl Resource for HostSemaphore {
    fn header(&self) -> &ResourceHeader {
        &self.header
    }
}

impl fmt::Debug for HostSemaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("HostSemaphore")
            .field("id", &self.header.id())
            .field("value", &state.value)
            .field("failure", &state.failure)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_decreasing_signal_is_accepted() {
        let semaphore = HostSemaphore::new(10, None);
        semaphore.signal(4).unwrap();
        assert_eq!(semaphore.query().unwrap(), 4);
    }

    #[test]
    fn test_signal_after_failure_is_sticky() {
        let semaphore = HostSemaphore::new(0, None);
        semaphore.fail(HalError::unknown("device lost"));
        let err = semaphore.signal(1).unwrap_err();
        assert_eq!(err, HalError::unknown("device lost"));
    }

    #[test]
    fn test_first_failure_wins() {
        let semaphore = HostSemaphore::new(0, None);
        semaphore.fail(HalError::unknown("first"));
        semaphore.fail(HalError::unknown("second"));
        assert_eq!(semaphore.query().unwrap_err(), HalError::unknown("first"));
    }

    #[test]
    fn test_wait_wakes_on_failure() {
        let semaphore = HostSemaphore::new(0, None);
        let remote = semaphore.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            remote.fail(HalError::unknown("aborted"));
        });
        let err = semaphore.wait(1, Timeout::INFINITE).unwrap_err();
        assert!(err.is_unknown());
        handle.join().unwrap();
    }

    #[test]
    fn test_timed_wait_expires() {
        let semaphore = HostSemaphore::new(0, None);
        let err = semaphore
            .wait(1, Timeout::Relative(Duration::from_millis(5)))
            .unwrap_err();
        assert!(err.is_deadline_exceeded());
    }

    #[test]
    fn test_subscriptions_are_counted() {
        let semaphore = HostSemaphore::new(0, None);
        let notifier = WaitNotifier::new();
        semaphore.subscribe(&notifier);
        semaphore.subscribe(&notifier);
        semaphore.unsubscribe(&notifier);
        assert_eq!(semaphore.subscriber_count(), 1);

        let seen = notifier.epoch();
        semaphore.signal(1).unwrap();
        assert_ne!(notifier.epoch(), seen);

        semaphore.unsubscribe(&notifier);
        assert_eq!(semaphore.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribers_are_notified() {
        let semaphore = HostSemaphore::new(0, None);
        let notifier = WaitNotifier::new();
        semaphore.subscribe(&notifier);
        let seen = notifier.epoch();
        semaphore.signal(1).unwrap();
        assert_ne!(notifier.epoch(), seen);

        semaphore.unsubscribe(&notifier);
        let seen = notifier.epoch();
        semaphore.signal(2).unwrap();
        assert_eq!(notifier.epoch(), seen);
    }
}
