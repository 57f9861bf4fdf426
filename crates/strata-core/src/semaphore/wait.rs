//! Waiting on several semaphores at once.

use super::list::SemaphoreList;
use super::notifier::WaitNotifier;
use crate::error::{HalError, Result};
use crate::time::Timeout;
use std::fmt;
use std::sync::Arc;

/// Completion condition of a multi-semaphore wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitMode {
    /// Every semaphore must reach its payload value.
    All,
    /// At least one semaphore must reach its payload value.
    Any,
}

impl fmt::Display for WaitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// Unsubscribes the notifier from every semaphore in the list when dropped.
struct Subscription<'a> {
    list: SemaphoreList<'a>,
    notifier: Arc<WaitNotifier>,
}

impl<'a> Subscription<'a> {
    fn new(list: SemaphoreList<'a>) -> Self {
        let notifier = WaitNotifier::new();
        for semaphore in list.semaphores() {
            semaphore.subscribe(&notifier);
        }
        Self { list, notifier }
    }
}

impl Drop for Subscription<'_> {
    fn drop(&mut self) {
        for semaphore in self.list.semaphores() {
            semaphore.unsubscribe(&self.notifier);
        }
    }
}

/// Checks the list once.
///
/// A failed semaphore surfaces its failure in both modes, except that in
/// `Any` mode a satisfied member completes the wait first.
fn is_resolved(mode: WaitMode, list: &SemaphoreList<'_>) -> Result<bool> {
    let mut failure = None;
    let mut satisfied = 0usize;
    for (semaphore, target) in list.iter() {
        match semaphore.query() {
            Ok(value) if value >= target => {
                if mode == WaitMode::Any {
                    return Ok(true);
                }
                satisfied += 1;
            }
            Ok(_) => {}
            Err(err) => {
                failure.get_or_insert(err);
            }
        }
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(mode == WaitMode::All && satisfied == list.len()),
    }
}

/// Checks `list` once without blocking.
///
/// Returns `Ok(true)` once the list resolves under `mode`, `Ok(false)` while
/// it is pending, and the failure of a failed member otherwise. An empty list
/// is resolved.
pub fn poll_semaphores(mode: WaitMode, list: &SemaphoreList<'_>) -> Result<bool> {
    if list.is_empty() {
        return Ok(true);
    }
    is_resolved(mode, list)
}

/// Waits until `list` resolves under `mode` or `timeout` expires.
///
/// An empty list completes immediately. [`Timeout::IMMEDIATE`] polls once.
pub fn wait_semaphores(mode: WaitMode, list: &SemaphoreList<'_>, timeout: Timeout) -> Result<()> {
    if list.is_empty() {
        return Ok(());
    }
    let deadline = timeout.to_deadline();

    // Fast path without registering anywhere.
    if is_resolved(mode, list)? {
        return Ok(());
    }
    if deadline.has_elapsed() {
        return Err(HalError::DeadlineExceeded);
    }

    tracing::trace!(%mode, count = list.len(), ?deadline, "blocking on semaphores");
    let subscription = Subscription::new(*list);
    loop {
        let seen = subscription.notifier.epoch();
        if is_resolved(mode, list)? {
            return Ok(());
        }
        if deadline.has_elapsed() {
            return Err(HalError::DeadlineExceeded);
        }
        subscription.notifier.wait_for_change(seen, deadline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semaphore::{HostSemaphore, Semaphore, SemaphoreSet};
    use std::thread;
    use std::time::Duration;

    fn pair(a: u64, b: u64) -> (Arc<HostSemaphore>, Arc<HostSemaphore>) {
        (HostSemaphore::new(a, None), HostSemaphore::new(b, None))
    }

    #[test]
    fn test_empty_list_completes() {
        let list = SemaphoreList::empty();
        assert!(wait_semaphores(WaitMode::All, &list, Timeout::IMMEDIATE).is_ok());
        assert!(wait_semaphores(WaitMode::Any, &list, Timeout::INFINITE).is_ok());
    }

    #[test]
    fn test_all_requires_every_member() {
        let (a, b) = pair(1, 0);
        let set = SemaphoreSet::new().with(a, 1).with(b.clone(), 1);
        let err = wait_semaphores(WaitMode::All, &set.as_list(), Timeout::IMMEDIATE).unwrap_err();
        assert!(err.is_deadline_exceeded());
        assert!(wait_semaphores(WaitMode::Any, &set.as_list(), Timeout::IMMEDIATE).is_ok());

        b.signal(1).unwrap();
        assert!(wait_semaphores(WaitMode::All, &set.as_list(), Timeout::IMMEDIATE).is_ok());
    }

    #[test]
    fn test_failure_wins_in_all_mode() {
        let (a, b) = pair(5, 0);
        b.fail(HalError::unknown("boom"));
        let set = SemaphoreSet::new().with(a, 1).with(b, 1);
        let err = wait_semaphores(WaitMode::All, &set.as_list(), Timeout::INFINITE).unwrap_err();
        assert_eq!(err, HalError::unknown("boom"));
    }

    #[test]
    fn test_any_surfaces_failure_when_nothing_satisfied() {
        let (a, b) = pair(0, 0);
        a.fail(HalError::unknown("boom"));
        let set = SemaphoreSet::new().with(a, 1).with(b, 1);
        let err = wait_semaphores(WaitMode::Any, &set.as_list(), Timeout::INFINITE).unwrap_err();
        assert!(err.is_unknown());
    }

    #[test]
    fn test_blocking_wait_wakes_on_signal() {
        let (a, b) = pair(0, 0);
        let set = SemaphoreSet::new().with(a.clone(), 1).with(b.clone(), 1);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            a.signal(1).unwrap();
            thread::sleep(Duration::from_millis(10));
            b.signal(1).unwrap();
        });
        wait_semaphores(WaitMode::All, &set.as_list(), Timeout::INFINITE).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_poll_does_not_block() {
        let (a, b) = pair(1, 0);
        let set = SemaphoreSet::new().with(a, 1).with(b.clone(), 2);
        assert!(!poll_semaphores(WaitMode::All, &set.as_list()).unwrap());
        assert!(poll_semaphores(WaitMode::Any, &set.as_list()).unwrap());
        assert!(poll_semaphores(WaitMode::Any, &SemaphoreList::empty()).unwrap());

        b.fail(HalError::DeadlineExceeded);
        assert_eq!(
            poll_semaphores(WaitMode::All, &set.as_list()).unwrap_err(),
            HalError::DeadlineExceeded
        );
    }

    #[test]
    fn test_subscriptions_are_released() {
        let (a, _) = pair(0, 0);
        let set = SemaphoreSet::new().with(a.clone(), 1);
        let err = wait_semaphores(
            WaitMode::Any,
            &set.as_list(),
            Timeout::Relative(Duration::from_millis(5)),
        )
        .unwrap_err();
        assert!(err.is_deadline_exceeded());
        assert_eq!(a.subscriber_count(), 0);
    }
}
