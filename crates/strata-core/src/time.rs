//! Wait bounds: absolute deadlines and relative timeouts.
//!
//! Every blocking call accepts a [`Timeout`], which is either an absolute
//! [`Deadline`] or a [`Duration`] measured from the call. Both forms reduce to
//! a deadline before any waiting happens.

use std::time::{Duration, Instant};

/// Absolute point in time bounding a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Already elapsed: waits poll once and never suspend.
    InfinitePast,
    /// A concrete instant.
    At(Instant),
    /// Never elapses: waits block until resolved.
    InfiniteFuture,
}

impl Deadline {
    /// Deadline `timeout` from now. Overflowing timeouts never elapse.
    pub fn after(timeout: Duration) -> Self {
        if timeout.is_zero() {
            return Self::InfinitePast;
        }
        Instant::now()
            .checked_add(timeout)
            .map_or(Self::InfiniteFuture, Self::At)
    }

    /// Whether the deadline has passed.
    pub fn has_elapsed(&self) -> bool {
        match self {
            Self::InfinitePast => true,
            Self::At(instant) => Instant::now() >= *instant,
            Self::InfiniteFuture => false,
        }
    }

    /// Instant to pass to a timed condition wait, or `None` to wait forever.
    pub fn instant(&self) -> Option<Instant> {
        match self {
            Self::InfinitePast => Some(Instant::now()),
            Self::At(instant) => Some(*instant),
            Self::InfiniteFuture => None,
        }
    }
}

impl From<Instant> for Deadline {
    fn from(instant: Instant) -> Self {
        Self::At(instant)
    }
}

/// Bound on a wait, expressed in either reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Absolute deadline.
    Deadline(Deadline),
    /// Duration relative to the call; [`Duration::MAX`] never elapses.
    Relative(Duration),
}

impl Timeout {
    /// Poll without suspending.
    pub const IMMEDIATE: Self = Self::Deadline(Deadline::InfinitePast);
    /// Block until resolved.
    pub const INFINITE: Self = Self::Deadline(Deadline::InfiniteFuture);

    /// Converts to an absolute deadline, anchoring relative timeouts at now.
    pub fn to_deadline(self) -> Deadline {
        match self {
            Self::Deadline(deadline) => deadline,
            Self::Relative(duration) if duration == Duration::MAX => Deadline::InfiniteFuture,
            Self::Relative(duration) => Deadline::after(duration),
        }
    }
}

impl From<Deadline> for Timeout {
    fn from(deadline: Deadline) -> Self {
        Self::Deadline(deadline)
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self::Relative(duration)
    }
}

impl From<Instant> for Timeout {
    fn from(instant: Instant) -> Self {
        Self::Deadline(Deadline::At(instant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_polls() {
        assert_eq!(Deadline::after(Duration::ZERO), Deadline::InfinitePast);
        assert!(Timeout::Relative(Duration::ZERO).to_deadline().has_elapsed());
        assert!(Timeout::IMMEDIATE.to_deadline().has_elapsed());
    }

    #[test]
    fn test_infinite_never_elapses() {
        assert_eq!(Timeout::Relative(Duration::MAX).to_deadline(), Deadline::InfiniteFuture);
        assert!(!Timeout::INFINITE.to_deadline().has_elapsed());
        assert_eq!(Deadline::InfiniteFuture.instant(), None);
    }

    #[test]
    fn test_relative_anchors_at_call() {
        let before = Instant::now();
        let deadline = Timeout::from(Duration::from_secs(60)).to_deadline();
        match deadline {
            Deadline::At(instant) => assert!(instant >= before + Duration::from_secs(60)),
            other => panic!("expected concrete deadline, got {other:?}"),
        }
        assert!(!deadline.has_elapsed());
    }
}
