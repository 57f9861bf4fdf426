//! Reference-counted resource base shared by every HAL object.
//!
//! HAL objects are handed out as `Arc<T>`: cloning the `Arc` retains, dropping
//! it releases, and the object's `Drop` runs on whichever thread releases the
//! last reference. Every object embeds a [`ResourceHeader`] which gives it a
//! process-unique id and, when created through a device, reports its
//! construction and destruction to a [`ResourceTracker`].

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Kinds of resources known to the HAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Device memory allocation
    Buffer,
    /// Typed, shaped window over a buffer
    BufferView,
    /// Timeline semaphore
    Semaphore,
    /// Loaded executable module
    Executable,
}

impl ResourceKind {
    const COUNT: usize = 4;

    /// All resource kinds, in tracker slot order.
    pub const ALL: [Self; Self::COUNT] =
        [Self::Buffer, Self::BufferView, Self::Semaphore, Self::Executable];

    fn slot(self) -> usize {
        match self {
            Self::Buffer => 0,
            Self::BufferView => 1,
            Self::Semaphore => 2,
            Self::Executable => 3,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer => write!(f, "buffer"),
            Self::BufferView => write!(f, "buffer_view"),
            Self::Semaphore => write!(f, "semaphore"),
            Self::Executable => write!(f, "executable"),
        }
    }
}

/// Process-unique identifier of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Counts created and destroyed resources per kind.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    created: [AtomicUsize; ResourceKind::COUNT],
    destroyed: [AtomicUsize; ResourceKind::COUNT],
}

impl ResourceTracker {
    /// Creates a tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn on_create(&self, kind: ResourceKind) {
        self.created[kind.slot()].fetch_add(1, Ordering::AcqRel);
    }

    fn on_destroy(&self, kind: ResourceKind) {
        self.destroyed[kind.slot()].fetch_add(1, Ordering::AcqRel);
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> ResourceStats {
        let mut stats = ResourceStats::default();
        for kind in ResourceKind::ALL {
            stats.created[kind.slot()] = self.created[kind.slot()].load(Ordering::Acquire);
            stats.destroyed[kind.slot()] = self.destroyed[kind.slot()].load(Ordering::Acquire);
        }
        stats
    }
}

/// Point-in-time resource counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceStats {
    created: [usize; ResourceKind::COUNT],
    destroyed: [usize; ResourceKind::COUNT],
}

impl ResourceStats {
    /// Number of resources of `kind` ever created.
    pub fn created(&self, kind: ResourceKind) -> usize {
        self.created[kind.slot()]
    }

    /// Number of resources of `kind` destroyed so far.
    pub fn destroyed(&self, kind: ResourceKind) -> usize {
        self.destroyed[kind.slot()]
    }

    /// Number of resources of `kind` still alive.
    pub fn live(&self, kind: ResourceKind) -> usize {
        self.created(kind).saturating_sub(self.destroyed(kind))
    }

    /// Total live resources across all kinds.
    pub fn total_live(&self) -> usize {
        ResourceKind::ALL.iter().map(|&kind| self.live(kind)).sum()
    }
}

/// Header embedded in every HAL object.
///
/// Dropping the header is the object's destroy step: it is reported to the
/// tracker exactly once, on the thread that released the last reference.
#[derive(Debug)]
pub struct ResourceHeader {
    id: ResourceId,
    kind: ResourceKind,
    tracker: Option<Arc<ResourceTracker>>,
}

impl ResourceHeader {
    /// Creates a header and reports the creation to `tracker`, if any.
    pub fn new(kind: ResourceKind, tracker: Option<Arc<ResourceTracker>>) -> Self {
        let id = ResourceId::next();
        if let Some(tracker) = &tracker {
            tracker.on_create(kind);
        }
        tracing::trace!(resource = %id, %kind, "resource created");
        Self { id, kind, tracker }
    }

    /// Resource id.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Resource kind.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Tracker this resource reports to.
    pub fn tracker(&self) -> Option<&Arc<ResourceTracker>> {
        self.tracker.as_ref()
    }
}

impl Drop for ResourceHeader {
    fn drop(&mut self) {
        if let Some(tracker) = &self.tracker {
            tracker.on_destroy(self.kind);
        }
        tracing::trace!(resource = %self.id, kind = %self.kind, "resource destroyed");
    }
}

/// Common behavior of every HAL object.
pub trait Resource: Send + Sync {
    /// The embedded resource header.
    fn header(&self) -> &ResourceHeader;

    /// Process-unique id of this resource.
    fn resource_id(&self) -> ResourceId {
        self.header().id()
    }

    /// Kind of this resource.
    fn resource_kind(&self) -> ResourceKind {
        self.header().kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct TestResource {
        header: ResourceHeader,
    }

    impl Resource for TestResource {
        fn header(&self) -> &ResourceHeader {
            &self.header
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ResourceHeader::new(ResourceKind::Buffer, None);
        let b = ResourceHeader::new(ResourceKind::Buffer, None);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_tracker_counts_lifecycle() {
        let tracker = Arc::new(ResourceTracker::new());
        let resource = Arc::new(TestResource {
            header: ResourceHeader::new(ResourceKind::Semaphore, Some(tracker.clone())),
        });
        assert_eq!(resource.resource_kind(), ResourceKind::Semaphore);

        let retained = resource.clone();
        drop(resource);
        assert_eq!(tracker.stats().live(ResourceKind::Semaphore), 1);

        drop(retained);
        let stats = tracker.stats();
        assert_eq!(stats.created(ResourceKind::Semaphore), 1);
        assert_eq!(stats.destroyed(ResourceKind::Semaphore), 1);
        assert_eq!(stats.total_live(), 0);
    }

    #[test]
    fn test_concurrent_release_destroys_once() {
        let tracker = Arc::new(ResourceTracker::new());
        let resource = Arc::new(TestResource {
            header: ResourceHeader::new(ResourceKind::Buffer, Some(tracker.clone())),
        });

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let local = resource.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let extra = local.clone();
                        drop(extra);
                    }
                })
            })
            .collect();
        drop(resource);
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.stats().destroyed(ResourceKind::Buffer), 1);
    }
}
