//! Buffer allocators.
//!
//! An [`Allocator`] is the source of truth for the validity window of the
//! memory behind its buffers. [`HeapAllocator`] backs buffers with
//! zero-initialised host memory and optionally enforces a byte limit.

use crate::buffer::{Buffer, HostMemory};
use crate::error::{HalError, Result};
use crate::layout::DeviceSize;
use crate::resource::{Resource, ResourceTracker};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;

/// Allocation statistics reported by an allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Bytes currently backing live allocations
    pub bytes_in_use: DeviceSize,
    /// Highest value `bytes_in_use` has reached
    pub peak_bytes_in_use: DeviceSize,
    /// Number of live allocations
    pub live_allocations: usize,
    /// Number of allocations ever made
    pub total_allocations: usize,
    /// Byte limit, if any
    pub max_bytes: Option<DeviceSize>,
}

/// Source of device memory for buffers.
pub trait Allocator: Debug + Send + Sync {
    /// Human readable identifier.
    fn identifier(&self) -> &str;

    /// Allocates a buffer of `byte_length` bytes.
    fn allocate_buffer(&self, byte_length: DeviceSize) -> Result<Arc<Buffer>>;

    /// Current statistics.
    fn statistics(&self) -> AllocatorStats;
}

/// Shared accounting between a heap allocator and the memory it handed out.
#[derive(Debug)]
pub(crate) struct HeapAccounting {
    stats: Mutex<AllocatorStats>,
}

impl HeapAccounting {
    fn reserve(&self, byte_length: DeviceSize) -> Result<()> {
        let mut stats = self.stats.lock();
        let requested = stats.bytes_in_use.checked_add(byte_length);
        match (requested, stats.max_bytes) {
            (Some(total), Some(max)) if total > max => {
                return Err(HalError::resource_exhausted(format!(
                    "allocator limit exceeded: {} + {} > {}",
                    stats.bytes_in_use, byte_length, max
                )));
            }
            (None, _) => {
                return Err(HalError::resource_exhausted(
                    "allocation size overflows the device size type",
                ));
            }
            (Some(total), _) => {
                stats.bytes_in_use = total;
                stats.peak_bytes_in_use = stats.peak_bytes_in_use.max(total);
                stats.live_allocations += 1;
                stats.total_allocations += 1;
            }
        }
        Ok(())
    }

    pub(crate) fn release(&self, byte_length: DeviceSize) {
        let mut stats = self.stats.lock();
        stats.bytes_in_use = stats.bytes_in_use.saturating_sub(byte_length);
        stats.live_allocations = stats.live_allocations.saturating_sub(1);
    }
}

#[derive(Debug)]
struct HeapAllocatorInner {
    identifier: String,
    accounting: Arc<HeapAccounting>,
    tracker: Option<Arc<ResourceTracker>>,
}

/// Host heap allocator.
///
/// Cloning produces another handle to the same allocator; buffers keep a
/// handle so `buffer.allocator()` always reaches the allocator that made them.
#[derive(Debug, Clone)]
pub struct HeapAllocator {
    inner: Arc<HeapAllocatorInner>,
}

impl HeapAllocator {
    /// Creates an unbounded allocator.
    pub fn new<S: Into<String>>(identifier: S) -> Self {
        Self::with_options(identifier, None, None)
    }

    /// Creates an allocator with an optional byte limit that reports buffer
    /// lifecycles to `tracker`.
    pub fn with_options<S: Into<String>>(
        identifier: S,
        max_bytes: Option<DeviceSize>,
        tracker: Option<Arc<ResourceTracker>>,
    ) -> Self {
        let stats = AllocatorStats {
            max_bytes,
            ..AllocatorStats::default()
        };
        Self {
            inner: Arc::new(HeapAllocatorInner {
                identifier: identifier.into(),
                accounting: Arc::new(HeapAccounting {
                    stats: Mutex::new(stats),
                }),
                tracker,
            }),
        }
    }
}

impl Allocator for HeapAllocator {
    fn identifier(&self) -> &str {
        &self.inner.identifier
    }

    fn allocate_buffer(&self, byte_length: DeviceSize) -> Result<Arc<Buffer>> {
        let host_length = usize::try_from(byte_length).map_err(|_| {
            HalError::resource_exhausted(format!(
                "allocation of {byte_length} bytes exceeds host address space"
            ))
        })?;
        self.inner.accounting.reserve(byte_length)?;

        let memory = HostMemory::new(host_length, Some(self.inner.accounting.clone()));
        let buffer = Buffer::new(
            Arc::new(self.clone()),
            Arc::new(memory),
            0,
            byte_length,
            self.inner.tracker.clone(),
        );
        tracing::debug!(
            allocator = %self.inner.identifier,
            buffer = %buffer.resource_id(),
            byte_length,
            "buffer allocated"
        );
        Ok(Arc::new(buffer))
    }

    fn statistics(&self) -> AllocatorStats {
        *self.inner.accounting.stats.lock()
    }
}
