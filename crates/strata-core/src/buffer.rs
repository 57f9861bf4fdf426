//! Device memory buffers.
//!
//! A [`Buffer`] is a window `[byte_offset, byte_offset + byte_length)` into a
//! backing allocation. Subspans share the parent's allocation, which lives
//! until the last buffer referencing it is destroyed.
//!
//! The internal lock only keeps individual host reads and writes memory-safe.
//! Ordering producers and consumers of the contents is the caller's job and
//! is done with semaphores.

use crate::allocator::{Allocator, HeapAccounting};
use crate::error::{HalError, Result};
use crate::layout::DeviceSize;
use crate::resource::{Resource, ResourceHeader, ResourceKind, ResourceTracker};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Host-addressable backing memory of one allocation.
pub(crate) struct HostMemory {
    bytes: RwLock<Box<[u8]>>,
    accounting: Option<Arc<HeapAccounting>>,
}

impl HostMemory {
    pub(crate) fn new(byte_length: usize, accounting: Option<Arc<HeapAccounting>>) -> Self {
        Self {
            bytes: RwLock::new(vec![0u8; byte_length].into_boxed_slice()),
            accounting,
        }
    }

    fn len(&self) -> usize {
        self.bytes.read().len()
    }
}

impl Drop for HostMemory {
    fn drop(&mut self) {
        if let Some(accounting) = &self.accounting {
            accounting.release(self.bytes.get_mut().len() as DeviceSize);
        }
    }
}

/// Handle to a device memory allocation.
pub struct Buffer {
    header: ResourceHeader,
    allocator: Arc<dyn Allocator>,
    memory: Arc<HostMemory>,
    byte_offset: DeviceSize,
    byte_length: DeviceSize,
}

impl Buffer {
    pub(crate) fn new(
        allocator: Arc<dyn Allocator>,
        memory: Arc<HostMemory>,
        byte_offset: DeviceSize,
        byte_length: DeviceSize,
        tracker: Option<Arc<ResourceTracker>>,
    ) -> Self {
        Self {
            header: ResourceHeader::new(ResourceKind::Buffer, tracker),
            allocator,
            memory,
            byte_offset,
            byte_length,
        }
    }

    /// Allocator that owns the backing memory.
    pub fn allocator(&self) -> &Arc<dyn Allocator> {
        &self.allocator
    }

    /// Length of this buffer in bytes.
    pub fn byte_length(&self) -> DeviceSize {
        self.byte_length
    }

    /// Offset of this buffer within its backing allocation.
    pub fn byte_offset(&self) -> DeviceSize {
        self.byte_offset
    }

    /// Size of the whole backing allocation.
    pub fn allocation_size(&self) -> DeviceSize {
        self.memory.len() as DeviceSize
    }

    /// Whether two buffers share the same backing allocation.
    pub fn shares_allocation_with(&self, other: &Buffer) -> bool {
        Arc::ptr_eq(&self.memory, &other.memory)
    }

    /// Creates a buffer aliasing `[byte_offset, byte_offset + byte_length)` of this one.
    pub fn subspan(&self, byte_offset: DeviceSize, byte_length: DeviceSize) -> Result<Arc<Buffer>> {
        self.check_range(byte_offset, byte_length)?;
        Ok(Arc::new(Buffer::new(
            self.allocator.clone(),
            self.memory.clone(),
            self.byte_offset + byte_offset,
            byte_length,
            self.header.tracker().cloned(),
        )))
    }

    /// Copies `data.len()` bytes starting at `byte_offset` into `data`.
    pub fn read(&self, byte_offset: DeviceSize, data: &mut [u8]) -> Result<()> {
        let range = self.host_range(byte_offset, data.len() as DeviceSize)?;
        data.copy_from_slice(&self.memory.bytes.read()[range]);
        Ok(())
    }

    /// Reads `byte_length` bytes starting at `byte_offset` into a new vector.
    pub fn read_to_vec(&self, byte_offset: DeviceSize, byte_length: DeviceSize) -> Result<Vec<u8>> {
        let range = self.host_range(byte_offset, byte_length)?;
        Ok(self.memory.bytes.read()[range].to_vec())
    }

    /// Copies `data` into the buffer starting at `byte_offset`.
    pub fn write(&self, byte_offset: DeviceSize, data: &[u8]) -> Result<()> {
        let range = self.host_range(byte_offset, data.len() as DeviceSize)?;
        self.memory.bytes.write()[range].copy_from_slice(data);
        Ok(())
    }

    /// Repeats a 1, 2 or 4 byte `pattern` over `byte_length` bytes.
    pub fn fill(&self, byte_offset: DeviceSize, byte_length: DeviceSize, pattern: &[u8]) -> Result<()> {
        if !matches!(pattern.len(), 1 | 2 | 4) {
            return Err(HalError::invalid_argument(format!(
                "fill patterns must be 1, 2 or 4 bytes; got {}",
                pattern.len()
            )));
        }
        if byte_length % pattern.len() as DeviceSize != 0 {
            return Err(HalError::invalid_argument(format!(
                "fill length {byte_length} is not a multiple of the {} byte pattern",
                pattern.len()
            )));
        }
        let range = self.host_range(byte_offset, byte_length)?;
        let mut bytes = self.memory.bytes.write();
        for chunk in bytes[range].chunks_exact_mut(pattern.len()) {
            chunk.copy_from_slice(pattern);
        }
        Ok(())
    }

    /// Copies `byte_length` bytes from `source` at `source_offset` to this
    /// buffer at `target_offset`. Overlapping ranges of a shared allocation
    /// are handled.
    pub fn copy_from(
        &self,
        source: &Buffer,
        source_offset: DeviceSize,
        target_offset: DeviceSize,
        byte_length: DeviceSize,
    ) -> Result<()> {
        let source_range = source.host_range(source_offset, byte_length)?;
        let target_range = self.host_range(target_offset, byte_length)?;

        if self.shares_allocation_with(source) {
            self.memory
                .bytes
                .write()
                .copy_within(source_range, target_range.start);
        } else {
            // Staged so that at most one allocation lock is held at a time.
            let staged = source.memory.bytes.read()[source_range].to_vec();
            self.memory.bytes.write()[target_range].copy_from_slice(&staged);
        }
        Ok(())
    }

    fn check_range(&self, byte_offset: DeviceSize, byte_length: DeviceSize) -> Result<()> {
        match byte_offset.checked_add(byte_length) {
            Some(end) if end <= self.byte_length => Ok(()),
            _ => Err(HalError::out_of_range(format!(
                "byte range [{byte_offset}, {byte_offset}+{byte_length}) exceeds buffer length {}",
                self.byte_length
            ))),
        }
    }

    fn host_range(
        &self,
        byte_offset: DeviceSize,
        byte_length: DeviceSize,
    ) -> Result<std::ops::Range<usize>> {
        self.check_range(byte_offset, byte_length)?;
        // Both ends fit: they are bounded by an allocation that exists in host memory.
        let start = (self.byte_offset + byte_offset) as usize;
        Ok(start..start + byte_length as usize)
    }
}

impl Resource for Buffer {
    fn header(&self) -> &ResourceHeader {
        &self.header
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.header.id())
            .field("allocator", &self.allocator.identifier())
            .field("byte_offset", &self.byte_offset)
            .field("byte_length", &self.byte_length)
            .finish()
    }
}
