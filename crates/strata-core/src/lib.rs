//! Resource, buffer view and timeline semaphore core of the strata HAL.
//!
//! Every backend shares this object model. Objects are reference counted
//! with `Arc`, memory is described by typed views with exact byte layout
//! arithmetic, and CPU and device work order themselves through timeline
//! semaphores that can be waited on singly or in ANY/ALL batches.
//!
//! # Modules
//!
//! - [`allocator`]: allocator trait and the host heap allocator
//! - [`buffer`]: device memory handles and host access
//! - [`buffer_view`]: typed, shaped views over buffers
//! - [`element`]: element type encoding
//! - [`error`]: status codes and the HAL error type
//! - [`executable`]: loaded modules and the loader trait
//! - [`layout`]: dense row-major layout arithmetic
//! - [`resource`]: resource ids, kinds and lifecycle tracking
//! - [`semaphore`]: timeline semaphores and multi-waits
//! - [`time`]: deadlines and timeouts

pub mod allocator;
pub mod buffer;
pub mod buffer_view;
pub mod element;
pub mod error;
pub mod executable;
pub mod layout;
pub mod resource;
pub mod semaphore;
pub mod time;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{HalError, Result, StatusCode};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use strata_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::allocator::{Allocator, AllocatorStats, HeapAllocator};
    pub use crate::buffer::Buffer;
    pub use crate::buffer_view::{parse_shape_and_element_type, BufferView};
    pub use crate::element::{ElementType, NumericalType};
    pub use crate::error::{HalError, Result, StatusCode};
    pub use crate::executable::{Executable, ExecutableFormat, ExecutableLoader};
    pub use crate::layout::{DeviceSize, Dim};
    pub use crate::resource::{Resource, ResourceId, ResourceKind, ResourceStats, ResourceTracker};
    pub use crate::semaphore::{
        wait_semaphores, HostSemaphore, Semaphore, SemaphoreList, SemaphoreSet, WaitMode,
        WaitNotifier,
    };
    pub use crate::time::{Deadline, Timeout};
}
