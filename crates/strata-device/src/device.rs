//! The device contract every backend implements.

use crate::submission::SubmissionBatch;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use strata_core::allocator::Allocator;
use strata_core::buffer::Buffer;
use strata_core::buffer_view::BufferView;
use strata_core::element::ElementType;
use strata_core::error::Result;
use strata_core::executable::{Executable, ExecutableFormat};
use strata_core::layout::{self, DeviceSize, Dim};
use strata_core::resource::ResourceStats;
use strata_core::semaphore::{Semaphore, SemaphoreList, WaitMode};
use strata_core::time::{Deadline, Timeout};

/// Backend context composing an allocator, executable loaders and the
/// semaphore wait entry point.
pub trait Device: Debug + Send + Sync {
    /// Identifier of this device instance.
    fn identifier(&self) -> &str;

    /// Allocator backing buffers created through this device.
    fn allocator(&self) -> &dyn Allocator;

    /// Creates a timeline semaphore at `initial_value`.
    fn create_semaphore(&self, initial_value: u64) -> Result<Arc<dyn Semaphore>>;

    /// Waits until `list` resolves under `mode` or `timeout` expires.
    fn wait_semaphores(&self, mode: WaitMode, list: &SemaphoreList<'_>, timeout: Timeout)
        -> Result<()>;

    /// Loads a serialized module through the first loader supporting
    /// `format`.
    fn load_executable(&self, format: &ExecutableFormat, data: &[u8]) -> Result<Arc<Executable>>;

    /// Queues host work ordered by the batch's semaphores.
    fn queue_submit(&self, batch: SubmissionBatch) -> Result<()>;

    /// Blocks until every submitted batch has retired.
    fn wait_idle(&self, timeout: Timeout) -> Result<()>;

    /// Live and destroyed resource counts for objects created by this device.
    fn resource_stats(&self) -> ResourceStats;

    /// Allocates a zeroed buffer of `byte_length` bytes.
    fn allocate_buffer(&self, byte_length: DeviceSize) -> Result<Arc<Buffer>> {
        self.allocator().allocate_buffer(byte_length)
    }

    /// Allocates a buffer sized for `shape` and wraps it in a view.
    fn allocate_buffer_view(
        &self,
        shape: &[Dim],
        element_type: ElementType,
    ) -> Result<Arc<BufferView>> {
        let byte_length = layout::compute_view_size(shape, element_type)?;
        BufferView::new(self.allocate_buffer(byte_length)?, shape, element_type)
    }

    /// [`Device::wait_semaphores`] bounded by an absolute deadline.
    fn wait_semaphores_with_deadline(
        &self,
        mode: WaitMode,
        list: &SemaphoreList<'_>,
        deadline: Deadline,
    ) -> Result<()> {
        self.wait_semaphores(mode, list, Timeout::Deadline(deadline))
    }

    /// [`Device::wait_semaphores`] bounded by a duration from now.
    fn wait_semaphores_with_timeout(
        &self,
        mode: WaitMode,
        list: &SemaphoreList<'_>,
        timeout: Duration,
    ) -> Result<()> {
        self.wait_semaphores(mode, list, Timeout::Relative(timeout))
    }
}
