//! Fixtures shared by unit, integration and downstream crate tests.

use crate::allocator::{Allocator, HeapAllocator};
use crate::buffer::Buffer;
use crate::buffer_view::BufferView;
use crate::element::ElementType;
use crate::error::{HalError, Result};
use crate::layout::{self, DeviceSize, Dim};
use crate::resource::{ResourceStats, ResourceTracker};
use crate::semaphore::{HostSemaphore, Semaphore};
use crate::time::Timeout;
use std::sync::Arc;
use std::thread;

/// Allocator paired with the tracker that sees every resource it creates.
#[derive(Debug, Clone)]
pub struct TestFixture {
    /// Tracker shared by everything the fixture creates
    pub tracker: Arc<ResourceTracker>,
    /// Unbounded heap allocator reporting to `tracker`
    pub allocator: HeapAllocator,
}

impl TestFixture {
    /// Fresh tracker and an allocator bound to it.
    pub fn new() -> Self {
        let tracker = Arc::new(ResourceTracker::new());
        let allocator = HeapAllocator::with_options("test", None, Some(tracker.clone()));
        Self { tracker, allocator }
    }

    /// Snapshot of the fixture's resource counters.
    pub fn stats(&self) -> ResourceStats {
        self.tracker.stats()
    }

    /// Zeroed buffer of `byte_length` bytes.
    pub fn buffer(&self, byte_length: DeviceSize) -> Result<Arc<Buffer>> {
        self.allocator.allocate_buffer(byte_length)
    }

    /// Buffer whose byte `i` holds `i % 256`.
    pub fn iota_buffer(&self, byte_length: DeviceSize) -> Result<Arc<Buffer>> {
        let buffer = self.buffer(byte_length)?;
        buffer.write(0, &iota_bytes(byte_length))?;
        Ok(buffer)
    }

    /// View of `shape` over a freshly allocated iota buffer.
    pub fn iota_view(&self, shape: &[Dim], element_type: ElementType) -> Result<Arc<BufferView>> {
        let byte_length = layout::compute_view_size(shape, element_type)?;
        BufferView::new(self.iota_buffer(byte_length)?, shape, element_type)
    }

    /// Host semaphore at `initial_value`, tracked by the fixture.
    pub fn semaphore(&self, initial_value: u64) -> Arc<HostSemaphore> {
        HostSemaphore::new(initial_value, Some(self.tracker.clone()))
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// `len` bytes counting up from zero and wrapping at 256.
pub fn iota_bytes(len: DeviceSize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

/// Bounces a token between the calling thread and a helper thread.
///
/// The caller signals `forward` to `i` and waits for `backward` to reach
/// `i`; the helper does the opposite. Returns the final values of both
/// semaphores.
pub fn ping_pong(
    forward: Arc<dyn Semaphore>,
    backward: Arc<dyn Semaphore>,
    rounds: u64,
    timeout: Timeout,
) -> Result<(u64, u64)> {
    let helper = {
        let forward = forward.clone();
        let backward = backward.clone();
        thread::spawn(move || -> Result<()> {
            for round in 1..=rounds {
                forward.wait(round, timeout)?;
                backward.signal(round)?;
            }
            Ok(())
        })
    };

    let mut outcome = Ok(());
    for round in 1..=rounds {
        outcome = forward
            .signal(round)
            .and_then(|()| backward.wait(round, timeout));
        if outcome.is_err() {
            forward.fail(HalError::unknown("ping-pong aborted"));
            break;
        }
    }
    let helper_outcome = helper
        .join()
        .unwrap_or_else(|_| Err(HalError::unknown("ping-pong helper panicked")));
    outcome?;
    helper_outcome?;
    Ok((forward.query()?, backward.query()?))
}
