//! Host queue submissions.

use std::fmt;
use std::sync::Arc;
use strata_core::error::Result;
use strata_core::semaphore::{Semaphore, SemaphoreSet};

/// Work item run by a submission worker.
pub type WorkFn = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// One unit of queued host work and the timeline points around it.
///
/// The batch stays parked until every wait semaphore reaches its value; a
/// worker then runs the work item and signals every signal semaphore. If
/// waiting or the work fails, every signal semaphore is failed with that
/// error instead. Batches may be submitted before the batches that signal
/// their waits.
pub struct SubmissionBatch {
    pub(crate) wait: SemaphoreSet,
    pub(crate) signal: SemaphoreSet,
    pub(crate) work: WorkFn,
}

impl SubmissionBatch {
    /// Batch running `work` with no semaphores attached.
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        Self {
            wait: SemaphoreSet::new(),
            signal: SemaphoreSet::new(),
            work: Box::new(work),
        }
    }

    /// Batch that only moves the timeline.
    pub fn barrier() -> Self {
        Self::new(|| Ok(()))
    }

    /// Waits for `semaphore` to reach `value` before running.
    #[must_use]
    pub fn wait_on(mut self, semaphore: Arc<dyn Semaphore>, value: u64) -> Self {
        self.wait.push(semaphore, value);
        self
    }

    /// Signals `semaphore` to `value` once the work succeeds.
    #[must_use]
    pub fn signal(mut self, semaphore: Arc<dyn Semaphore>, value: u64) -> Self {
        self.signal.push(semaphore, value);
        self
    }

    /// Semaphores waited on before the work runs.
    pub fn wait_semaphores(&self) -> &SemaphoreSet {
        &self.wait
    }

    /// Semaphores resolved after the work runs.
    pub fn signal_semaphores(&self) -> &SemaphoreSet {
        &self.signal
    }
}

impl fmt::Debug for SubmissionBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionBatch")
            .field("wait", &self.wait)
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}
