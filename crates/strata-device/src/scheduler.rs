//! Submission scheduling for the host device.
//!
//! Batches whose wait semaphores are not yet satisfied are parked here
//! instead of occupying a pool worker. One scheduler thread watches every
//! parked wait list through a shared [`WaitNotifier`] and moves a batch onto
//! the worker pool once its waits resolve, fail or time out. Pool workers
//! never block on semaphores.

use crate::submission::SubmissionBatch;
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use strata_core::error::{HalError, Result};
use strata_core::semaphore::{poll_semaphores, WaitMode, WaitNotifier};
use strata_core::time::{Deadline, Timeout};

/// Count of batches submitted but not yet retired.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        *self.count.lock() += 1;
        InFlightGuard {
            in_flight: self.clone(),
        }
    }

    pub(crate) fn count(&self) -> usize {
        *self.count.lock()
    }

    pub(crate) fn wait_idle(&self, timeout: Timeout) -> Result<()> {
        let deadline = timeout.to_deadline();
        let mut count = self.count.lock();
        while *count > 0 {
            if deadline.has_elapsed() {
                return Err(HalError::DeadlineExceeded);
            }
            match deadline.instant() {
                None => self.idle.wait(&mut count),
                Some(instant) => {
                    let _ = self.idle.wait_until(&mut count, instant);
                }
            }
        }
        Ok(())
    }
}

/// Retires one batch when dropped, even if its work panicked.
struct InFlightGuard {
    in_flight: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.in_flight.count.lock();
        *count -= 1;
        if *count == 0 {
            self.in_flight.idle.notify_all();
        }
    }
}

/// A batch waiting for its wait list to resolve.
struct PendingBatch {
    batch: SubmissionBatch,
    deadline: Deadline,
    _guard: InFlightGuard,
}

impl PendingBatch {
    /// `None` while the batch must keep waiting, otherwise the outcome of
    /// its waits.
    fn poll(&self) -> Option<Result<()>> {
        match poll_semaphores(WaitMode::All, &self.batch.wait.as_list()) {
            Ok(true) => Some(Ok(())),
            Ok(false) if self.deadline.has_elapsed() => Some(Err(HalError::DeadlineExceeded)),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }

    fn subscribe(&self, notifier: &Arc<WaitNotifier>) {
        for semaphore in self.batch.wait.as_list().semaphores() {
            semaphore.subscribe(notifier);
        }
    }

    fn unsubscribe(&self, notifier: &Arc<WaitNotifier>) {
        for semaphore in self.batch.wait.as_list().semaphores() {
            semaphore.unsubscribe(notifier);
        }
    }

    /// Runs the work if the waits succeeded, then resolves the signal list.
    fn retire(self, waited: Result<()>) {
        let Self { batch, _guard, .. } = self;
        let SubmissionBatch { signal, work, .. } = batch;

        let outcome = waited.and_then(|()| {
            panic::catch_unwind(AssertUnwindSafe(work))
                .unwrap_or_else(|_| Err(HalError::unknown("submitted work panicked")))
        });

        match outcome {
            Ok(()) => {
                if let Err(err) = signal.as_list().signal_all() {
                    tracing::warn!(%err, "failed to signal submission semaphores");
                } else {
                    tracing::trace!(signaled = signal.len(), "submission retired");
                }
            }
            Err(err) => {
                tracing::debug!(%err, failed = signal.len(), "submission failed");
                signal.as_list().fail_all(&err);
            }
        }
    }
}

#[derive(Default)]
struct QueueState {
    pending: Vec<PendingBatch>,
    shutdown: bool,
}

struct Shared {
    notifier: Arc<WaitNotifier>,
    state: Mutex<QueueState>,
    pool: rayon::ThreadPool,
}

impl Shared {
    /// Removes every batch that is ready, keeping submission order.
    ///
    /// Returns the ready batches, the earliest deadline among those still
    /// parked, and whether the scheduler is shutting down.
    fn take_ready(&self) -> (Vec<(PendingBatch, Result<()>)>, Deadline, bool) {
        let mut state = self.state.lock();
        let mut ready = Vec::new();
        let mut earliest: Option<Instant> = None;
        for entry in std::mem::take(&mut state.pending) {
            match entry.poll() {
                Some(waited) => ready.push((entry, waited)),
                None => {
                    if let Deadline::At(instant) = entry.deadline {
                        earliest = Some(earliest.map_or(instant, |current| current.min(instant)));
                    }
                    state.pending.push(entry);
                }
            }
        }
        let next = earliest.map_or(Deadline::InfiniteFuture, Deadline::At);
        (ready, next, state.shutdown)
    }

    fn dispatch(&self, entry: PendingBatch, waited: Result<()>) {
        entry.unsubscribe(&self.notifier);
        self.pool.spawn(move || entry.retire(waited));
    }

    fn run(&self) {
        loop {
            let seen = self.notifier.epoch();
            let (ready, next_deadline, shutdown) = self.take_ready();
            for (entry, waited) in ready {
                self.dispatch(entry, waited);
            }
            if shutdown {
                self.abandon_pending();
                return;
            }
            self.notifier.wait_for_change(seen, next_deadline);
        }
    }

    fn abandon_pending(&self) {
        let abandoned = std::mem::take(&mut self.state.lock().pending);
        if abandoned.is_empty() {
            return;
        }
        tracing::warn!(
            abandoned = abandoned.len(),
            "device dropped with submissions still waiting"
        );
        let err = HalError::unavailable("device dropped before the submission's waits resolved");
        for entry in abandoned {
            entry.unsubscribe(&self.notifier);
            entry.retire(Err(err.clone()));
        }
    }
}

/// Parks submissions until they are ready and runs them on a worker pool.
pub(crate) struct Scheduler {
    shared: Arc<Shared>,
    in_flight: Arc<InFlight>,
    wait_timeout: Timeout,
    thread: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Starts the scheduler thread and `worker_count` pool workers, all
    /// named after `name`.
    pub(crate) fn new(name: &str, worker_count: usize, wait_timeout: Timeout) -> Result<Self> {
        let thread_prefix = name.to_owned();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(move |index| format!("{thread_prefix}-worker-{index}"))
            .build()
            .map_err(|err| {
                HalError::unavailable(format!("failed to start submission workers: {err}"))
            })?;

        let shared = Arc::new(Shared {
            notifier: WaitNotifier::new(),
            state: Mutex::new(QueueState::default()),
            pool,
        });
        let runner = shared.clone();
        let thread = thread::Builder::new()
            .name(format!("{name}-scheduler"))
            .spawn(move || runner.run())
            .map_err(|err| {
                HalError::unavailable(format!("failed to start submission scheduler: {err}"))
            })?;

        Ok(Self {
            shared,
            in_flight: Arc::new(InFlight::default()),
            wait_timeout,
            thread: Some(thread),
        })
    }

    /// Parks `batch` until its wait list resolves.
    pub(crate) fn submit(&self, batch: SubmissionBatch) {
        let entry = PendingBatch {
            batch,
            deadline: self.wait_timeout.to_deadline(),
            _guard: self.in_flight.enter(),
        };
        entry.subscribe(&self.shared.notifier);
        self.shared.state.lock().pending.push(entry);
        self.shared.notifier.notify();
    }

    pub(crate) fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub(crate) fn pending(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.shared.pool.current_num_threads()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.notifier.notify();
        if let Some(handle) = self.thread.take() {
            // Work dropped on the scheduler thread may hold the last device
            // reference; that thread cannot join itself.
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                tracing::error!("submission scheduler thread panicked");
            }
        }
    }
}
