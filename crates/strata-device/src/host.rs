//! Host device: CPU memory, host semaphores and a worker pool for queued
//! work.

use crate::config::{DeviceConfig, LoaderKind};
use crate::device::Device;
use crate::scheduler::Scheduler;
use crate::submission::SubmissionBatch;
use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use strata_core::allocator::{Allocator, HeapAllocator};
use strata_core::error::{HalError, Result};
use strata_core::executable::{Executable, ExecutableFormat, ExecutableLoader};
use strata_core::resource::{Resource, ResourceKind, ResourceStats, ResourceTracker};
use strata_core::semaphore::{wait_semaphores, HostSemaphore, Semaphore, SemaphoreList, WaitMode};
use strata_core::time::Timeout;
use strata_loaders::EmbeddedBytecodeLoader;

/// Cache key of a loaded module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ExecutableKey {
    format: ExecutableFormat,
    byte_length: usize,
    content_hash: u64,
}

impl ExecutableKey {
    fn new(format: &ExecutableFormat, data: &[u8]) -> Self {
        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);
        Self {
            format: format.clone(),
            byte_length: data.len(),
            content_hash: hasher.finish(),
        }
    }
}

/// Device backed by host memory and host threads.
pub struct HostDevice {
    config: DeviceConfig,
    tracker: Arc<ResourceTracker>,
    allocator: HeapAllocator,
    loaders: Vec<Arc<dyn ExecutableLoader>>,
    executable_cache: DashMap<ExecutableKey, Arc<Executable>>,
    scheduler: Scheduler,
}

impl HostDevice {
    /// Creates a device from `config`.
    pub fn new(config: DeviceConfig) -> Result<Self> {
        config.validate()?;

        let tracker = Arc::new(ResourceTracker::new());
        let allocator = HeapAllocator::with_options(
            config.identifier.clone(),
            config.max_memory,
            Some(tracker.clone()),
        );
        let loaders = config
            .loaders
            .iter()
            .map(|&kind| create_loader(kind, &tracker))
            .collect::<Result<Vec<_>>>()?;

        let wait_timeout = config
            .submission_wait_timeout
            .map_or(Timeout::INFINITE, Timeout::Relative);
        let scheduler = Scheduler::new(&config.identifier, config.worker_count, wait_timeout)?;

        tracing::debug!(
            device = %config.identifier,
            workers = config.worker_count,
            loaders = ?config.loaders,
            max_memory = ?config.max_memory,
            "host device created"
        );

        Ok(Self {
            config,
            tracker,
            allocator,
            loaders,
            executable_cache: DashMap::new(),
            scheduler,
        })
    }

    /// Creates a device from [`default_device_config`](crate::config::default_device_config).
    pub fn with_default_config() -> Result<Self> {
        Self::new(crate::config::default_device_config().clone())
    }

    /// Configuration the device was created with.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Tracker receiving lifecycle events of everything this device creates.
    pub fn tracker(&self) -> &Arc<ResourceTracker> {
        &self.tracker
    }

    /// Names of the registered loaders, in lookup order.
    pub fn loader_names(&self) -> Vec<&'static str> {
        self.loaders.iter().map(|loader| loader.name()).collect()
    }

    /// Number of cached executables.
    pub fn cached_executables(&self) -> usize {
        self.executable_cache.len()
    }

    /// Drops every cached executable.
    pub fn clear_executable_cache(&self) {
        self.executable_cache.clear();
    }

    /// Number of submitted batches still waiting on their semaphores.
    pub fn pending_submissions(&self) -> usize {
        self.scheduler.pending()
    }
}

fn create_loader(kind: LoaderKind, tracker: &Arc<ResourceTracker>) -> Result<Arc<dyn ExecutableLoader>> {
    match kind {
        LoaderKind::EmbeddedBytecode => Ok(Arc::new(
            EmbeddedBytecodeLoader::new().with_tracker(tracker.clone()),
        )),
        #[cfg(feature = "system-library")]
        LoaderKind::SystemLibrary => Ok(Arc::new(
            strata_loaders::SystemLibraryLoader::new().with_tracker(tracker.clone()),
        )),
        #[cfg(not(feature = "system-library"))]
        LoaderKind::SystemLibrary => Err(HalError::unavailable(
            "system library loader is not compiled in; enable the `system-library` feature",
        )),
    }
}

impl Device for HostDevice {
    fn identifier(&self) -> &str {
        &self.config.identifier
    }

    fn allocator(&self) -> &dyn Allocator {
        &self.allocator
    }

    fn create_semaphore(&self, initial_value: u64) -> Result<Arc<dyn Semaphore>> {
        Ok(HostSemaphore::new(initial_value, Some(self.tracker.clone())))
    }

    fn wait_semaphores(
        &self,
        mode: WaitMode,
        list: &SemaphoreList<'_>,
        timeout: Timeout,
    ) -> Result<()> {
        wait_semaphores(mode, list, timeout)
    }

    #[tracing::instrument(skip(self, data), fields(device = %self.config.identifier, byte_length = data.len()))]
    fn load_executable(&self, format: &ExecutableFormat, data: &[u8]) -> Result<Arc<Executable>> {
        let key = self
            .config
            .cache_executables
            .then(|| ExecutableKey::new(format, data));
        if let Some(cached) = key.as_ref().and_then(|key| self.executable_cache.get(key)) {
            tracing::trace!(executable = %cached.resource_id(), "executable cache hit");
            return Ok(cached.clone());
        }

        let loader = self
            .loaders
            .iter()
            .find(|loader| loader.query_support(format))
            .ok_or_else(|| {
                HalError::not_found(format!(
                    "no loader registered for executable format '{format}'"
                ))
            })?;
        let executable = loader.try_load(format, data)?;
        tracing::debug!(
            loader = loader.name(),
            executable = %executable.resource_id(),
            "executable loaded"
        );

        if let Some(key) = key {
            return Ok(self
                .executable_cache
                .entry(key)
                .or_insert(executable)
                .clone());
        }
        Ok(executable)
    }

    fn queue_submit(&self, batch: SubmissionBatch) -> Result<()> {
        tracing::trace!(
            device = %self.config.identifier,
            waits = batch.wait.len(),
            signals = batch.signal.len(),
            "queue submit"
        );
        self.scheduler.submit(batch);
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(device = %self.config.identifier))]
    fn wait_idle(&self, timeout: Timeout) -> Result<()> {
        self.scheduler.in_flight().wait_idle(timeout)
    }

    fn resource_stats(&self) -> ResourceStats {
        self.tracker.stats()
    }
}

impl fmt::Debug for HostDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostDevice")
            .field("identifier", &self.config.identifier)
            .field("workers", &self.scheduler.worker_count())
            .field("loaders", &self.loader_names())
            .field("allocator", &self.allocator.statistics())
            .finish_non_exhaustive()
    }
}

impl Drop for HostDevice {
    fn drop(&mut self) {
        let in_flight = self.scheduler.in_flight().count();
        if in_flight > 0 {
            // Batches still waiting are failed by the scheduler on drop;
            // running ones finish detached.
            tracing::warn!(
                device = %self.config.identifier,
                in_flight,
                "device dropped with submissions still running"
            );
        }
        self.executable_cache.clear();

        let stats = self.tracker.stats();
        for kind in ResourceKind::ALL {
            let live = stats.live(kind);
            if live > 0 {
                tracing::warn!(
                    device = %self.config.identifier,
                    %kind,
                    live,
                    "resources outlive their device"
                );
            }
        }
    }
}
