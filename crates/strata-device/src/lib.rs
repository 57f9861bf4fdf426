//! Device contract and host backend of the strata HAL.
//!
//! A [`Device`] composes an allocator, an ordered set of executable loaders
//! and the semaphore wait entry point. [`HostDevice`] implements it with host
//! memory, host timeline semaphores and a worker pool that runs queued work
//! between wait and signal semaphores.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use strata_core::semaphore::{SemaphoreSet, WaitMode};
//! use strata_device::{Device, DeviceConfig, HostDevice, SubmissionBatch};
//!
//! let device = HostDevice::new(DeviceConfig::builder().worker_count(2).build()).unwrap();
//! let done = device.create_semaphore(0).unwrap();
//! device
//!     .queue_submit(SubmissionBatch::new(|| Ok(())).signal(done.clone(), 1))
//!     .unwrap();
//!
//! let set = SemaphoreSet::new().with(done, 1);
//! device
//!     .wait_semaphores_with_timeout(WaitMode::All, &set.as_list(), Duration::from_secs(5))
//!     .unwrap();
//! ```

pub mod config;
pub mod device;
pub mod host;
mod scheduler;
pub mod submission;

pub use config::{default_device_config, DeviceConfig, DeviceConfigBuilder, LoaderKind};
pub use device::Device;
pub use host::HostDevice;
pub use submission::{SubmissionBatch, WorkFn};
