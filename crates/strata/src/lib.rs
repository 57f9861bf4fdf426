//! Hardware abstraction runtime core.
//!
//! `strata` runs precompiled compute kernels behind one object model shared
//! by every backend:
//!
//! - reference-counted resources (`Arc` plus lifecycle tracking);
//! - [`Buffer`](buffer::Buffer)s and typed, shaped
//!   [`BufferView`](buffer_view::BufferView)s with exact layout math;
//! - timeline [`Semaphore`](semaphore::Semaphore)s with sticky failure
//!   and ANY/ALL multi-waits bounded by deadlines or timeouts;
//! - executable loaders for dynamic libraries and embedded bytecode;
//! - a [`Device`](device::Device) tying them together, with a host backend.
//!
//! # Example
//! ```
//! use strata::prelude::*;
//!
//! let device = HostDevice::new(DeviceConfig::builder().worker_count(1).build()).unwrap();
//! let view = device.allocate_buffer_view(&[2, 3], ElementType::FLOAT_32).unwrap();
//! assert_eq!(view.byte_length(), 24);
//! assert_eq!(view.compute_offset(&[1, 2]).unwrap(), 20);
//!
//! let semaphore = device.create_semaphore(0).unwrap();
//! semaphore.signal(1).unwrap();
//! semaphore.wait(1, Timeout::IMMEDIATE).unwrap();
//! ```

pub use strata_core::{
    allocator, buffer, buffer_view, element, error, executable, layout, resource, semaphore, time,
};
pub use strata_device as device;
pub use strata_loaders as loaders;

pub use strata_core::{HalError, Result, StatusCode};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use strata::prelude::*;
/// ```
pub mod prelude {
    pub use strata_core::prelude::*;
    pub use strata_device::{
        default_device_config, Device, DeviceConfig, DeviceConfigBuilder, HostDevice, LoaderKind,
        SubmissionBatch,
    };
    pub use strata_loaders::{BytecodeModule, EmbeddedBytecodeLoader};
    #[cfg(feature = "system-library")]
    pub use strata_loaders::SystemLibraryLoader;
}
