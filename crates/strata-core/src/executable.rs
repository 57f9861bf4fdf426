//! Executables and the loaders that produce them.
//!
//! A loader turns a serialized kernel module into an [`Executable`]. Each
//! backend registers the loaders it supports and picks the first one that
//! accepts a module's format.

use crate::error::Result;
use crate::resource::{Resource, ResourceHeader, ResourceKind, ResourceTracker};
use std::any::Any;
use std::borrow::Cow;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Name of a serialized module format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutableFormat(Cow<'static, str>);

impl ExecutableFormat {
    /// Platform dynamic library exporting a query entry point.
    pub const DYNAMIC_LIBRARY: Self = Self(Cow::Borrowed("dylib"));
    /// Bytecode module interpreted on the host.
    pub const BYTECODE: Self = Self(Cow::Borrowed("bytecode"));

    /// Wraps an arbitrary format name.
    pub fn new<S: Into<Cow<'static, str>>>(name: S) -> Self {
        Self(name.into())
    }

    /// The format name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for ExecutableFormat {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

/// Loaded kernel module.
///
/// The payload is opaque to the HAL core; the loader that produced the
/// executable knows its concrete type.
pub struct Executable {
    header: ResourceHeader,
    format: ExecutableFormat,
    loader: &'static str,
    byte_length: usize,
    payload: Box<dyn Any + Send + Sync>,
}

impl Executable {
    /// Wraps a loader-specific payload.
    pub fn new<P: Any + Send + Sync>(
        format: ExecutableFormat,
        loader: &'static str,
        byte_length: usize,
        payload: P,
        tracker: Option<Arc<ResourceTracker>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            header: ResourceHeader::new(ResourceKind::Executable, tracker),
            format,
            loader,
            byte_length,
            payload: Box::new(payload),
        })
    }

    /// Format the module was loaded as.
    pub fn format(&self) -> &ExecutableFormat {
        &self.format
    }

    /// Name of the loader that produced this executable.
    pub fn loader(&self) -> &'static str {
        self.loader
    }

    /// Size of the serialized module it was loaded from.
    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    /// Borrows the payload as `P`, if that is its type.
    pub fn payload<P: Any>(&self) -> Option<&P> {
        self.payload.downcast_ref::<P>()
    }
}

impl Resource for Executable {
    fn header(&self) -> &ResourceHeader {
        &self.header
    }
}

impl Debug for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executable")
            .field("id", &self.header.id())
            .field("format", &self.format)
            .field("loader", &self.loader)
            .field("byte_length", &self.byte_length)
            .finish_non_exhaustive()
    }
}

/// Turns serialized modules into executables.
pub trait ExecutableLoader: Debug + Send + Sync {
    /// Short loader name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this loader accepts modules in `format`.
    fn query_support(&self, format: &ExecutableFormat) -> bool;

    /// Loads `data`. Callers check [`ExecutableLoader::query_support`] first.
    fn try_load(&self, format: &ExecutableFormat, data: &[u8]) -> Result<Arc<Executable>>;
}
