//! Loader for platform dynamic libraries (`.so`, `.dylib`, `.dll`).
//!
//! The module bytes are written to a temporary file which is then opened
//! with the platform loader. The library must export a query entry point
//! through which the backend discovers its kernels.

use libloading::Library;
use std::ffi::c_void;
use std::io::Write;
use std::sync::Arc;
use strata_core::error::{HalError, Result};
use strata_core::executable::{Executable, ExecutableFormat, ExecutableLoader};
use strata_core::resource::ResourceTracker;
use tempfile::{NamedTempFile, TempPath};

/// Entry point exported by executable libraries.
///
/// Receives the runtime's library interface version and returns a pointer to
/// the library header, or null when the version is unsupported.
pub type LibraryQueryFn = unsafe extern "C" fn(version: u32) -> *const c_void;

/// Symbol resolved when no other is configured.
pub const DEFAULT_QUERY_SYMBOL: &str = "strata_executable_library_query";

/// Dynamic library kept open for the lifetime of an executable.
#[derive(Debug)]
pub struct LoadedLibrary {
    // Declared before `path` so the library is closed before the file goes.
    library: Library,
    query: LibraryQueryFn,
    symbol: String,
    path: TempPath,
}

impl LoadedLibrary {
    /// The resolved query entry point. It stays valid while this library is
    /// alive.
    pub fn query_fn(&self) -> LibraryQueryFn {
        self.query
    }

    /// Name of the resolved query symbol.
    pub fn query_symbol(&self) -> &str {
        &self.symbol
    }

    /// Path of the temporary file backing the library.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// The underlying library handle.
    pub fn library(&self) -> &Library {
        &self.library
    }
}

/// Loads `dylib` modules through the platform dynamic loader.
#[derive(Debug, Clone)]
pub struct SystemLibraryLoader {
    query_symbol: String,
    tracker: Option<Arc<ResourceTracker>>,
}

impl SystemLibraryLoader {
    /// Loader name reported in logs and on executables.
    pub const NAME: &'static str = "system-library";

    /// Loader resolving [`DEFAULT_QUERY_SYMBOL`].
    pub fn new() -> Self {
        Self {
            query_symbol: DEFAULT_QUERY_SYMBOL.to_owned(),
            tracker: None,
        }
    }

    /// Resolves `symbol` instead of [`DEFAULT_QUERY_SYMBOL`].
    #[must_use]
    pub fn with_query_symbol<S: Into<String>>(mut self, symbol: S) -> Self {
        self.query_symbol = symbol.into();
        self
    }

    /// Reports loaded executables to `tracker`.
    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<ResourceTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    fn stage(data: &[u8]) -> Result<TempPath> {
        let mut file = tempfile::Builder::new()
            .prefix("strata-executable-")
            .suffix(std::env::consts::DLL_SUFFIX)
            .tempfile()
            .map_err(|err| HalError::unavailable(format!("failed to create temporary library file: {err}")))?;
        file.write_all(data)
            .and_then(|()| file.flush())
            .map_err(|err| HalError::unavailable(format!("failed to write temporary library file: {err}")))?;
        Ok(NamedTempFile::into_temp_path(file))
    }

    #[allow(unsafe_code)]
    fn open(&self, path: TempPath) -> Result<LoadedLibrary> {
        // SAFETY: loading runs the library's initializers. Executable
        // libraries are produced by the compiler and are trusted to the same
        // degree as the code that submits work to the device.
        let library = unsafe { Library::new(path.as_os_str()) }.map_err(|err| {
            HalError::unavailable(format!(
                "failed to open dynamic library {}: {err}",
                path.display()
            ))
        })?;

        // SAFETY: the symbol is only ever called through `LibraryQueryFn`,
        // and the pointer is stored next to the library that owns it.
        let query = unsafe {
            library
                .get::<LibraryQueryFn>(self.query_symbol.as_bytes())
                .map(|symbol| *symbol)
        }
        .map_err(|err| {
            HalError::not_found(format!(
                "query symbol '{}' not exported by library: {err}",
                self.query_symbol
            ))
        })?;

        Ok(LoadedLibrary {
            library,
            query,
            symbol: self.query_symbol.clone(),
            path,
        })
    }
}

impl Default for SystemLibraryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutableLoader for SystemLibraryLoader {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn query_support(&self, format: &ExecutableFormat) -> bool {
        *format == ExecutableFormat::DYNAMIC_LIBRARY
    }

    fn try_load(&self, format: &ExecutableFormat, data: &[u8]) -> Result<Arc<Executable>> {
        if !self.query_support(format) {
            return Err(HalError::not_found(format!(
                "{} cannot load format '{format}'",
                Self::NAME
            )));
        }
        if data.is_empty() {
            return Err(HalError::invalid_argument("dynamic library module is empty"));
        }

        let path = Self::stage(data)?;
        let loaded = self.open(path)?;
        tracing::debug!(
            loader = Self::NAME,
            byte_length = data.len(),
            path = %loaded.path().display(),
            symbol = %loaded.query_symbol(),
            "dynamic library loaded"
        );
        Ok(Executable::new(
            format.clone(),
            Self::NAME,
            data.len(),
            loaded,
            self.tracker.clone(),
        ))
    }
}
