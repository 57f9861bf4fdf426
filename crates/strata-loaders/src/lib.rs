//! Executable loaders for the strata HAL.
//!
//! - [`EmbeddedBytecodeLoader`]: keeps an owned copy of a `bytecode` module
//!   for host interpretation.
//! - [`SystemLibraryLoader`]: opens `dylib` modules with the platform
//!   dynamic loader (feature `system-library`, on by default).

pub mod embedded_bytecode;
#[cfg(feature = "system-library")]
pub mod system_library;

pub use embedded_bytecode::{BytecodeModule, EmbeddedBytecodeLoader};
#[cfg(feature = "system-library")]
pub use system_library::{LibraryQueryFn, LoadedLibrary, SystemLibraryLoader, DEFAULT_QUERY_SYMBOL};
