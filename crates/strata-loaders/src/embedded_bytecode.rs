//! Loader for bytecode modules interpreted on the host.

use std::sync::Arc;
use strata_core::error::{HalError, Result};
use strata_core::executable::{Executable, ExecutableFormat, ExecutableLoader};
use strata_core::resource::ResourceTracker;

/// Offset of the 4-byte file identifier within a module.
const FILE_IDENTIFIER_OFFSET: usize = 4;

/// Owned copy of a bytecode module.
#[derive(Debug, Clone)]
pub struct BytecodeModule {
    bytes: Arc<[u8]>,
}

impl BytecodeModule {
    /// Raw module contents.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The 4 bytes at the file identifier position, if the module is long
    /// enough to have them.
    pub fn file_identifier(&self) -> Option<[u8; 4]> {
        self.bytes
            .get(FILE_IDENTIFIER_OFFSET..FILE_IDENTIFIER_OFFSET + 4)
            .and_then(|slice| slice.try_into().ok())
    }
}

/// Loads `bytecode` modules by copying them into an owned payload.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedBytecodeLoader {
    file_identifier: Option<[u8; 4]>,
    tracker: Option<Arc<ResourceTracker>>,
}

impl EmbeddedBytecodeLoader {
    /// Loader name reported in logs and on executables.
    pub const NAME: &'static str = "embedded-bytecode";

    /// Loader accepting any non-empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires modules to carry `identifier` at bytes 4..8.
    #[must_use]
    pub fn with_file_identifier(mut self, identifier: [u8; 4]) -> Self {
        self.file_identifier = Some(identifier);
        self
    }

    /// Reports loaded executables to `tracker`.
    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<ResourceTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    fn verify(&self, module: &BytecodeModule) -> Result<()> {
        if module.bytes.is_empty() {
            return Err(HalError::invalid_argument("bytecode module is empty"));
        }
        let Some(expected) = self.file_identifier else {
            return Ok(());
        };
        match module.file_identifier() {
            Some(found) if found == expected => Ok(()),
            Some(found) => Err(HalError::invalid_argument(format!(
                "bytecode file identifier mismatch: expected {:?}, found {:?}",
                String::from_utf8_lossy(&expected),
                String::from_utf8_lossy(&found)
            ))),
            None => Err(HalError::invalid_argument(format!(
                "bytecode module of {} bytes is too short to carry a file identifier",
                module.bytes.len()
            ))),
        }
    }
}

impl ExecutableLoader for EmbeddedBytecodeLoader {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn query_support(&self, format: &ExecutableFormat) -> bool {
        *format == ExecutableFormat::BYTECODE
    }

    fn try_load(&self, format: &ExecutableFormat, data: &[u8]) -> Result<Arc<Executable>> {
        if !self.query_support(format) {
            return Err(HalError::not_found(format!(
                "{} cannot load format '{format}'",
                Self::NAME
            )));
        }
        let module = BytecodeModule {
            bytes: Arc::from(data),
        };
        self.verify(&module)?;

        tracing::debug!(loader = Self::NAME, byte_length = data.len(), "bytecode module loaded");
        Ok(Executable::new(
            format.clone(),
            Self::NAME,
            data.len(),
            module,
            self.tracker.clone(),
        ))
    }
}
