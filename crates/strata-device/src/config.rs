//! Device configuration.
//!
//! A [`DeviceConfig`] decides, once at construction, how a device allocates
//! memory, how many host workers run queue submissions, and which executable
//! loaders it consults in order.

use once_cell::sync::Lazy;
use std::fmt;
use std::time::Duration;
use strata_core::error::{HalError, Result};
use strata_core::layout::DeviceSize;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Executable loaders a device can register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum LoaderKind {
    /// Platform dynamic libraries (`dylib` format)
    SystemLibrary,
    /// Host-interpreted bytecode (`bytecode` format)
    EmbeddedBytecode,
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SystemLibrary => write!(f, "system-library"),
            Self::EmbeddedBytecode => write!(f, "embedded-bytecode"),
        }
    }
}

/// Configuration of a host device.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    /// Identifier reported by the device and its allocator
    pub identifier: String,
    /// Host threads running queue submissions
    pub worker_count: usize,
    /// Allocator byte limit; unbounded when absent
    pub max_memory: Option<DeviceSize>,
    /// Loaders in the order they are consulted
    pub loaders: Vec<LoaderKind>,
    /// Whether loaded executables are cached by content
    pub cache_executables: bool,
    /// Bound on how long a submission waits for its wait semaphores,
    /// measured from `queue_submit`; unbounded when absent
    pub submission_wait_timeout: Option<Duration>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            identifier: "local-host".to_owned(),
            worker_count: num_cpus::get(),
            max_memory: None,
            loaders: vec![LoaderKind::EmbeddedBytecode, LoaderKind::SystemLibrary],
            cache_executables: true,
            submission_wait_timeout: None,
        }
    }
}

impl DeviceConfig {
    /// Starts a builder from the defaults.
    pub fn builder() -> DeviceConfigBuilder {
        DeviceConfigBuilder::new()
    }

    /// Checks the values a device cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.identifier.is_empty() {
            return Err(HalError::invalid_argument("device identifier is empty"));
        }
        if self.worker_count == 0 {
            return Err(HalError::invalid_argument(
                "device needs at least one submission worker",
            ));
        }
        if let Some(duplicate) = self
            .loaders
            .iter()
            .enumerate()
            .find_map(|(i, kind)| self.loaders[..i].contains(kind).then_some(kind))
        {
            return Err(HalError::invalid_argument(format!(
                "loader {duplicate} is listed more than once"
            )));
        }
        Ok(())
    }

    /// Parses a configuration from JSON; missing fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| HalError::invalid_argument(format!("invalid device config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to pretty-printed JSON.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| HalError::invalid_argument(format!("unserializable device config: {err}")))
    }
}

/// Process-wide default configuration.
pub static DEFAULT_DEVICE_CONFIG: Lazy<DeviceConfig> = Lazy::new(DeviceConfig::default);

/// Get the default device configuration.
pub fn default_device_config() -> &'static DeviceConfig {
    &DEFAULT_DEVICE_CONFIG
}

/// Builder for creating a custom device configuration.
#[derive(Debug, Clone)]
pub struct DeviceConfigBuilder {
    config: DeviceConfig,
}

impl DeviceConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: default_device_config().clone(),
        }
    }

    /// Set the device identifier.
    pub fn identifier<S: Into<String>>(mut self, identifier: S) -> Self {
        self.config.identifier = identifier.into();
        self
    }

    /// Set the number of submission workers.
    pub fn worker_count(mut self, worker_count: usize) -> Self {
        self.config.worker_count = worker_count;
        self
    }

    /// Bound the allocator to `max_memory` bytes.
    pub fn max_memory(mut self, max_memory: DeviceSize) -> Self {
        self.config.max_memory = Some(max_memory);
        self
    }

    /// Replace the loader list.
    pub fn loaders<I: IntoIterator<Item = LoaderKind>>(mut self, loaders: I) -> Self {
        self.config.loaders = loaders.into_iter().collect();
        self
    }

    /// Enable or disable the executable cache.
    pub fn cache_executables(mut self, enabled: bool) -> Self {
        self.config.cache_executables = enabled;
        self
    }

    /// Bound submission waits to `timeout`.
    pub fn submission_wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.submission_wait_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> DeviceConfig {
        self.config
    }
}

impl Default for DeviceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = default_device_config();
        assert_eq!(config.identifier, "local-host");
        assert!(config.worker_count >= 1);
        assert!(config.cache_executables);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = DeviceConfig::builder()
            .identifier("test")
            .worker_count(2)
            .max_memory(1 << 20)
            .loaders([LoaderKind::EmbeddedBytecode])
            .cache_executables(false)
            .submission_wait_timeout(Duration::from_secs(1))
            .build();
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.max_memory, Some(1 << 20));
        assert_eq!(config.loaders, vec![LoaderKind::EmbeddedBytecode]);
        assert_eq!(config.submission_wait_timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_validation() {
        let config = DeviceConfig::builder().worker_count(0).build();
        assert!(config.validate().is_err());

        let config = DeviceConfig::builder()
            .loaders([LoaderKind::SystemLibrary, LoaderKind::SystemLibrary])
            .build();
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json() {
        let config = DeviceConfig::from_json(
            r#"{ "identifier": "json", "worker_count": 3, "loaders": ["embedded-bytecode"] }"#,
        )
        .unwrap();
        assert_eq!(config.identifier, "json");
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.loaders, vec![LoaderKind::EmbeddedBytecode]);
        assert!(config.cache_executables);

        assert!(DeviceConfig::from_json(r#"{ "worker_count": 0 }"#).is_err());
        assert!(DeviceConfig::from_json("not json").is_err());
    }
}
