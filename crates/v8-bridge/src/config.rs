//! Worker configuration.
//!
//! Hosts usually build a [`WorkerConfig`] in code, but it can also be read
//! from a TOML file such as:
//!
//! ```toml
//! enable_print = false
//! heap_initial_mb = 1
//! heap_max_mb = 64
//! stack_trace_limit = 20
//! ```

use std::path::Path;

use deno_core::v8;
use serde::{Deserialize, Serialize};

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("heap_max_mb ({max}) is smaller than heap_initial_mb ({initial})")]
    InvalidHeapLimits { initial: usize, max: usize },
}

/// Per-worker settings applied when the isolate is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Write `$print` output to stdout. When false it only reaches the log.
    pub enable_print: bool,
    /// Initial heap size in MB (0 = engine default)
    pub heap_initial_mb: usize,
    /// Maximum heap size in MB (0 = engine default)
    pub heap_max_mb: usize,
    /// Stack frames captured for uncaught exceptions
    pub stack_trace_limit: i32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enable_print: true,
            heap_initial_mb: 0,
            heap_max_mb: 0,
            stack_trace_limit: 10,
        }
    }
}

impl WorkerConfig {
    /// Default configuration with `$print` switched on or off.
    pub fn with_print(enable_print: bool) -> Self {
        Self {
            enable_print,
            ..Self::default()
        }
    }

    /// Parse a configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: WorkerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Check that the heap limits are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heap_max_mb != 0 && self.heap_max_mb < self.heap_initial_mb {
            return Err(ConfigError::InvalidHeapLimits {
                initial: self.heap_initial_mb,
                max: self.heap_max_mb,
            });
        }
        Ok(())
    }

    pub(crate) fn create_params(&self) -> v8::CreateParams {
        let params = v8::CreateParams::default();
        if self.heap_max_mb == 0 {
            return params;
        }
        params.heap_limits(self.heap_initial_mb * 1024 * 1024, self.heap_max_mb * 1024 * 1024)
    }
}
