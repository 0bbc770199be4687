//! Sandbox configuration: resource limits for every plugin invocation,
//! optionally read from a `sandbox.toml` file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid sandbox config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid limit: {0}")]
    InvalidLimit(String),
}

/// Resource limits applied to a single hook invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Wall-clock deadline per invocation in milliseconds.
    pub call_timeout_ms: u64,
    /// Maximum plugin source length in characters.
    pub max_source_len: usize,
    /// Interpreter operation budget per invocation; 0 leaves only the deadline.
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_function_expr_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
    /// Maximum elements a single `render()` call may return.
    pub max_render_elements: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            call_timeout_ms: crate::DEFAULT_CALL_TIMEOUT_MS,
            max_source_len: crate::validator::MAX_SOURCE_LEN,
            max_operations: 0,
            max_call_levels: 32,
            max_expr_depth: 64,
            max_function_expr_depth: 32,
            max_string_size: 64 * 1024,
            max_array_size: 10_000,
            max_map_size: 10_000,
            max_render_elements: 256,
        }
    }
}

impl ResourceLimits {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn with_timeout_ms(mut self, call_timeout_ms: u64) -> Self {
        self.call_timeout_ms = call_timeout_ms;
        self
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::InvalidLimit("call_timeout_ms must be positive".into()));
        }
        if self.max_source_len == 0 {
            return Err(ConfigError::InvalidLimit("max_source_len must be positive".into()));
        }
        if self.max_call_levels == 0 {
            return Err(ConfigError::InvalidLimit("max_call_levels must be positive".into()));
        }
        Ok(())
    }
}

/// Top-level sandbox configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub limits: ResourceLimits,
}

impl SandboxConfig {
    /// Parses a config from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.limits.check()?;
        Ok(config)
    }

    /// Reads and parses a config file, failing on any error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads a config file if present. A missing or malformed file falls back
    /// to the defaults with a warning.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No sandbox config at {:?}, using default limits", path);
            return Self::default();
        }

        match Self::from_file(path) {
            Ok(config) => {
                info!("Loaded sandbox config from {:?}", path);
                config
            }
            Err(e) => {
                warn!("{}. Falling back to default limits.", e);
                Self::default()
            }
        }
    }
}
