//! Error types for the plugin host.

use crate::hook::Hook;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse failure category, stable across releases and safe to surface to
/// plugin authors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationFailure,
    MissingEntryPoint,
    RuntimeError,
    Timeout,
    InvalidResult,
    UnknownPlugin,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PluginError {
    #[error("validation failed: {}", .violations.join("; "))]
    ValidationFailed { violations: Vec<String> },

    #[error("plugin must export a {hook}() function")]
    MissingEntryPoint { hook: Hook },

    #[error("{message}")]
    Runtime { message: String },

    #[error("timeout: plugin exceeded {timeout_ms}ms deadline")]
    Timeout { timeout_ms: u64 },

    #[error("invalid {hook}() result: {detail}")]
    InvalidResult { hook: Hook, detail: String },

    #[error("unknown plugin: {plugin_id}")]
    UnknownPlugin { plugin_id: String },
}

impl PluginError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationFailed { .. } => ErrorKind::ValidationFailure,
            Self::MissingEntryPoint { .. } => ErrorKind::MissingEntryPoint,
            Self::Runtime { .. } => ErrorKind::RuntimeError,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidResult { .. } => ErrorKind::InvalidResult,
            Self::UnknownPlugin { .. } => ErrorKind::UnknownPlugin,
        }
    }

    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }
}

/// A recorded failure for one plugin, as surfaced in a batch report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginFailure {
    /// The hook that failed, or `None` when the plugin never reached a hook
    /// (unknown id, validation, compilation).
    pub hook: Option<Hook>,
    pub kind: ErrorKind,
    pub message: String,
}

impl PluginFailure {
    pub fn new(hook: Option<Hook>, error: &PluginError) -> Self {
        Self {
            hook,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
