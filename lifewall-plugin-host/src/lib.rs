//! Plugin sandbox for Lifewall.
//!
//! Screens third-party plugin source, runs its `calculate`/`render` hooks in
//! a Rhai interpreter bound only to an audited capability table, and merges
//! the results for the wallpaper compositor.
//!
//! Each hook invocation gets its own interpreter on its own worker thread,
//! a fresh read-only context, and a wall-clock deadline enforced by a
//! progress hook between interpreter operations. Every failure is scoped to
//! the plugin that caused it.

mod cache;
mod capabilities;
mod config;
mod context;
mod decode;
mod error;
mod hook;
mod merge;
mod orchestrator;
mod sandbox;
mod script;
mod validator;

pub use cache::ScriptCache;
pub use capabilities::{ALLOWLIST, Capability, CapabilityKind, CapabilityRegistry, CapabilitySource, PLUGIN_LOG_TARGET};
pub use config::{ConfigError, ResourceLimits, SandboxConfig};
pub use context::{BuiltContext, ContextWarning, ExecutionContext, build_context, build_context_at, context_for_request};
pub use error::{ErrorKind, PluginError, PluginFailure};
pub use hook::Hook;
pub use merge::{MergedCalculation, merge_calculations, merge_renders};
pub use orchestrator::{PluginOrchestrator, ProcessReport};
pub use sandbox::{
    CompiledScript, ExecutionOutcome, HookOutput, InvocationMetrics, InvocationReport, InvocationState,
    PluginSandbox,
};
pub use validator::{MAX_SOURCE_LEN, SourceValidator, ValidationReport, validate};

/// Default wall-clock budget for a single hook invocation.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 500;
