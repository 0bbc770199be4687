//! Plugin data model for Lifewall.
//!
//! Defines the types exchanged between the plugin sandbox and its
//! collaborators:
//! - [`PluginDefinition`] and [`ConfigSchema`]: what a plugin author submits
//! - [`PluginConfig`]: one end user's enable flag and setting overrides
//! - [`RequestContext`] and [`ViewMode`]: the per-request rendering inputs
//! - [`CalculationResult`] and [`RenderElement`]: what plugin hooks return
//!
//! Everything here is plain data with serde derives; no type in this crate
//! is executable.

mod context;
mod plugin;
mod result;
mod schema;

pub use context::{RequestContext, ViewMode};
pub use plugin::{PluginConfig, PluginDefinition, Settings};
pub use result::{CalculationResult, ElementKind, RenderElement, TextAlign};
pub use schema::{ConfigSchema, FieldDescriptor, FieldKind};

/// Errors raised when parsing model values from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("unknown view mode '{0}': expected life, year or month")]
    UnknownViewMode(String),

    #[error("unknown text alignment '{0}': expected left, center or right")]
    UnknownAlignment(String),
}
