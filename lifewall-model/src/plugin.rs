//! Plugin definitions and per-user plugin configuration.

use crate::schema::ConfigSchema;
use serde::{Deserialize, Serialize};

/// Free-form settings bag, key -> JSON value.
pub type Settings = serde_json::Map<String, serde_json::Value>;

/// A plugin as submitted by its author and stored by the persistence layer.
///
/// The sandbox treats `source` as opaque, adversarial text on every run. The
/// `approved`/`enabled` flags belong to the marketplace collaborator and are
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDefinition {
    /// Unique slug, e.g. `"habit-streak"`.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config_schema: ConfigSchema,
    pub source: String,
    #[serde(default)]
    pub approved: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_true() -> bool {
    true
}

impl PluginDefinition {
    /// Minimal definition with only an id and source (for tooling and tests).
    pub fn from_source(id: impl Into<String>, source: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            author: String::new(),
            version: default_version(),
            description: String::new(),
            config_schema: ConfigSchema::default(),
            source: source.into(),
            approved: false,
            enabled: true,
        }
    }

    /// Settings for this plugin: schema defaults overlaid with `overrides`.
    /// Override keys the schema does not declare are kept as-is.
    pub fn resolve_settings(&self, overrides: &Settings) -> Settings {
        let mut settings = self.config_schema.defaults();
        for (key, value) in overrides {
            settings.insert(key.clone(), value.clone());
        }
        settings
    }
}

/// One end user's configuration of a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub plugin_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub settings: Settings,
}

impl PluginConfig {
    pub fn enabled(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            enabled: true,
            settings: Settings::new(),
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }
}
