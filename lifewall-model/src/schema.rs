//! Plugin configuration schema.
//!
//! The schema documents a plugin's settings surface and supplies defaults.
//! It is not used to reject user overrides.

use crate::plugin::Settings;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Array,
    Color,
}

impl FieldKind {
    /// Value used when a descriptor omits its default.
    pub fn fallback_default(&self) -> Value {
        match self {
            Self::String => Value::String(String::new()),
            Self::Number => Value::from(0),
            Self::Boolean => Value::Bool(false),
            Self::Array => Value::Array(Vec::new()),
            Self::Color => Value::String("#ffffff".to_string()),
        }
    }
}

/// Describes one configurable setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Allowed values for enum-like string fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Value>,
    /// Display labels parallel to `options`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub option_labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl FieldDescriptor {
    pub fn new(kind: FieldKind, default: Value) -> Self {
        Self {
            kind,
            default: Some(default),
            label: None,
            description: None,
            options: Vec::new(),
            option_labels: Vec::new(),
            min: None,
            max: None,
            step: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_range(mut self, min: f64, max: f64, step: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self.step = Some(step);
        self
    }

    pub fn with_options(mut self, options: Vec<Value>) -> Self {
        self.options = options;
        self
    }

    pub fn default_value(&self) -> Value {
        self.default
            .clone()
            .unwrap_or_else(|| self.kind.fallback_default())
    }
}

/// Mapping from setting key to its descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigSchema {
    fields: BTreeMap<String, FieldDescriptor>,
}

impl ConfigSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, descriptor: FieldDescriptor) {
        self.fields.insert(key.into(), descriptor);
    }

    pub fn get(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldDescriptor)> {
        self.fields.iter()
    }

    /// Default settings derived from every descriptor.
    pub fn defaults(&self) -> Settings {
        self.fields
            .iter()
            .map(|(key, field)| (key.clone(), field.default_value()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn defaults_fall_back_per_kind() {
        let schema: ConfigSchema = serde_json::from_value(json!({
            "title": {"kind": "string", "default": "Hello"},
            "size": {"kind": "number", "min": 10, "max": 200, "step": 2},
            "show": {"kind": "boolean"},
            "tags": {"kind": "array"},
            "tint": {"kind": "color"}
        }))
        .unwrap();

        let defaults = schema.defaults();
        assert_eq!(defaults["title"], json!("Hello"));
        assert_eq!(defaults["size"], json!(0));
        assert_eq!(defaults["show"], json!(false));
        assert_eq!(defaults["tags"], json!([]));
        assert_eq!(defaults["tint"], json!("#ffffff"));
    }

    #[test]
    fn constraints_round_trip_through_json() {
        let mut schema = ConfigSchema::new();
        schema.insert(
            "position",
            FieldDescriptor::new(FieldKind::String, json!("bottom"))
                .with_label("Position")
                .with_options(vec![json!("top"), json!("bottom")]),
        );
        schema.insert(
            "opacity",
            FieldDescriptor::new(FieldKind::Number, json!(0.8)).with_range(0.0, 1.0, 0.1),
        );

        let text = serde_json::to_string(&schema).unwrap();
        let back: ConfigSchema = serde_json::from_str(&text).unwrap();
        assert_eq!(back, schema);
        assert_eq!(back.get("opacity").unwrap().max, Some(1.0));
        assert_eq!(back.len(), 2);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let parsed: Result<ConfigSchema, _> =
            serde_json::from_value(json!({"x": {"kind": "datetime"}}));
        assert!(parsed.is_err());
    }
}
