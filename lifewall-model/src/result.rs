//! Values returned by plugin hooks, after shape validation.

use crate::ModelError;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ---- Calculation hook ----

/// Output of a plugin's `calculate` hook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    /// Replaces the wallpaper's effective date when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_date: Option<DateTime<FixedOffset>>,
    /// Opaque plugin data, exposed only under this plugin's id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

// ---- Render hook ----

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    #[default]
    Text,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl FromStr for TextAlign {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            _ => Err(ModelError::UnknownAlignment(s.to_string())),
        }
    }
}

/// A drawable text primitive handed to the compositor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderElement {
    #[serde(default)]
    pub kind: ElementKind,
    pub content: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub color: String,
    #[serde(default)]
    pub align: TextAlign,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<f64>,
}

impl RenderElement {
    pub fn text(content: impl Into<String>, x: f64, y: f64, font_size: f64, color: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Text,
            content: content.into(),
            x,
            y,
            font_size,
            color: color.into(),
            align: TextAlign::Left,
            font_family: None,
            max_width: None,
        }
    }

    pub fn aligned(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_element_json_shape() {
        let el = RenderElement::text("Day 42", 585.0, 1266.0, 48.0, "#fff").aligned(TextAlign::Center);
        let value = serde_json::to_value(&el).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "text",
                "content": "Day 42",
                "x": 585.0,
                "y": 1266.0,
                "font_size": 48.0,
                "color": "#fff",
                "align": "center"
            })
        );
    }

    #[test]
    fn calculation_result_skips_empty_fields() {
        let value = serde_json::to_value(CalculationResult::default()).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn alignment_parse() {
        assert_eq!("right".parse::<TextAlign>().unwrap(), TextAlign::Right);
        assert!("justify".parse::<TextAlign>().is_err());
    }
}
