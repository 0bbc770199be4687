//! Folding per-plugin hook results into what the compositor consumes.

use chrono::{DateTime, FixedOffset};
use lifewall_model::{CalculationResult, RenderElement};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedCalculation {
    /// The date the wallpaper is generated for.
    pub effective_date: DateTime<FixedOffset>,
    /// Which plugin set `effective_date`; `None` if no plugin overrode it.
    pub date_source: Option<String>,
    /// Each plugin's data bag under its own id.
    pub plugin_data: BTreeMap<String, Value>,
}

/// Merges calculation results in processing order. The last result that
/// sets a date wins.
pub fn merge_calculations<'a>(
    base_date: DateTime<FixedOffset>,
    results: impl IntoIterator<Item = (&'a str, &'a CalculationResult)>,
) -> MergedCalculation {
    let mut merged = MergedCalculation {
        effective_date: base_date,
        date_source: None,
        plugin_data: BTreeMap::new(),
    };

    for (plugin_id, result) in results {
        if let Some(date) = result.current_date {
            merged.effective_date = date;
            merged.date_source = Some(plugin_id.to_string());
        }
        if let Some(data) = &result.data {
            merged.plugin_data.insert(plugin_id.to_string(), data.clone());
        }
    }
    merged
}

/// Concatenates render output in processing order.
pub fn merge_renders<'a>(results: impl IntoIterator<Item = (&'a str, &'a [RenderElement])>) -> Vec<RenderElement> {
    results
        .into_iter()
        .flat_map(|(_, elements)| elements.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn date(text: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(text).unwrap()
    }

    #[test]
    fn last_writer_wins() {
        let a = CalculationResult {
            current_date: Some(date("2024-01-01T00:00:00Z")),
            data: Some(json!({"from": "a"})),
        };
        let b = CalculationResult::default();
        let c = CalculationResult {
            current_date: Some(date("2025-06-15T00:00:00Z")),
            data: Some(json!([1, 2, 3])),
        };

        let merged = merge_calculations(date("2024-03-10T12:00:00Z"), [("a", &a), ("b", &b), ("c", &c)]);

        assert_eq!(merged.effective_date, date("2025-06-15T00:00:00Z"));
        assert_eq!(merged.date_source.as_deref(), Some("c"));
        assert_eq!(merged.plugin_data.len(), 2);
        assert_eq!(merged.plugin_data["a"], json!({"from": "a"}));
        assert_eq!(merged.plugin_data["c"], json!([1, 2, 3]));
    }

    #[test]
    fn no_overrides_keeps_base() {
        let base = date("2024-03-10T12:00:00+01:00");
        let merged = merge_calculations(base, std::iter::empty());
        assert_eq!(merged.effective_date, base);
        assert_eq!(merged.date_source, None);
        assert!(merged.plugin_data.is_empty());
    }

    #[test]
    fn renders_concatenate_in_order() {
        let first = vec![
            RenderElement::text("1", 0.0, 0.0, 10.0, "#000"),
            RenderElement::text("2", 0.0, 0.0, 10.0, "#000"),
        ];
        let second = vec![RenderElement::text("3", 0.0, 0.0, 10.0, "#000")];
        let merged = merge_renders([("x", first.as_slice()), ("y", &[][..]), ("z", second.as_slice())]);
        let contents: Vec<_> = merged.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["1", "2", "3"]);
    }
}
