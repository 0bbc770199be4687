//! Shape validation of hook return values.
//!
//! Plugins return loosely typed script values. Once the worker hands a value
//! back it is converted to JSON and decoded here into model types; anything
//! that does not fit is reported as a human-readable detail string.

use chrono::{DateTime, FixedOffset, NaiveDate};
use lifewall_model::{CalculationResult, ElementKind, RenderElement, TextAlign};
use serde_json::{Map, Value};

type Object = Map<String, Value>;

/// Looks up the first present, non-null key among `names`.
fn field<'a>(obj: &'a Object, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|value| !value.is_null())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nothing",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_date_override(text: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text.trim()) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)?
        .and_local_timezone(offset)
        .single()
}

/// Decodes a `calculate()` return value. Bare dates are taken as midnight in
/// `offset`.
pub(crate) fn decode_calculation(value: &Value, offset: FixedOffset) -> Result<CalculationResult, String> {
    let Value::Object(obj) = value else {
        return Err(format!("expected an object, got {}", type_name(value)));
    };

    let current_date = match field(obj, &["current_date", "currentDate"]) {
        None => None,
        Some(Value::String(text)) => Some(
            parse_date_override(text, offset)
                .ok_or_else(|| format!("current_date '{text}' is not a YYYY-MM-DD or RFC 3339 date"))?,
        ),
        Some(other) => {
            return Err(format!("current_date must be a date string, got {}", type_name(other)));
        }
    };

    Ok(CalculationResult {
        current_date,
        data: field(obj, &["data"]).cloned(),
    })
}

fn number(obj: &Object, names: &[&str], index: usize) -> Result<Option<f64>, String> {
    match field(obj, names) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| format!("element {index}: {} must be a finite number, got {}", names[0], type_name(value))),
    }
}

fn required_number(obj: &Object, names: &[&str], index: usize) -> Result<f64, String> {
    number(obj, names, index)?.ok_or_else(|| format!("element {index}: missing {}", names[0]))
}

fn string(obj: &Object, names: &[&str], index: usize) -> Result<Option<String>, String> {
    match field(obj, names) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(format!(
            "element {index}: {} must be a string, got {}",
            names[0],
            type_name(other)
        )),
    }
}

fn decode_element(value: &Value, index: usize) -> Result<RenderElement, String> {
    let Value::Object(obj) = value else {
        return Err(format!("element {index}: expected an object, got {}", type_name(value)));
    };

    let kind = match string(obj, &["kind", "type"], index)?.as_deref() {
        None | Some("text") => ElementKind::Text,
        Some(other) => return Err(format!("element {index}: unsupported kind '{other}'")),
    };

    let content = match field(obj, &["content"]) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(format!("element {index}: content must be a string, got {}", type_name(other)));
        }
        None => return Err(format!("element {index}: missing content")),
    };

    let font_size = required_number(obj, &["font_size", "fontSize"], index)?;
    if font_size <= 0.0 {
        return Err(format!("element {index}: font_size must be positive"));
    }

    let align = match string(obj, &["align", "textAlign"], index)? {
        None => TextAlign::Left,
        Some(text) => text
            .parse::<TextAlign>()
            .map_err(|e| format!("element {index}: {e}"))?,
    };

    let max_width = number(obj, &["max_width", "maxWidth"], index)?;
    if max_width.is_some_and(|w| w <= 0.0) {
        return Err(format!("element {index}: max_width must be positive"));
    }

    Ok(RenderElement {
        kind,
        content,
        x: required_number(obj, &["x"], index)?,
        y: required_number(obj, &["y"], index)?,
        font_size,
        color: string(obj, &["color"], index)?.ok_or_else(|| format!("element {index}: missing color"))?,
        align,
        font_family: string(obj, &["font_family", "fontFamily"], index)?,
        max_width,
    })
}

/// Decodes a `render()` return value: an array of at most `max_elements`
/// text elements.
pub(crate) fn decode_render(value: &Value, max_elements: usize) -> Result<Vec<RenderElement>, String> {
    let Value::Array(items) = value else {
        return Err(format!("expected an array of elements, got {}", type_name(value)));
    };
    if items.len() > max_elements {
        return Err(format!(
            "{} elements returned, at most {} allowed",
            items.len(),
            max_elements
        ));
    }
    items
        .iter()
        .enumerate()
        .map(|(index, item)| decode_element(item, index))
        .collect()
}
