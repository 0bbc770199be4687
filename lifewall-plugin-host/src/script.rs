//! Script-facing view of an [`ExecutionContext`].
//!
//! Exposed to plugins as a `Context` object with read-only properties; no
//! setters are registered, so assignments to `ctx.*` fail at runtime.

use crate::context::ExecutionContext;
use crate::error::PluginError;
use chrono::Datelike;
use rhai::{Dynamic, Engine, INT, ImmutableString, Map};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub(crate) struct ScriptContext {
    inner: Arc<ExecutionContext>,
    settings: Map,
}

impl ScriptContext {
    pub(crate) fn new(context: ExecutionContext) -> Result<Self, PluginError> {
        let settings = rhai::serde::to_dynamic(&context.settings)
            .map_err(|e| PluginError::runtime(format!("settings cannot be passed to the plugin: {e}")))?
            .try_cast::<Map>()
            .ok_or_else(|| PluginError::runtime("settings did not convert to a map"))?;
        Ok(Self {
            inner: Arc::new(context),
            settings,
        })
    }
}

fn optional_string(value: Option<String>) -> Dynamic {
    value.map(Dynamic::from).unwrap_or(Dynamic::UNIT)
}

pub(crate) fn register_context_type(engine: &mut Engine) {
    engine
        .register_type_with_name::<ScriptContext>("Context")
        .register_get("current_date", |c: &mut ScriptContext| c.inner.current_date.to_rfc3339())
        .register_get("birth_date", |c: &mut ScriptContext| {
            optional_string(c.inner.birth_date.map(|d| d.format("%Y-%m-%d").to_string()))
        })
        .register_get("width", |c: &mut ScriptContext| c.inner.width as INT)
        .register_get("height", |c: &mut ScriptContext| c.inner.height as INT)
        .register_get("view_mode", |c: &mut ScriptContext| c.inner.view_mode.as_str().to_string())
        .register_get("settings", |c: &mut ScriptContext| c.settings.clone())
        .register_get("timezone", |c: &mut ScriptContext| optional_string(c.inner.timezone.clone()))
        .register_get("year", |c: &mut ScriptContext| c.inner.today().year() as INT)
        .register_get("month", |c: &mut ScriptContext| c.inner.today().month() as INT)
        .register_get("day", |c: &mut ScriptContext| c.inner.today().day() as INT)
        .register_get("day_of_year", |c: &mut ScriptContext| c.inner.day_of_year() as INT)
        .register_get("weeks_lived", |c: &mut ScriptContext| {
            c.inner.weeks_lived().map(Dynamic::from).unwrap_or(Dynamic::UNIT)
        })
        .register_fn("format_date", |c: &mut ScriptContext, pattern: ImmutableString| {
            c.inner.format_date(&pattern)
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::build_context_at;
    use chrono::{TimeZone, Utc};
    use lifewall_model::{Settings, ViewMode};
    use serde_json::json;

    #[test]
    fn settings_become_a_script_map() {
        let mut settings = Settings::new();
        settings.insert("label".into(), json!("hi"));
        settings.insert("nested".into(), json!({"size": 3}));
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let built = build_context_at(now, None, 10, 20, ViewMode::Life, settings, None);

        let script = ScriptContext::new(built.context).unwrap();
        assert_eq!(script.settings.len(), 2);
        assert_eq!(script.settings["label"].clone().into_string().unwrap(), "hi");
        assert!(script.settings["nested"].is_map());
    }
}
