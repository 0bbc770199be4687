//! The capability allowlist: the complete set of names a plugin can reach.
//!
//! Plugin scripts run on a bare interpreter (`Engine::new_raw`). Only the
//! packages and host functions listed in [`ALLOWLIST`] are bound into it, so
//! adding a capability means editing this table. There is no network,
//! filesystem, process, timer, `eval` or module-import capability.

use lifewall_calendar::CalendarError;
use rhai::packages::{
    ArithmeticPackage, BasicArrayPackage, BasicIteratorPackage, BasicMapPackage, BasicMathPackage,
    BasicStringPackage, LogicPackage, MoreStringPackage, Package,
};
use rhai::{Dynamic, Engine, EvalAltResult, INT, ImmutableString, Module, Shared};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Tracing target for everything plugins log.
pub const PLUGIN_LOG_TARGET: &str = "lifewall::plugin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Operators,
    Math,
    Date,
    Json,
    String,
    Array,
    Object,
    Iteration,
    Logger,
}

/// Where a capability comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilitySource {
    /// A built-in interpreter package.
    Package,
    /// A function implemented by the host.
    HostFunction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capability {
    pub name: &'static str,
    pub kind: CapabilityKind,
    pub source: CapabilitySource,
    pub summary: &'static str,
}

const fn package(name: &'static str, kind: CapabilityKind, summary: &'static str) -> Capability {
    Capability {
        name,
        kind,
        source: CapabilitySource::Package,
        summary,
    }
}

const fn host_fn(name: &'static str, kind: CapabilityKind, summary: &'static str) -> Capability {
    Capability {
        name,
        kind,
        source: CapabilitySource::HostFunction,
        summary,
    }
}

/// Every capability bound into a plugin's scope.
pub const ALLOWLIST: &[Capability] = &[
    // Interpreter packages
    package("arithmetic", CapabilityKind::Operators, "integer and float arithmetic operators"),
    package("logic", CapabilityKind::Operators, "comparison and boolean operators"),
    package("math", CapabilityKind::Math, "trigonometry, rounding, powers, parsing numbers"),
    package("string", CapabilityKind::String, "string basics and print/debug formatting"),
    package("string-extras", CapabilityKind::String, "search, slicing, case, padding, splitting"),
    package("array", CapabilityKind::Array, "array construction, mapping, filtering, sorting"),
    package("map", CapabilityKind::Object, "object maps: keys, values, merging"),
    package("range", CapabilityKind::Iteration, "numeric ranges for for-loops"),
    // Host functions
    host_fn("format_date", CapabilityKind::Date, "format a date with YYYY/MM/DD tokens"),
    host_fn("day_of_year", CapabilityKind::Date, "1-based day of the year of a date"),
    host_fn("weeks_lived", CapabilityKind::Date, "whole weeks between a birth date and a date"),
    host_fn("add_days", CapabilityKind::Date, "shift a date by a number of days"),
    host_fn("days_between", CapabilityKind::Date, "signed day distance between two dates"),
    host_fn("weekday", CapabilityKind::Date, "English weekday name of a date"),
    host_fn("json_encode", CapabilityKind::Json, "serialize a value to JSON text"),
    host_fn("json_decode", CapabilityKind::Json, "parse JSON text into a value"),
    host_fn("log_info", CapabilityKind::Logger, "log a message tagged with the plugin id"),
    host_fn("log_warn", CapabilityKind::Logger, "log a warning tagged with the plugin id"),
    host_fn("log_error", CapabilityKind::Logger, "log an error tagged with the plugin id"),
    host_fn("print", CapabilityKind::Logger, "routed to log_info"),
    host_fn("debug", CapabilityKind::Logger, "routed to the host debug log"),
];

/// The allowlist, materialized once and shared by reference with every
/// invocation. Holds only immutable package modules.
pub struct CapabilityRegistry {
    packages: Vec<Shared<Module>>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl CapabilityRegistry {
    /// Builds the standard registry.
    pub fn standard() -> Self {
        let packages = vec![
            ArithmeticPackage::new().as_shared_module(),
            LogicPackage::new().as_shared_module(),
            BasicMathPackage::new().as_shared_module(),
            BasicStringPackage::new().as_shared_module(),
            MoreStringPackage::new().as_shared_module(),
            BasicArrayPackage::new().as_shared_module(),
            BasicMapPackage::new().as_shared_module(),
            BasicIteratorPackage::new().as_shared_module(),
        ];
        Self { packages }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        ALLOWLIST
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        ALLOWLIST.iter().any(|c| c.name == name)
    }

    /// Binds every capability into `engine`. Logger output is tagged with
    /// `plugin_id`.
    pub(crate) fn bind(&self, engine: &mut Engine, plugin_id: &Arc<str>) {
        for module in &self.packages {
            engine.register_global_module(module.clone());
        }
        register_date_functions(engine);
        register_json_functions(engine);
        register_logger(engine, plugin_id);
    }
}

fn script_error(message: impl ToString) -> Box<EvalAltResult> {
    message.to_string().into()
}

fn calendar_error(err: CalendarError) -> Box<EvalAltResult> {
    script_error(err)
}

fn parse(date: &str) -> Result<chrono::NaiveDate, Box<EvalAltResult>> {
    lifewall_calendar::parse_date(date).map_err(calendar_error)
}

fn register_date_functions(engine: &mut Engine) {
    engine
        .register_fn("format_date", |date: ImmutableString, pattern: ImmutableString| -> Result<String, Box<EvalAltResult>> {
            Ok(lifewall_calendar::format_date(parse(&date)?, &pattern))
        })
        .register_fn("day_of_year", |date: ImmutableString| -> Result<INT, Box<EvalAltResult>> {
            Ok(lifewall_calendar::day_of_year(parse(&date)?) as INT)
        })
        .register_fn("weeks_lived", |birth: ImmutableString, date: ImmutableString| -> Result<INT, Box<EvalAltResult>> {
            Ok(lifewall_calendar::weeks_lived(parse(&birth)?, parse(&date)?))
        })
        .register_fn("add_days", |date: ImmutableString, days: INT| -> Result<String, Box<EvalAltResult>> {
            let shifted = lifewall_calendar::add_days(parse(&date)?, days).map_err(calendar_error)?;
            Ok(lifewall_calendar::format_date(shifted, "YYYY-MM-DD"))
        })
        .register_fn("days_between", |from: ImmutableString, to: ImmutableString| -> Result<INT, Box<EvalAltResult>> {
            Ok(lifewall_calendar::days_between(parse(&from)?, parse(&to)?))
        })
        .register_fn("weekday", |date: ImmutableString| -> Result<String, Box<EvalAltResult>> {
            Ok(lifewall_calendar::weekday_name(parse(&date)?).to_string())
        });
}

fn register_json_functions(engine: &mut Engine) {
    engine
        .register_fn("json_encode", |value: Dynamic| -> Result<String, Box<EvalAltResult>> {
            let json: serde_json::Value = rhai::serde::from_dynamic(&value)?;
            serde_json::to_string(&json).map_err(script_error)
        })
        .register_fn("json_decode", |text: ImmutableString| -> Result<Dynamic, Box<EvalAltResult>> {
            let json: serde_json::Value = serde_json::from_str(&text).map_err(script_error)?;
            rhai::serde::to_dynamic(json)
        });
}

fn register_logger(engine: &mut Engine, plugin_id: &Arc<str>) {
    let id = Arc::clone(plugin_id);
    engine.register_fn("log_info", move |message: ImmutableString| {
        info!(target: PLUGIN_LOG_TARGET, plugin_id = %id, "{}", message);
    });

    let id = Arc::clone(plugin_id);
    engine.register_fn("log_warn", move |message: ImmutableString| {
        warn!(target: PLUGIN_LOG_TARGET, plugin_id = %id, "{}", message);
    });

    let id = Arc::clone(plugin_id);
    engine.register_fn("log_error", move |message: ImmutableString| {
        error!(target: PLUGIN_LOG_TARGET, plugin_id = %id, "{}", message);
    });

    let id = Arc::clone(plugin_id);
    engine.on_print(move |text| {
        info!(target: PLUGIN_LOG_TARGET, plugin_id = %id, "{}", text);
    });

    let id = Arc::clone(plugin_id);
    engine.on_debug(move |text, _source, pos| {
        tracing::debug!(target: PLUGIN_LOG_TARGET, plugin_id = %id, position = %pos, "{}", text);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_names_are_unique() {
        let mut names: Vec<_> = ALLOWLIST.iter().map(|c| c.name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }

    #[test]
    fn no_escape_capabilities() {
        let registry = CapabilityRegistry::standard();
        for name in ["eval", "import", "require", "fetch", "sleep", "timestamp", "process", "env", "open"] {
            assert!(!registry.is_allowed(name), "{name} must not be allowlisted");
        }
    }

    #[test]
    fn every_kind_is_covered() {
        for kind in [
            CapabilityKind::Math,
            CapabilityKind::Date,
            CapabilityKind::Json,
            CapabilityKind::String,
            CapabilityKind::Array,
            CapabilityKind::Object,
            CapabilityKind::Logger,
        ] {
            assert!(ALLOWLIST.iter().any(|c| c.kind == kind), "{kind:?} missing");
        }
    }

    #[test]
    fn registry_builds_one_module_per_package() {
        let registry = CapabilityRegistry::standard();
        let package_count = ALLOWLIST
            .iter()
            .filter(|c| c.source == CapabilitySource::Package)
            .count();
        assert_eq!(registry.packages.len(), package_count);
    }
}
