//! Command implementations for the `lifewall-plugin` developer tool.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use lifewall_model::{PluginConfig, PluginDefinition, RenderElement, RequestContext, Settings, ViewMode};
use lifewall_plugin_host::{
    ContextWarning, Hook, HookOutput, InvocationState, PluginFailure, PluginOrchestrator, PluginSandbox,
    ProcessReport, SandboxConfig, SourceValidator, ValidationReport, build_context_at,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Reads the sandbox config. An explicitly given file must load cleanly.
pub fn load_config(path: Option<&Path>) -> Result<SandboxConfig> {
    match path {
        Some(path) => SandboxConfig::from_file(path)
            .with_context(|| format!("loading sandbox config {}", path.display())),
        None => Ok(SandboxConfig::default()),
    }
}

pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Parses a `--settings` JSON object.
pub fn parse_settings(text: &str) -> Result<Settings> {
    let value: serde_json::Value = serde_json::from_str(text).context("--settings is not valid JSON")?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => anyhow::bail!("--settings must be a JSON object"),
    }
}

// ---- validate ----

pub fn validate_source(config: &SandboxConfig, source: &str) -> ValidationReport {
    SourceValidator::new(config.limits.max_source_len).validate(source)
}

// ---- run ----

/// Inputs for a single hook run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub plugin_id: String,
    pub hook: Hook,
    pub width: u32,
    pub height: u32,
    pub view_mode: ViewMode,
    pub birth_date: Option<NaiveDate>,
    pub timezone: Option<String>,
    pub settings: Settings,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            plugin_id: "local".to_string(),
            hook: Hook::Render,
            width: 1170,
            height: 2532,
            view_mode: ViewMode::Life,
            birth_date: None,
            timezone: None,
            settings: Settings::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub plugin_id: String,
    pub hook: Hook,
    /// `None` when the source was rejected before execution.
    pub state: Option<InvocationState>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ContextWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PluginFailure>,
}

impl RunOutput {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Validates `source`, then runs one hook of it as if the time were `now`.
pub fn run_hook(config: &SandboxConfig, source: &str, options: &RunOptions, now: DateTime<Utc>) -> Result<RunOutput> {
    let mut output = RunOutput {
        plugin_id: options.plugin_id.clone(),
        hook: options.hook,
        state: None,
        elapsed_ms: 0,
        warnings: Vec::new(),
        result: None,
        error: None,
    };

    if let Err(e) = validate_source(config, source).into_result() {
        output.error = Some(PluginFailure::new(None, &e));
        return Ok(output);
    }

    let built = build_context_at(
        now,
        options.birth_date,
        options.width,
        options.height,
        options.view_mode,
        options.settings.clone(),
        options.timezone.as_deref(),
    );
    output.warnings = built.warnings;

    let sandbox = PluginSandbox::new(Default::default(), config.limits.clone());
    let report = sandbox.execute(&options.plugin_id, source, options.hook, &built.context);
    output.state = Some(report.metrics.state);
    output.elapsed_ms = report.metrics.elapsed_ms;

    match report.outcome {
        Ok(HookOutput::Calculation(result)) => {
            output.result = Some(serde_json::to_value(result).context("serializing calculation result")?);
        }
        Ok(HookOutput::Render(elements)) => {
            output.result = Some(serde_json::to_value(elements).context("serializing render elements")?);
        }
        Err(e) => output.error = Some(PluginFailure::new(Some(options.hook), &e)),
    }
    Ok(output)
}

// ---- batch ----

/// A batch file: the request, the user's ordered configs, and the plugin
/// definitions they refer to.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchFile {
    pub request: RequestContext,
    pub configs: Vec<PluginConfig>,
    #[serde(default)]
    pub definitions: Vec<PluginDefinition>,
}

impl BatchFile {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing batch file")
    }

    pub fn definitions_by_id(&self) -> HashMap<String, PluginDefinition> {
        self.definitions
            .iter()
            .map(|definition| (definition.id.clone(), definition.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    pub effective_date: DateTime<FixedOffset>,
    pub date_source: Option<String>,
    pub elements: Vec<RenderElement>,
    pub report: ProcessReport,
}

pub fn run_batch(config: &SandboxConfig, batch: &BatchFile, now: DateTime<Utc>) -> BatchOutput {
    let orchestrator = PluginOrchestrator::new(Default::default(), config);
    let report = orchestrator.process_at(now, &batch.configs, &batch.definitions_by_id(), &batch.request);
    let merged = report.merged_calculation();
    BatchOutput {
        effective_date: merged.effective_date,
        date_source: merged.date_source,
        elements: report.merged_elements(),
        report,
    }
}

pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serializing output")
}
