//! Batch processing of a user's enabled plugins.
//!
//! The orchestrator walks the enabled list in order and runs each plugin's
//! declared hooks through the sandbox. Failures are recorded per plugin and
//! per hook; nothing a single plugin does can abort the batch.

use crate::cache::ScriptCache;
use crate::capabilities::CapabilityRegistry;
use crate::config::SandboxConfig;
use crate::context::{ContextWarning, context_for_request};
use crate::error::{PluginError, PluginFailure};
use crate::hook::Hook;
use crate::merge::{MergedCalculation, merge_calculations, merge_renders};
use crate::sandbox::{CompiledScript, HookOutput, InvocationMetrics, PluginSandbox};
use crate::validator::{MISSING_ENTRY_POINT, SourceValidator};
use chrono::{DateTime, FixedOffset, Utc};
use lifewall_model::{CalculationResult, PluginConfig, PluginDefinition, RenderElement, RequestContext, Settings};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything one batch produced, keyed by plugin id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessReport {
    /// Plugin ids in processing order (enabled, first occurrence only).
    pub order: Vec<String>,
    /// The request's date before any plugin override.
    pub base_date: DateTime<FixedOffset>,
    pub calculation_results: BTreeMap<String, CalculationResult>,
    pub render_results: BTreeMap<String, Vec<RenderElement>>,
    pub errors: BTreeMap<String, Vec<PluginFailure>>,
    pub warnings: Vec<ContextWarning>,
    pub metrics: Vec<InvocationMetrics>,
}

impl ProcessReport {
    fn new(base_date: DateTime<FixedOffset>, warnings: Vec<ContextWarning>) -> Self {
        Self {
            order: Vec::new(),
            base_date,
            calculation_results: BTreeMap::new(),
            render_results: BTreeMap::new(),
            errors: BTreeMap::new(),
            warnings,
            metrics: Vec::new(),
        }
    }

    fn record_failure(&mut self, plugin_id: &str, hook: Option<Hook>, error: &PluginError) {
        warn!(
            plugin_id = %plugin_id,
            hook = ?hook,
            kind = ?error.kind(),
            "Plugin failed: {}",
            error
        );
        self.errors
            .entry(plugin_id.to_string())
            .or_default()
            .push(PluginFailure::new(hook, error));
    }

    /// Successful calculation results in processing order.
    pub fn calculations_in_order(&self) -> Vec<(&str, &CalculationResult)> {
        self.order
            .iter()
            .filter_map(|id| self.calculation_results.get_key_value(id))
            .map(|(id, result)| (id.as_str(), result))
            .collect()
    }

    /// Successful render results in processing order.
    pub fn renders_in_order(&self) -> Vec<(&str, &[RenderElement])> {
        self.order
            .iter()
            .filter_map(|id| self.render_results.get_key_value(id))
            .map(|(id, elements)| (id.as_str(), elements.as_slice()))
            .collect()
    }

    pub fn merged_calculation(&self) -> MergedCalculation {
        merge_calculations(self.base_date, self.calculations_in_order())
    }

    pub fn merged_elements(&self) -> Vec<RenderElement> {
        merge_renders(self.renders_in_order())
    }

    pub fn errors_for(&self, plugin_id: &str) -> &[PluginFailure] {
        self.errors.get(plugin_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs batches of plugins against a shared sandbox and script cache.
#[derive(Debug, Default)]
pub struct PluginOrchestrator {
    sandbox: PluginSandbox,
    cache: ScriptCache,
    validator: SourceValidator,
}

impl PluginOrchestrator {
    pub fn new(registry: Arc<CapabilityRegistry>, config: &SandboxConfig) -> Self {
        Self {
            sandbox: PluginSandbox::new(registry, config.limits.clone()),
            cache: ScriptCache::default(),
            validator: SourceValidator::new(config.limits.max_source_len),
        }
    }

    pub fn sandbox(&self) -> &PluginSandbox {
        &self.sandbox
    }

    pub fn cache(&self) -> &ScriptCache {
        &self.cache
    }

    /// Processes `configs` in order for the current instant.
    pub fn process(
        &self,
        configs: &[PluginConfig],
        definitions: &HashMap<String, PluginDefinition>,
        request: &RequestContext,
    ) -> ProcessReport {
        self.process_at(Utc::now(), configs, definitions, request)
    }

    /// Processes `configs` in order as if the current instant were `now`.
    pub fn process_at(
        &self,
        now: DateTime<Utc>,
        configs: &[PluginConfig],
        definitions: &HashMap<String, PluginDefinition>,
        request: &RequestContext,
    ) -> ProcessReport {
        let base = context_for_request(request, Settings::new(), now);
        let mut report = ProcessReport::new(base.context.current_date, base.warnings);
        let mut seen = HashSet::new();

        info!(configs = configs.len(), "Processing plugin batch");

        for config in configs {
            if !config.enabled {
                debug!(plugin_id = %config.plugin_id, "Plugin disabled, skipping");
                continue;
            }
            if !seen.insert(config.plugin_id.as_str()) {
                warn!(plugin_id = %config.plugin_id, "Duplicate plugin config, skipping");
                continue;
            }
            report.order.push(config.plugin_id.clone());

            let Some(definition) = definitions.get(&config.plugin_id) else {
                let error = PluginError::UnknownPlugin {
                    plugin_id: config.plugin_id.clone(),
                };
                report.record_failure(&config.plugin_id, None, &error);
                continue;
            };

            let script = match self.prepare(&definition.source) {
                Ok(script) => script,
                Err(error) => {
                    report.record_failure(&config.plugin_id, None, &error);
                    continue;
                }
            };

            let settings = definition.resolve_settings(&config.settings);
            let context = base.context.with_settings(settings);

            for hook in script.hooks() {
                let invocation = self.sandbox.run_compiled(&config.plugin_id, &script, hook, &context);
                report.metrics.push(invocation.metrics);
                match invocation.outcome {
                    Ok(HookOutput::Calculation(result)) => {
                        report.calculation_results.insert(config.plugin_id.clone(), result);
                    }
                    Ok(HookOutput::Render(elements)) => {
                        report.render_results.insert(config.plugin_id.clone(), elements);
                    }
                    Err(error) => report.record_failure(&config.plugin_id, Some(hook), &error),
                }
            }
        }

        info!(
            plugins = report.order.len(),
            calculations = report.calculation_results.len(),
            renders = report.render_results.len(),
            failed = report.errors.len(),
            "Plugin batch finished"
        );
        report
    }

    /// Validates and compiles a plugin's source. A script that compiles but
    /// defines no usable hook is rejected like one that fails screening.
    fn prepare(&self, source: &str) -> Result<CompiledScript, PluginError> {
        self.validator.validate(source).into_result()?;
        let script = self.cache.get_or_compile(&self.sandbox, source)?;
        if script.hooks().is_empty() {
            return Err(PluginError::ValidationFailed {
                violations: vec![MISSING_ENTRY_POINT.to_string()],
            });
        }
        Ok(script)
    }
}
