//! Sandboxed executor: one interpreter, one worker thread, one deadline per
//! hook invocation.
//!
//! Each invocation gets:
//! - A fresh `Engine::new_raw()` bound only to the capability registry
//! - A copy of the execution context exposed as a read-only `Context`
//! - Interpreter limits (call depth, expression depth, string/array/map size)
//! - A wall-clock deadline enforced by the engine's progress hook, which the
//!   interpreter consults between operations
//!
//! The caller waits on a channel with the deadline as timeout. If it expires
//! the caller raises the cancel flag and reports `Timeout`; the worker halts
//! at its next operation and its result is dropped unobserved.

use crate::capabilities::CapabilityRegistry;
use crate::config::ResourceLimits;
use crate::context::ExecutionContext;
use crate::decode::{decode_calculation, decode_render};
use crate::error::PluginError;
use crate::hook::Hook;
use crate::script::{ScriptContext, register_context_type};
use lifewall_model::{CalculationResult, RenderElement};
use rhai::{AST, Array, Dynamic, Engine, EvalAltResult, Map, Scope};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Worker stack size. Deep but bounded by `max_call_levels`.
const WORKER_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Operations between wall-clock checks in the progress hook.
const DEADLINE_CHECK_INTERVAL: u64 = 256;

// ================================================================
// Invocation lifecycle
// ================================================================

/// Lifecycle of a single hook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Pending,
    Running,
    Succeeded,
    TimedOut,
    Errored,
    InvalidEntryPoint,
    InvalidResult,
}

impl InvocationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// `Pending -> Running -> terminal`. Compile failures and missing entry
    /// points are detected before invocation, so `Pending -> Errored` and
    /// `Pending -> InvalidEntryPoint` are also allowed.
    pub fn can_transition_to(&self, next: InvocationState) -> bool {
        match (self, next) {
            (Self::Pending, Self::Running | Self::InvalidEntryPoint | Self::Errored) => true,
            (Self::Running, next) => next.is_terminal(),
            _ => false,
        }
    }

    /// Terminal state for a finished outcome.
    pub fn from_outcome(outcome: &ExecutionOutcome) -> Self {
        match outcome {
            Ok(_) => Self::Succeeded,
            Err(PluginError::Timeout { .. }) => Self::TimedOut,
            Err(PluginError::MissingEntryPoint { .. }) => Self::InvalidEntryPoint,
            Err(PluginError::InvalidResult { .. }) => Self::InvalidResult,
            Err(_) => Self::Errored,
        }
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::TimedOut => "timed_out",
            Self::Errored => "errored",
            Self::InvalidEntryPoint => "invalid_entry_point",
            Self::InvalidResult => "invalid_result",
        };
        f.write_str(name)
    }
}

/// Decoded output of a successful hook.
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutput {
    Calculation(CalculationResult),
    Render(Vec<RenderElement>),
}

pub type ExecutionOutcome = Result<HookOutput, PluginError>;

/// Timing and final state of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationMetrics {
    pub plugin_id: String,
    pub hook: Hook,
    pub state: InvocationState,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvocationReport {
    pub outcome: ExecutionOutcome,
    pub metrics: InvocationMetrics,
}

struct Invocation<'a> {
    plugin_id: &'a str,
    hook: Hook,
    state: InvocationState,
    started: Instant,
}

impl<'a> Invocation<'a> {
    fn new(plugin_id: &'a str, hook: Hook) -> Self {
        Self {
            plugin_id,
            hook,
            state: InvocationState::Pending,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: InvocationState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal invocation transition {} -> {}",
            self.state,
            next
        );
        debug!(
            plugin_id = %self.plugin_id,
            hook = %self.hook,
            from = %self.state,
            to = %next,
            "Invocation state change"
        );
        self.state = next;
    }

    fn finish(mut self, outcome: ExecutionOutcome) -> InvocationReport {
        self.advance(InvocationState::from_outcome(&outcome));
        let elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        InvocationReport {
            outcome,
            metrics: InvocationMetrics {
                plugin_id: self.plugin_id.to_string(),
                hook: self.hook,
                state: self.state,
                elapsed_ms,
            },
        }
    }
}

// ================================================================
// Compiled scripts
// ================================================================

/// A parsed plugin script. Immutable; safe to share across invocations.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    ast: Arc<AST>,
}

impl CompiledScript {
    /// True if the script defines a function named after `hook`, whatever its
    /// arity.
    pub fn declares(&self, hook: Hook) -> bool {
        self.ast.iter_functions().any(|f| f.name == hook.entry_point())
    }

    /// True if the script defines `hook` as a function of exactly one
    /// parameter.
    pub fn has_entry_point(&self, hook: Hook) -> bool {
        self.ast
            .iter_functions()
            .any(|f| f.name == hook.entry_point() && f.params.len() == 1)
    }

    /// Hooks this script declares, in run order.
    pub fn hooks(&self) -> Vec<Hook> {
        Hook::ALL.into_iter().filter(|hook| self.declares(*hook)).collect()
    }
}

// ================================================================
// Sandbox
// ================================================================

/// Executes plugin hooks under the configured [`ResourceLimits`].
pub struct PluginSandbox {
    registry: Arc<CapabilityRegistry>,
    limits: ResourceLimits,
    compiler: Engine,
}

impl fmt::Debug for PluginSandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginSandbox").field("limits", &self.limits).finish_non_exhaustive()
    }
}

impl Default for PluginSandbox {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl PluginSandbox {
    pub fn new(registry: Arc<CapabilityRegistry>, limits: ResourceLimits) -> Self {
        let mut compiler = Engine::new_raw();
        apply_limits(&mut compiler, &limits);
        Self {
            registry,
            limits,
            compiler,
        }
    }

    /// A sandbox with the standard registry and default limits.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(CapabilityRegistry::standard()), ResourceLimits::default())
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Parses `source`. Syntax errors are reported as runtime errors.
    pub fn compile(&self, source: &str) -> Result<CompiledScript, PluginError> {
        let ast = self
            .compiler
            .compile(source)
            .map_err(|e| PluginError::runtime(format!("syntax error: {e}")))?;
        Ok(CompiledScript { ast: Arc::new(ast) })
    }

    /// Compiles `source` and runs one hook against `context`.
    pub fn execute(&self, plugin_id: &str, source: &str, hook: Hook, context: &ExecutionContext) -> InvocationReport {
        match self.compile(source) {
            Ok(script) => self.run_compiled(plugin_id, &script, hook, context),
            Err(e) => Invocation::new(plugin_id, hook).finish(Err(e)),
        }
    }

    /// Runs `calculate(ctx)` from `source`.
    pub fn execute_calculation(
        &self,
        plugin_id: &str,
        source: &str,
        context: &ExecutionContext,
    ) -> Result<CalculationResult, PluginError> {
        match self.execute(plugin_id, source, Hook::Calculate, context).outcome? {
            HookOutput::Calculation(result) => Ok(result),
            HookOutput::Render(_) => Err(mismatched_output(Hook::Calculate)),
        }
    }

    /// Runs `render(ctx)` from `source`.
    pub fn execute_render(
        &self,
        plugin_id: &str,
        source: &str,
        context: &ExecutionContext,
    ) -> Result<Vec<RenderElement>, PluginError> {
        match self.execute(plugin_id, source, Hook::Render, context).outcome? {
            HookOutput::Render(elements) => Ok(elements),
            HookOutput::Calculation(_) => Err(mismatched_output(Hook::Render)),
        }
    }

    /// Runs one hook of an already compiled script.
    pub fn run_compiled(
        &self,
        plugin_id: &str,
        script: &CompiledScript,
        hook: Hook,
        context: &ExecutionContext,
    ) -> InvocationReport {
        let mut invocation = Invocation::new(plugin_id, hook);

        if !script.has_entry_point(hook) {
            return invocation.finish(Err(PluginError::MissingEntryPoint { hook }));
        }

        invocation.advance(InvocationState::Running);
        let outcome = self.invoke(plugin_id, script, hook, context).and_then(|value| {
            decode(hook, &value, context, &self.limits).map_err(|detail| PluginError::InvalidResult { hook, detail })
        });
        invocation.finish(outcome)
    }

    fn invoke(
        &self,
        plugin_id: &str,
        script: &CompiledScript,
        hook: Hook,
        context: &ExecutionContext,
    ) -> Result<serde_json::Value, PluginError> {
        let timeout = self.limits.call_timeout();
        let timeout_ms = self.limits.call_timeout_ms;
        let deadline = Instant::now() + timeout;
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::sync_channel(1);

        let worker = Worker {
            registry: Arc::clone(&self.registry),
            limits: self.limits.clone(),
            plugin_id: Arc::from(plugin_id),
            ast: Arc::clone(&script.ast),
            context: ScriptContext::new(context.clone())?,
            hook,
            deadline,
            cancel: Arc::clone(&cancel),
        };

        std::thread::Builder::new()
            .name(format!("lifewall-{hook}"))
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || {
                // The receiver is gone after a timeout; the result is dropped.
                let _ = tx.send(worker.run());
            })
            .map_err(|e| PluginError::runtime(format!("failed to start plugin worker: {e}")))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => {
                let value = result.map_err(|e| classify(e, timeout_ms))?;
                // JSON has no NaN or infinity; conversion would turn them into nulls.
                if contains_non_finite(&value) {
                    return Err(PluginError::InvalidResult {
                        hook,
                        detail: "result contains a non-finite number".into(),
                    });
                }
                rhai::serde::from_dynamic::<serde_json::Value>(&value).map_err(|e| PluginError::InvalidResult {
                    hook,
                    detail: format!("result is not plain data: {e}"),
                })
            }
            Err(RecvTimeoutError::Timeout) => {
                cancel.store(true, Ordering::Relaxed);
                Err(PluginError::Timeout { timeout_ms })
            }
            Err(RecvTimeoutError::Disconnected) => Err(PluginError::runtime("plugin worker exited without a result")),
        }
    }
}

fn mismatched_output(hook: Hook) -> PluginError {
    PluginError::InvalidResult {
        hook,
        detail: "hook produced output of the wrong kind".into(),
    }
}

fn decode(
    hook: Hook,
    value: &serde_json::Value,
    context: &ExecutionContext,
    limits: &ResourceLimits,
) -> Result<HookOutput, String> {
    match hook {
        Hook::Calculate => decode_calculation(value, *context.current_date.offset()).map(HookOutput::Calculation),
        Hook::Render => decode_render(value, limits.max_render_elements).map(HookOutput::Render),
    }
}

fn apply_limits(engine: &mut Engine, limits: &ResourceLimits) {
    engine
        .set_max_call_levels(limits.max_call_levels)
        .set_max_expr_depths(limits.max_expr_depth, limits.max_function_expr_depth)
        .set_max_string_size(limits.max_string_size)
        .set_max_array_size(limits.max_array_size)
        .set_max_map_size(limits.max_map_size)
        .set_max_operations(limits.max_operations);
    engine.disable_symbol("eval");
}

fn contains_non_finite(value: &Dynamic) -> bool {
    if let Ok(number) = value.as_float() {
        return !number.is_finite();
    }
    if let Some(items) = value.read_lock::<Array>() {
        return items.iter().any(contains_non_finite);
    }
    if let Some(map) = value.read_lock::<Map>() {
        return map.values().any(contains_non_finite);
    }
    false
}

/// Converts an interpreter error into the plugin error taxonomy.
fn classify(err: Box<EvalAltResult>, timeout_ms: u64) -> PluginError {
    match *err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => classify(inner, timeout_ms),
        EvalAltResult::ErrorTerminated(..) | EvalAltResult::ErrorTooManyOperations(..) => {
            PluginError::Timeout { timeout_ms }
        }
        EvalAltResult::ErrorRuntime(value, _) => {
            let message = if value.is_string() {
                value.into_string().unwrap_or_default()
            } else {
                value.to_string()
            };
            PluginError::runtime(message)
        }
        other => PluginError::runtime(other.to_string()),
    }
}

/// Everything a worker thread owns for one invocation.
struct Worker {
    registry: Arc<CapabilityRegistry>,
    limits: ResourceLimits,
    plugin_id: Arc<str>,
    ast: Arc<AST>,
    context: ScriptContext,
    hook: Hook,
    deadline: Instant,
    cancel: Arc<AtomicBool>,
}

impl Worker {
    fn run(self) -> Result<Dynamic, Box<EvalAltResult>> {
        let engine = self.engine();
        let mut scope = Scope::new();
        engine.call_fn::<Dynamic>(&mut scope, &self.ast, self.hook.entry_point(), (self.context,))
    }

    fn engine(&self) -> Engine {
        let mut engine = Engine::new_raw();
        apply_limits(&mut engine, &self.limits);
        self.registry.bind(&mut engine, &self.plugin_id);
        register_context_type(&mut engine);

        let cancel = Arc::clone(&self.cancel);
        let deadline = self.deadline;
        engine.on_progress(move |ops| {
            let expired = ops % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= deadline;
            if expired || cancel.load(Ordering::Relaxed) {
                Some(Dynamic::UNIT)
            } else {
                None
            }
        });
        engine
    }
}
