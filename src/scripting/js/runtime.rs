//! JavaScript runtime using QuickJS via rquickjs
//!
//! Every run gets a fresh runtime and context, so nothing a script defines
//! survives into the next one.

use rquickjs::{Context, Ctx, Function, Runtime};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::context::{inject_context, BridgeState};
use super::modules;
use crate::errors::OpenRequestError;
use crate::models::TestResult;
use crate::scripting::context::{EnvironmentTarget, ScriptContext, ScriptLimits};
use crate::scripting::ScriptMode;

/// Report produced by `__pm_run`
#[derive(Debug, Deserialize)]
pub struct RunReport {
    pub ok: bool,
    #[serde(default)]
    pub value: JsonValue,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub results: Vec<TestResult>,
}

impl RunReport {
    fn failed(message: String) -> Self {
        Self {
            ok: false,
            value: JsonValue::Null,
            error: Some(message),
            results: Vec::new(),
        }
    }
}

/// JavaScript script engine powered by QuickJS
#[derive(Debug, Clone)]
pub struct JsScriptEngine {
    limits: ScriptLimits,
}

impl JsScriptEngine {
    pub fn new(limits: ScriptLimits) -> Self {
        Self { limits }
    }

    /// Run `source` against `ctx`.
    ///
    /// Script errors, including interrupts, come back inside the report;
    /// `Err` is an engine failure. Variable writes made before a failure are
    /// still applied to `ctx`.
    pub fn run(
        &self,
        source: &str,
        mode: ScriptMode,
        ctx: &mut ScriptContext<'_>,
    ) -> Result<RunReport, OpenRequestError> {
        let input = serde_json::to_string(&ctx.to_input())?;
        let state = Arc::new(Mutex::new(BridgeState {
            variables: ctx.variables.clone(),
            targets: ctx.environments.iter().map(EnvironmentTarget::from).collect(),
            updates: Vec::new(),
        }));

        let result = self.eval(source, mode, &input, &state);

        if let Ok(mut s) = state.lock() {
            *ctx.variables = std::mem::take(&mut s.variables);
            ctx.updates.append(&mut s.updates);
        }

        result
    }

    fn eval(
        &self,
        source: &str,
        mode: ScriptMode,
        input: &str,
        state: &Arc<Mutex<BridgeState>>,
    ) -> Result<RunReport, OpenRequestError> {
        let runtime = Runtime::new()
            .map_err(|e| OpenRequestError::Script(format!("Failed to create JS runtime: {}", e)))?;
        runtime.set_memory_limit(self.limits.memory_limit);
        runtime.set_max_stack_size(self.limits.max_stack_size);

        let deadline = Instant::now() + self.limits.timeout;
        runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() >= deadline)));

        let context = Context::full(&runtime)
            .map_err(|e| OpenRequestError::Script(format!("Failed to create JS context: {}", e)))?;

        context.with(|ctx| -> Result<RunReport, OpenRequestError> {
            inject_context(&ctx, input, state)?;
            modules::register_all(&ctx)?;

            let run: Function = ctx.globals().get("__pm_run")?;
            match run.call::<_, String>((source, mode.as_str())) {
                Ok(report) => Ok(serde_json::from_str(&report)?),
                // Uncatchable: interrupts and engine-level exceptions
                Err(rquickjs::Error::Exception) => {
                    let message = if Instant::now() >= deadline {
                        format!("Script timed out after {} ms", self.limits.timeout.as_millis())
                    } else {
                        exception_message(&ctx)
                    };
                    Ok(RunReport::failed(message))
                }
                Err(e) => Err(e.into()),
            }
        })
    }
}

/// Message of the pending exception, if any
fn exception_message(ctx: &Ctx<'_>) -> String {
    let caught = ctx.catch();
    caught
        .as_exception()
        .and_then(|e| e.message())
        .unwrap_or_else(|| "Script execution failed".to_string())
}

impl Default for JsScriptEngine {
    fn default() -> Self {
        Self::new(ScriptLimits::default())
    }
}
