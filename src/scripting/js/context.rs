//! JavaScript context bridge
//!
//! Injects the script input and the native variable accessors into the
//! JavaScript global scope.

use rquickjs::function::Opt;
use rquickjs::{Ctx, Function};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::errors::OpenRequestError;
use crate::models::{EnvironmentUpdate, VariableTable};
use crate::scripting::context::{resolve_target, EnvironmentTarget};

/// Variable state shared between the native bridge and the caller
#[derive(Debug, Default)]
pub struct BridgeState {
    pub variables: VariableTable,
    pub targets: Vec<EnvironmentTarget>,
    pub updates: Vec<EnvironmentUpdate>,
}

impl BridgeState {
    fn set(&mut self, key: String, value: String, environment_name: Option<&str>) {
        self.variables.insert(key.clone(), value.clone());

        match resolve_target(&self.targets, environment_name) {
            Some(target) => {
                debug!(environment = %target.name, key = %key, "Script set variable");
                self.updates.push(EnvironmentUpdate {
                    environment_id: target.id.clone(),
                    key,
                    value,
                });
            }
            None => debug!(key = %key, "No environment to receive script variable"),
        }
    }
}

/// Inject the JSON input and the `__pm_env_get` / `__pm_env_set` functions
pub fn inject_context(
    ctx: &Ctx<'_>,
    input_json: &str,
    state: &Arc<Mutex<BridgeState>>,
) -> Result<(), OpenRequestError> {
    let globals = ctx.globals();

    globals
        .set("__pm_input", input_json)
        .map_err(|e| OpenRequestError::Script(format!("Failed to set script input: {}", e)))?;

    let read = Arc::clone(state);
    let env_get = Function::new(ctx.clone(), move |key: String| -> Option<String> {
        read.lock().ok().and_then(|s| s.variables.get(&key).cloned())
    })?;
    globals
        .set("__pm_env_get", env_get)
        .map_err(|e| OpenRequestError::Script(format!("Failed to set env getter: {}", e)))?;

    let write = Arc::clone(state);
    let env_set = Function::new(
        ctx.clone(),
        move |key: String, value: String, environment_name: Opt<String>| {
            if let Ok(mut s) = write.lock() {
                s.set(key, value, environment_name.0.as_deref());
            }
        },
    )?;
    globals
        .set("__pm_env_set", env_set)
        .map_err(|e| OpenRequestError::Script(format!("Failed to set env setter: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Environment;
    use rquickjs::{Context, Runtime};

    fn state() -> Arc<Mutex<BridgeState>> {
        let envs = [Environment::new("e1", "dev"), Environment::new("e2", "prod")];
        let mut variables = VariableTable::new();
        variables.insert("host".to_string(), "localhost".to_string());
        Arc::new(Mutex::new(BridgeState {
            variables,
            targets: envs.iter().map(EnvironmentTarget::from).collect(),
            updates: Vec::new(),
        }))
    }

    #[test]
    fn test_bridge_reads_and_writes() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let state = state();

        context.with(|ctx| {
            inject_context(&ctx, "{}", &state).unwrap();
            let host: String = ctx.eval("__pm_env_get('host')").unwrap();
            assert_eq!(host, "localhost");
            let missing: Option<String> = ctx.eval("__pm_env_get('nope')").unwrap();
            assert!(missing.is_none());

            ctx.eval::<(), _>("__pm_env_set('token', 'abc'); __pm_env_set('region', 'eu', 'prod');")
                .unwrap();
        });

        let s = state.lock().unwrap();
        assert_eq!(s.variables["token"], "abc");
        assert_eq!(s.updates.len(), 2);
        assert_eq!(s.updates[0].environment_id, "e1");
        assert_eq!(s.updates[1].environment_id, "e2");
        assert_eq!(s.updates[1].key, "region");
    }

    #[test]
    fn test_set_without_environments_only_updates_table() {
        let mut s = BridgeState::default();
        s.set("k".to_string(), "v".to_string(), None);
        assert_eq!(s.variables["k"], "v");
        assert!(s.updates.is_empty());
    }
}
