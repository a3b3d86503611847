//! Script execution context
//!
//! Holds what a script can see (merged variables, environments, request and
//! response) and collects the environment writes it makes.

use serde::Serialize;
use std::time::Duration;

use crate::models::{Environment, EnvironmentUpdate, HttpRequest, RequestResponse, VariableTable};

/// Context for one script or test run
pub struct ScriptContext<'a> {
    /// Merged variable table of the current execution; scripts write through to it
    pub variables: &'a mut VariableTable,
    pub environments: &'a [Environment],
    pub request: &'a HttpRequest,
    /// Absent before the response exists (pre-request scripts)
    pub response: Option<&'a RequestResponse>,
    /// Environment writes made by the script, in call order
    pub updates: Vec<EnvironmentUpdate>,
}

impl<'a> ScriptContext<'a> {
    pub fn new(
        variables: &'a mut VariableTable,
        environments: &'a [Environment],
        request: &'a HttpRequest,
    ) -> Self {
        Self {
            variables,
            environments,
            request,
            response: None,
            updates: Vec::new(),
        }
    }

    pub fn with_response(mut self, response: &'a RequestResponse) -> Self {
        self.response = Some(response);
        self
    }

    /// Take the collected environment writes
    pub fn take_updates(&mut self) -> Vec<EnvironmentUpdate> {
        std::mem::take(&mut self.updates)
    }

    /// JSON handed to the sandbox as its read-only input
    pub(crate) fn to_input(&self) -> ScriptInput<'_> {
        ScriptInput {
            request: self.request,
            response: self.response,
            environments: self.environments,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct ScriptInput<'a> {
    pub request: &'a HttpRequest,
    pub response: Option<&'a RequestResponse>,
    pub environments: &'a [Environment],
}

/// Resource limits applied to every script run
#[derive(Debug, Clone, Copy)]
pub struct ScriptLimits {
    pub timeout: Duration,
    pub memory_limit: usize,
    pub max_stack_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            memory_limit: 64 * 1024 * 1024,
            max_stack_size: 1024 * 1024,
        }
    }
}

/// Identity of an environment that a script write may target
#[derive(Debug, Clone)]
pub(crate) struct EnvironmentTarget {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

impl From<&Environment> for EnvironmentTarget {
    fn from(env: &Environment) -> Self {
        Self {
            id: env.id.clone(),
            name: env.name.clone(),
            is_active: env.is_active,
        }
    }
}

/// Pick the environment a `set` call writes to: the named one when given and
/// found, else the first active one, else the first one.
pub(crate) fn resolve_target<'t>(
    targets: &'t [EnvironmentTarget],
    environment_name: Option<&str>,
) -> Option<&'t EnvironmentTarget> {
    environment_name
        .and_then(|name| targets.iter().find(|t| t.name == name))
        .or_else(|| targets.iter().find(|t| t.is_active))
        .or_else(|| targets.first())
}
