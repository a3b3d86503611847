//! Variable resolution
//!
//! `{{name}}` tokens resolve against the merged environment table; `:name`
//! URL segments resolve against the request's stored path variables.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Environment, PathVariables, VariableTable};

/// `{{identifier}}` where identifier is word characters and hyphens
static TEMPLATE_VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{([A-Za-z0-9_-]+)\}\}").expect("Invalid template variable regex")
});

/// `:identifier` path segment
static PATH_VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":([A-Za-z0-9_]+)").expect("Invalid path variable regex")
});

/// A path variable name found in a URL template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathVariable {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Merge environment tables in order; later environments win on collisions
pub fn merge_environments(environments: &[Environment]) -> VariableTable {
    let mut merged = VariableTable::new();
    for env in environments {
        for (key, value) in &env.variables {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Substitute every `{{name}}` token found in `variables`.
///
/// Unknown tokens are left exactly as written.
pub fn replace_variables(text: &str, variables: &VariableTable) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }

    TEMPLATE_VAR_RE
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            match variables.get(name) {
                Some(value) => value.clone(),
                None => {
                    debug!(variable = %name, "Variable not found in environment");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

/// Names of the `:name` segments of a URL template, in order, duplicates kept
pub fn extract_path_variables(url: &str) -> Vec<PathVariable> {
    PATH_VAR_RE
        .captures_iter(url)
        .map(|caps| PathVariable {
            key: caps[1].to_string(),
            value: String::new(),
        })
        .collect()
}

/// Replace `:key` tokens followed by `/` or the end of the URL.
///
/// A key with no stored value (missing or empty) stays as `:key`.
pub fn replace_path_variables(url: &str, path_variables: &PathVariables) -> String {
    let mut processed = url.to_string();

    for (key, value) in path_variables {
        if value.is_empty() {
            continue;
        }
        let pattern = format!(":{}(/|$)", regex::escape(key));
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(_) => continue,
        };
        processed = re
            .replace_all(&processed, |caps: &Captures| format!("{}{}", value, &caps[1]))
            .into_owned();
    }

    processed
}

/// Resolve the final URL of a request.
///
/// Path variables go in first, then environment tokens across the whole URL.
/// Path variable values are then resolved against the environment themselves
/// and applied once more, which covers `:key` segments that only appeared
/// after environment substitution.
pub fn resolve_url(
    raw_url: &str,
    path_variables: Option<&PathVariables>,
    variables: &VariableTable,
) -> String {
    let empty = PathVariables::new();
    let path_variables = path_variables.unwrap_or(&empty);

    let url = replace_path_variables(raw_url, path_variables);
    let url = replace_variables(&url, variables);

    let resolved_path_variables: PathVariables = path_variables
        .iter()
        .map(|(k, v)| (k.clone(), replace_variables(v, variables)))
        .collect();

    replace_path_variables(&url, &resolved_path_variables)
}
