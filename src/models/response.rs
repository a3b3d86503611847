//! Execution results

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::types::HeaderMap;

/// Outcome of one `pm.test(...)` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    pub fn pass(name: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            error: None,
        }
    }

    pub fn fail(name: &str, error: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            error: Some(error.to_string()),
        }
    }
}

/// Captured response of one request execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    /// Parsed JSON when the response declared JSON, raw text otherwise
    pub data: JsonValue,
    /// Elapsed wall-clock milliseconds
    pub time: u64,
    /// UTF-8 byte length of the body as text
    pub size: u64,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
}

impl RequestResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, JSON-encoding non-string bodies
    pub fn body_text(&self) -> String {
        body_text(&self.data)
    }

    pub fn passed_tests(&self) -> usize {
        self.test_results.iter().filter(|t| t.passed).count()
    }

    pub fn failed_tests(&self) -> usize {
        self.test_results.len() - self.passed_tests()
    }
}

pub(crate) fn body_text(data: &JsonValue) -> String {
    match data {
        JsonValue::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
