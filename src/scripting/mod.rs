//! Script sandbox and test runner
//!
//! Pre-request and post-response scripts and test scripts are JavaScript run
//! in an embedded QuickJS engine. Each script body becomes a function of
//! `(pm, response, environments)`; `pm` is the only capability it gets.
//!
//! # Failure containment
//!
//! - [`ScriptSandbox::execute_script`] returns script errors as `Err`; the
//!   request executor logs them and carries on.
//! - [`ScriptSandbox::execute_tests`] never fails because of the script: a
//!   top-level error becomes a `"Test Script Error"` result.

pub mod context;
pub mod js;

pub use context::{ScriptContext, ScriptLimits};

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::errors::{OpenRequestError, Result};
use crate::models::TestResult;
use js::JsScriptEngine;

/// Name of the synthetic result recorded when a test script fails as a whole
pub const TEST_SCRIPT_ERROR: &str = "Test Script Error";

/// How the `pm` object behaves for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptMode {
    /// Pre-request or post-response script; `pm.test` returns its result
    Script,
    /// Test script; `pm.test` collects its result
    Tests,
}

impl ScriptMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptMode::Script => "script",
            ScriptMode::Tests => "tests",
        }
    }
}

/// Runs user scripts against a [`ScriptContext`]
#[derive(Debug, Clone, Default)]
pub struct ScriptSandbox {
    engine: JsScriptEngine,
}

impl ScriptSandbox {
    pub fn new(limits: ScriptLimits) -> Self {
        Self {
            engine: JsScriptEngine::new(limits),
        }
    }

    /// Run a pre-request or post-response script.
    ///
    /// Returns the script's return value as JSON (`null` when it returns
    /// nothing or something JSON cannot hold).
    pub fn execute_script(&self, source: &str, ctx: &mut ScriptContext<'_>) -> Result<JsonValue> {
        let report = self.engine.run(source, ScriptMode::Script, ctx)?;
        debug!(ok = report.ok, updates = ctx.updates.len(), "Script finished");

        if report.ok {
            Ok(report.value)
        } else {
            Err(OpenRequestError::Script(
                report.error.unwrap_or_else(|| "Script execution failed".to_string()),
            ))
        }
    }

    /// Run a test script and collect one result per `pm.test` call.
    ///
    /// `Err` only for engine failures; script errors are results.
    pub fn execute_tests(&self, source: &str, ctx: &mut ScriptContext<'_>) -> Result<Vec<TestResult>> {
        let report = self.engine.run(source, ScriptMode::Tests, ctx)?;
        let mut results = report.results;

        if !report.ok {
            let message = report
                .error
                .unwrap_or_else(|| "Test script execution failed".to_string());
            results.push(TestResult::fail(TEST_SCRIPT_ERROR, &message));
        }

        debug!(
            total = results.len(),
            passed = results.iter().filter(|r| r.passed).count(),
            "Tests finished"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::models::{Environment, HeaderMap, HttpRequest, RequestResponse, VariableTable};
    use serde_json::json;

    fn request() -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, "http://h/users")
    }

    fn response(status: u16, data: JsonValue) -> RequestResponse {
        let mut headers = HeaderMap::new();
        headers.insert("content-type".to_string(), "application/json; charset=utf-8".to_string());
        RequestResponse {
            status,
            status_text: "OK".to_string(),
            headers,
            data,
            time: 3,
            size: 0,
            test_results: Vec::new(),
        }
    }

    #[test]
    fn test_equal_assertions() {
        let sandbox = ScriptSandbox::default();
        let mut vars = VariableTable::new();
        let req = request();
        let mut ctx = ScriptContext::new(&mut vars, &[], &req);

        let results = sandbox
            .execute_tests(
                "pm.test('ok', () => pm.expect(1).to.equal(1)); pm.test('bad', () => pm.expect(1).to.equal(2));",
                &mut ctx,
            )
            .unwrap();

        assert_eq!(
            results,
            vec![TestResult::pass("ok"), TestResult::fail("bad", "Expected 2 but got 1")]
        );
    }

    #[test]
    fn test_response_assertions() {
        let sandbox = ScriptSandbox::default();
        let mut vars = VariableTable::new();
        let req = request();
        let resp = response(200, json!({"id": 7, "name": "alice"}));
        let mut ctx = ScriptContext::new(&mut vars, &[], &req).with_response(&resp);

        let script = r#"
            pm.test('status', () => pm.response.to.have.status(200));
            pm.test('json', () => pm.response.to.have.jsonBody());
            pm.test('ok', () => pm.expect(null).to.be.ok);
            pm.test('prop', () => pm.expect(null).to.have.property('id').that.equals(7));
            pm.test('prop value', () => pm.expect(null).to.have.property('name').that.equals('bob'));
            pm.test('missing', () => pm.expect(null).to.have.property('email'));
            pm.test('text', () => pm.expect(pm.response.text()).to.equal('{"id":7,"name":"alice"}'));
            pm.test('wrong status', () => pm.expect(null).to.have.status(404));
        "#;
        let results = sandbox.execute_tests(script, &mut ctx).unwrap();

        assert_eq!(results.len(), 8);
        assert!(results[..4].iter().all(|r| r.passed));
        assert_eq!(
            results[4].error.as_deref(),
            Some("Expected property 'name' to equal bob but got alice")
        );
        assert_eq!(
            results[5].error.as_deref(),
            Some("Expected response to have property 'email'")
        );
        assert!(results[6].passed);
        assert_eq!(results[7].error.as_deref(), Some("Expected status 404 but got 200"));
    }

    #[test]
    fn test_not_ok_status() {
        let sandbox = ScriptSandbox::default();
        let mut vars = VariableTable::new();
        let req = request();
        let resp = response(500, json!("boom"));
        let mut ctx = ScriptContext::new(&mut vars, &[], &req).with_response(&resp);

        let results = sandbox
            .execute_tests("pm.test('ok', () => { pm.expect(1).to.be.ok; });", &mut ctx)
            .unwrap();
        assert_eq!(
            results[0].error.as_deref(),
            Some("Expected response to be ok but got status 500")
        );
    }

    #[test]
    fn test_top_level_error_keeps_earlier_results() {
        let sandbox = ScriptSandbox::default();
        let mut vars = VariableTable::new();
        let req = request();
        let mut ctx = ScriptContext::new(&mut vars, &[], &req);

        let results = sandbox
            .execute_tests("pm.test('first', () => {}); throw new Error('broken');", &mut ctx)
            .unwrap();
        assert_eq!(
            results,
            vec![TestResult::pass("first"), TestResult::fail(TEST_SCRIPT_ERROR, "broken")]
        );
    }

    #[test]
    fn test_reassigned_globals_keep_results() {
        let sandbox = ScriptSandbox::default();
        let mut vars = VariableTable::new();
        let req = request();
        let mut ctx = ScriptContext::new(&mut vars, &[], &req);

        let results = sandbox
            .execute_tests(
                "pm.test('first', () => {}); JSON = null; String = null; \
                 pm.test('second', () => pm.expect(1).to.equal(2));",
                &mut ctx,
            )
            .unwrap();
        assert_eq!(
            results,
            vec![TestResult::pass("first"), TestResult::fail("second", "Expected 2 but got 1")]
        );

        let results = sandbox
            .execute_tests("pm.test('kept', () => {}); JSON = undefined; Error = null; throw 1;", &mut ctx)
            .unwrap();
        assert_eq!(
            results,
            vec![
                TestResult::pass("kept"),
                TestResult::fail(TEST_SCRIPT_ERROR, "Test script execution failed"),
            ]
        );
    }

    #[test]
    fn test_syntax_error_in_tests() {
        let sandbox = ScriptSandbox::default();
        let mut vars = VariableTable::new();
        let req = request();
        let mut ctx = ScriptContext::new(&mut vars, &[], &req);

        let results = sandbox.execute_tests("pm.test('x', () => {", &mut ctx).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, TEST_SCRIPT_ERROR);
        assert!(!results[0].passed);
    }

    #[test]
    fn test_non_error_throw_in_test() {
        let sandbox = ScriptSandbox::default();
        let mut vars = VariableTable::new();
        let req = request();
        let mut ctx = ScriptContext::new(&mut vars, &[], &req);

        let results = sandbox.execute_tests("pm.test('x', () => { throw 42; });", &mut ctx).unwrap();
        assert_eq!(results, vec![TestResult::fail("x", "Test failed")]);
    }

    #[test]
    fn test_script_error_is_err() {
        let sandbox = ScriptSandbox::default();
        let mut vars = VariableTable::new();
        let req = request();
        let mut ctx = ScriptContext::new(&mut vars, &[], &req);

        let err = sandbox
            .execute_script("throw new Error('boom')", &mut ctx)
            .unwrap_err();
        assert!(matches!(err, OpenRequestError::Script(ref m) if m == "boom"));
    }

    #[test]
    fn test_pm_test_returns_result_in_scripts() {
        let sandbox = ScriptSandbox::default();
        let mut vars = VariableTable::new();
        let req = request();
        let mut ctx = ScriptContext::new(&mut vars, &[], &req);

        let value = sandbox
            .execute_script("return pm.test('t', () => pm.expect('a').to.equal('b'));", &mut ctx)
            .unwrap();
        assert_eq!(value, json!({"name": "t", "passed": false, "error": "Expected b but got a"}));
    }

    #[test]
    fn test_response_undefined_before_request() {
        let sandbox = ScriptSandbox::default();
        let mut vars = VariableTable::new();
        let req = request();
        let mut ctx = ScriptContext::new(&mut vars, &[], &req);

        let value = sandbox
            .execute_script("return [typeof pm.response, typeof response];", &mut ctx)
            .unwrap();
        assert_eq!(value, json!(["undefined", "undefined"]));
    }

    #[test]
    fn test_environment_set_and_get() {
        let sandbox = ScriptSandbox::default();
        let envs = vec![
            Environment::new("e1", "dev").with_variable("host", "localhost"),
            Environment::new("e2", "prod"),
        ];
        let mut vars = crate::request::merge_environments(&envs);
        let req = request();
        let mut ctx = ScriptContext::new(&mut vars, &envs, &req);

        let value = sandbox
            .execute_script(
                r#"
                pm.environment.set('token', 'abc');
                pm.globals.set('count', 3, 'prod');
                return [pm.environment.get('host'), pm.globals.get('token'), pm.environment.get('nope'),
                        environments.length];
                "#,
                &mut ctx,
            )
            .unwrap();
        assert_eq!(value, json!(["localhost", "abc", null, 2]));

        let updates = ctx.take_updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].environment_id, "e1");
        assert_eq!((updates[0].key.as_str(), updates[0].value.as_str()), ("token", "abc"));
        assert_eq!(updates[1].environment_id, "e2");
        assert_eq!(updates[1].value, "3");
        assert_eq!(vars["token"], "abc");
        assert_eq!(vars["count"], "3");
    }

    #[test]
    fn test_failed_script_keeps_writes_before_throw() {
        let sandbox = ScriptSandbox::default();
        let envs = vec![Environment::new("e1", "dev")];
        let mut vars = VariableTable::new();
        let req = request();
        let mut ctx = ScriptContext::new(&mut vars, &envs, &req);

        let result = sandbox.execute_script("pm.environment.set('a', '1'); undefinedFn();", &mut ctx);
        assert!(result.is_err());
        assert_eq!(ctx.updates.len(), 1);
        assert_eq!(vars["a"], "1");
    }
}
