//! Request executor
//!
//! Runs one stored request end to end: environments are merged, the
//! pre-request script runs, URL, headers and body are resolved, the request
//! is dispatched, the response captured, then the post-response script and
//! the tests run against it.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde_json::Value as JsonValue;
use tracing::{debug, error, info, warn};
use url::Url;

use super::body::{resolve_body, FileRegistry, RequestBody};
use super::variables::{merge_environments, replace_variables, resolve_url};
use crate::config::ExecutorConfig;
use crate::errors::{ExecutionFailure, OpenRequestError, Result};
use crate::mime::is_json_content_type;
use crate::models::{
    body_text, Environment, EnvironmentUpdate, HeaderMap, HttpRequest, RequestResponse, TestResult,
    VariableTable,
};
use crate::scripting::{ScriptContext, ScriptLimits, ScriptSandbox};

pub const USER_AGENT_STRING: &str = concat!("OpenRequest/", env!("CARGO_PKG_VERSION"));

/// Default network timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Name of the synthetic result recorded when the test runner itself fails
pub const TEST_EXECUTION_ERROR: &str = "Test Execution Error";

/// Callback receiving the environment writes made by scripts
pub type EnvironmentUpdateFn<'a> = dyn FnMut(&EnvironmentUpdate) + Send + 'a;

/// Executes stored requests
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
    timeout: Duration,
    sandbox: ScriptSandbox,
}

impl RequestExecutor {
    /// Executor with the default timeout and script limits
    pub fn new() -> Result<Self> {
        Self::from_config(&ExecutorConfig::default())
    }

    pub fn from_config(config: &ExecutorConfig) -> Result<Self> {
        let client = build_client()?;
        let limits = ScriptLimits {
            timeout: Duration::from_millis(config.script_timeout_ms),
            memory_limit: config.script_memory_limit_mb * 1024 * 1024,
            ..ScriptLimits::default()
        };
        Ok(Self::with_client(
            client,
            Duration::from_secs(config.timeout_secs),
            ScriptSandbox::new(limits),
        ))
    }

    pub fn with_client(client: Client, timeout: Duration, sandbox: ScriptSandbox) -> Self {
        Self { client, timeout, sandbox }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn sandbox(&self) -> &ScriptSandbox {
        &self.sandbox
    }

    /// Execute `request` with no form files and no update callback
    pub async fn execute(
        &self,
        request: &HttpRequest,
        environments: &[Environment],
    ) -> std::result::Result<RequestResponse, ExecutionFailure> {
        self.execute_with(request, environments, &FileRegistry::default(), None)
            .await
    }

    /// Execute `request` against `environments`.
    ///
    /// Every environment write a script makes is passed to `on_update` right
    /// after that script finishes, in call order. HTTP error statuses are
    /// responses; only invalid JSON bodies and transport failures fail.
    pub async fn execute_with(
        &self,
        request: &HttpRequest,
        environments: &[Environment],
        files: &FileRegistry,
        mut on_update: Option<&mut EnvironmentUpdateFn<'_>>,
    ) -> std::result::Result<RequestResponse, ExecutionFailure> {
        let start = Instant::now();
        let fail = |err: OpenRequestError| {
            error!(request = %request.name, error = %err, "Request execution failed");
            ExecutionFailure::new(err.to_string(), elapsed_ms(start))
        };

        let mut variables = merge_environments(environments);

        if has_script(&request.pre_script) {
            let mut ctx = ScriptContext::new(&mut variables, environments, request);
            if let Err(e) = self.sandbox.execute_script(&request.pre_script, &mut ctx) {
                warn!(request = %request.name, error = %e, "Pre-request script error");
            }
            forward_updates(ctx.take_updates(), on_update.as_deref_mut());
        }

        let url = resolve_url(&request.url, request.path_variables.as_ref(), &variables);
        let mut headers: HeaderMap = request
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), replace_variables(v, &variables)))
            .collect();
        let body = resolve_body(request, &variables, &mut headers, files).map_err(fail)?;

        debug!(method = %request.method, url = %url, "Dispatching request");
        let response = self
            .dispatch(request, &url, &headers, body)
            .await
            .map_err(fail)?;
        let mut result = capture_response(response, start).await.map_err(fail)?;
        info!(
            method = %request.method,
            url = %url,
            status = result.status,
            time_ms = result.time,
            "Request completed"
        );

        if has_script(&request.post_script) {
            let mut ctx = ScriptContext::new(&mut variables, environments, request).with_response(&result);
            if let Err(e) = self.sandbox.execute_script(&request.post_script, &mut ctx) {
                warn!(request = %request.name, error = %e, "Post-response script error");
            }
            forward_updates(ctx.take_updates(), on_update.as_deref_mut());
        }

        if has_script(&request.tests) {
            let test_results = self.run_tests(request, environments, &mut variables, &result, &mut on_update);
            result.test_results = test_results;
        }

        Ok(result)
    }

    fn run_tests(
        &self,
        request: &HttpRequest,
        environments: &[Environment],
        variables: &mut VariableTable,
        response: &RequestResponse,
        on_update: &mut Option<&mut EnvironmentUpdateFn<'_>>,
    ) -> Vec<TestResult> {
        let mut ctx = ScriptContext::new(variables, environments, request).with_response(response);
        let results = match self.sandbox.execute_tests(&request.tests, &mut ctx) {
            Ok(results) => results,
            Err(e) => {
                warn!(request = %request.name, error = %e, "Test execution error");
                vec![TestResult::fail(TEST_EXECUTION_ERROR, &e.to_string())]
            }
        };
        forward_updates(ctx.take_updates(), on_update.as_deref_mut());
        results
    }

    async fn dispatch(
        &self,
        request: &HttpRequest,
        url: &str,
        headers: &HeaderMap,
        body: Option<RequestBody>,
    ) -> Result<Response> {
        let url = Url::parse(url)
            .map_err(|e| OpenRequestError::Config(format!("Invalid URL '{}': {}", url, e)))?;

        let mut builder = self
            .client
            .request(request.method.into(), url)
            .timeout(self.timeout);

        for (name, value) in headers {
            let header_name = match HeaderName::try_from(name.as_str()) {
                Ok(n) => n,
                Err(e) => {
                    warn!(header = %name, error = %e, "Skipping invalid header name");
                    continue;
                }
            };
            let header_value = match HeaderValue::try_from(value.as_str()) {
                Ok(v) => v,
                Err(e) => {
                    warn!(header = %name, error = %e, "Skipping invalid header value");
                    continue;
                }
            };
            builder = builder.header(header_name, header_value);
        }

        builder = match body {
            Some(RequestBody::Text(text)) => builder.body(text),
            Some(RequestBody::Multipart(fields)) => builder.multipart(RequestBody::into_form(fields)?),
            None => builder,
        };

        builder.send().await.map_err(|e| self.describe_error(e))
    }

    fn describe_error(&self, err: reqwest::Error) -> OpenRequestError {
        if err.is_timeout() {
            OpenRequestError::Timeout(self.timeout.as_secs_f64())
        } else if err.is_connect() {
            OpenRequestError::Connection(err.to_string())
        } else {
            OpenRequestError::Request(err)
        }
    }
}

/// Build the HTTP client used for request execution
fn build_client() -> Result<Client> {
    Ok(Client::builder().user_agent(USER_AGENT_STRING).build()?)
}

async fn capture_response(response: Response, start: Instant) -> Result<RequestResponse> {
    let status = response.status();
    let headers = flatten_headers(response.headers());
    let is_json = headers
        .get("content-type")
        .map(|ct| is_json_content_type(ct))
        .unwrap_or(false);

    let text = response.text().await?;
    let time = elapsed_ms(start);

    let data = if is_json && !text.is_empty() {
        serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
    } else {
        JsonValue::String(text)
    };
    let size = body_text(&data).len() as u64;

    Ok(RequestResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("").to_string(),
        headers,
        data,
        time,
        size,
        test_results: Vec::new(),
    })
}

/// Lowercase header names; repeated headers joined with `, `
fn flatten_headers(headers: &reqwest::header::HeaderMap) -> HeaderMap {
    let mut flat = HeaderMap::new();
    for name in headers.keys() {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        flat.insert(name.as_str().to_string(), values.join(", "));
    }
    flat
}

fn forward_updates(updates: Vec<EnvironmentUpdate>, on_update: Option<&mut EnvironmentUpdateFn<'_>>) {
    if let Some(callback) = on_update {
        for update in &updates {
            callback(update);
        }
    }
}

fn has_script(source: &str) -> bool {
    !source.trim().is_empty()
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
