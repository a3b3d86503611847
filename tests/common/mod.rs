//! Shared fixtures for openrequest integration tests

#![allow(dead_code)]

use std::time::Duration;

use openrequest::models::{Environment, HttpRequest};
use openrequest::http::HttpMethod;
use openrequest::RequestExecutor;
use wiremock::MockServer;

/// A URL on a port nothing listens on
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:1/";

pub fn executor() -> RequestExecutor {
    RequestExecutor::new().expect("executor")
}

/// Executor with a short transport timeout
pub fn executor_with_timeout(timeout: Duration) -> RequestExecutor {
    let base = executor();
    RequestExecutor::with_client(reqwest::Client::new(), timeout, base.sandbox().clone())
}

pub fn get(server: &MockServer, path: &str) -> HttpRequest {
    HttpRequest::new(HttpMethod::Get, &format!("{}{}", server.uri(), path)).with_id("r1", "Test request")
}

pub fn post(server: &MockServer, path: &str) -> HttpRequest {
    HttpRequest::new(HttpMethod::Post, &format!("{}{}", server.uri(), path)).with_id("r1", "Test request")
}

pub fn env(id: &str, name: &str, vars: &[(&str, &str)]) -> Environment {
    vars.iter()
        .fold(Environment::new(id, name), |env, (k, v)| env.with_variable(k, v))
}
