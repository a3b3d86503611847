//! Error types for openrequest

use serde::Serialize;
use thiserror::Error;

use crate::models::RequestResponse;

/// Main error type for openrequest
#[derive(Error, Debug)]
pub enum OpenRequestError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Timeout after {0:.1} seconds")]
    Timeout(f64),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Invalid JSON body")]
    InvalidJsonBody,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Schedule not found: {0}")]
    ScheduleNotFound(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
}

impl From<rquickjs::Error> for OpenRequestError {
    fn from(err: rquickjs::Error) -> Self {
        OpenRequestError::Script(format!("JavaScript error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, OpenRequestError>;

/// Failed request execution.
///
/// Carries a response-shaped value so callers can render a failure the same
/// way as a response: status 0, the message as both status text and body,
/// no headers, zero size.
#[derive(Error, Debug, Clone, Serialize)]
#[error("{}", .response.status_text)]
pub struct ExecutionFailure {
    #[serde(flatten)]
    pub response: RequestResponse,
}

impl ExecutionFailure {
    pub fn new(message: impl Into<String>, elapsed_ms: u64) -> Self {
        let message = message.into();
        Self {
            response: RequestResponse {
                status: 0,
                status_text: message.clone(),
                headers: Default::default(),
                data: serde_json::Value::String(message),
                time: elapsed_ms,
                size: 0,
                test_results: Vec::new(),
            },
        }
    }

    pub fn message(&self) -> &str {
        &self.response.status_text
    }
}
