//! OpenRequest library interface
//!
//! Executes stored HTTP requests against layered environments, runs their
//! pre-request, post-response and test scripts in a sandboxed JavaScript
//! engine, and replays whole collections on a recurring schedule.
//!
//! # Module Organization
//!
//! - [`models`] - Requests, environments, schedules and their JSON shapes
//! - [`request`] - Variable substitution, body building and the [`RequestExecutor`]
//! - [`scripting`] - The `pm` scripting sandbox
//! - [`schedule`] - The [`ScheduleEngine`]
//! - [`storage`] - Local persistence of schedules and execution history
//! - [`api`] - Client for the remote collections/environments API
//! - [`config`] - Configuration file and environment overrides
//! - [`errors`] - Error types (OpenRequestError, Result)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mime;
pub mod models;
pub mod request;
pub mod schedule;
pub mod scripting;
pub mod storage;

pub use errors::{ExecutionFailure, OpenRequestError, Result};
pub use request::RequestExecutor;
pub use schedule::ScheduleEngine;
