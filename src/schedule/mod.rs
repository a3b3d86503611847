//! Recurring batch execution of collections
//!
//! A [`ScheduleEngine`] arms one timer per enabled schedule. Every tick runs
//! the schedule's collections through the [`RequestExecutor`](crate::request::RequestExecutor),
//! records a [`ScheduleExecution`](crate::models::ScheduleExecution) in storage
//! and notifies the registered observers.

mod engine;
mod runner;

pub use engine::{EnvironmentCallback, ExecutionObserver, ScheduleEngine, ScheduleObserver};
pub use runner::run_schedule;
