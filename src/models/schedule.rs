//! Schedules and their execution records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate status of a schedule run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
    Partial,
}

impl ExecutionStatus {
    /// Aggregate request counts into a run status.
    ///
    /// Only attempted requests count: a collection that failed to load adds
    /// nothing, so a run whose other collections all succeeded is `Success`.
    pub fn from_counts(successful: usize, failed: usize) -> Self {
        if failed == 0 {
            ExecutionStatus::Success
        } else if successful > 0 {
            ExecutionStatus::Partial
        } else {
            ExecutionStatus::Error
        }
    }
}

/// Status of a single collection or request within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Error,
}

/// A recurring batch execution of one or more collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Target collection ids, run in order
    pub collections: Vec<String>,
    /// Minutes between runs
    pub interval: u64,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<ExecutionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    pub fn new(id: &str, name: &str, collections: Vec<String>, interval: u64) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            collections,
            interval,
            enabled: true,
            last_run: None,
            next_run: None,
            last_result: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the outcome of a run; every other field is left as it is
    pub fn record_run(&mut self, execution: &ScheduleExecution, next_run: Option<DateTime<Utc>>) {
        self.last_run = Some(execution.end_time);
        self.last_result = Some(execution.status);
        self.last_error = execution.error.clone();
        if next_run.is_some() {
            self.next_run = next_run;
        }
        self.updated_at = Utc::now();
    }
}

/// Outcome of one request inside a schedule run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestExecution {
    pub id: String,
    pub name: String,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub response_time: u64,
}

/// Outcome of one collection inside a schedule run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionExecution {
    pub id: String,
    pub name: String,
    pub status: ItemStatus,
    pub requests: Vec<RequestExecution>,
}

/// Record of one completed schedule run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleExecution {
    pub id: String,
    pub schedule_id: String,
    pub schedule_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub collections: Vec<CollectionExecution>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_counts() {
        assert_eq!(ExecutionStatus::from_counts(0, 0), ExecutionStatus::Success);
        assert_eq!(ExecutionStatus::from_counts(3, 0), ExecutionStatus::Success);
        assert_eq!(ExecutionStatus::from_counts(2, 1), ExecutionStatus::Partial);
        assert_eq!(ExecutionStatus::from_counts(0, 4), ExecutionStatus::Error);
    }

    #[test]
    fn test_schedule_round_trips_through_storage_json() {
        let mut schedule = Schedule::new("s1", "Nightly", vec!["c1".to_string()], 15);
        schedule.last_result = Some(ExecutionStatus::Partial);

        let json = serde_json::to_value(&schedule).unwrap();
        assert_eq!(json["lastResult"], "partial");
        assert_eq!(json["interval"], 15);
        assert!(json.get("lastError").is_none());

        let back: Schedule = serde_json::from_value(json).unwrap();
        assert_eq!(back, schedule);
    }
}
