//! Schedule and execution history persistence

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{FileStore, KeyValueStore, MemoryStore};
use crate::config::StorageConfig;
use crate::errors::{OpenRequestError, Result};
use crate::models::{Schedule, ScheduleExecution};

const SCHEDULES_KEY: &str = "schedules";
const EXECUTIONS_KEY: &str = "schedule_executions";

/// Published after every write; `key` is the full namespaced key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
}

/// Schedules and their execution history over a [`KeyValueStore`]
#[derive(Clone)]
pub struct StorageService {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    max_executions: usize,
    changes: broadcast::Sender<StorageChange>,
    // Serializes read-modify-write cycles
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("prefix", &self.prefix)
            .field("max_executions", &self.max_executions)
            .finish()
    }
}

impl StorageService {
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: &str, max_executions: usize) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            store,
            prefix: prefix.to_string(),
            max_executions,
            changes,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// File-backed service as configured
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            Arc::new(FileStore::new(config.dir.clone())),
            &config.namespace,
            config.max_executions,
        )
    }

    /// Memory-backed service with the default namespace and cap
    pub fn in_memory() -> Self {
        let defaults = StorageConfig::default();
        Self::new(Arc::new(MemoryStore::new()), &defaults.namespace, defaults.max_executions)
    }

    /// Receive a [`StorageChange`] for every subsequent write
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }

    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn read_list<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let key = self.key(name);
        match self.store.get(&key)? {
            Some(data) if !data.trim().is_empty() => Ok(serde_json::from_str(&data)?),
            _ => Ok(Vec::new()),
        }
    }

    fn write_list<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        let key = self.key(name);
        self.store.set(&key, &serde_json::to_string(items)?)?;
        debug!(key = %key, count = items.len(), "Storage updated");
        // No receivers is fine
        let _ = self.changes.send(StorageChange { key });
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| OpenRequestError::Storage("Storage lock poisoned".to_string()))
    }

    // Schedules

    pub fn get_schedules(&self) -> Result<Vec<Schedule>> {
        self.read_list(SCHEDULES_KEY)
    }

    pub fn get_schedule(&self, id: &str) -> Result<Option<Schedule>> {
        Ok(self.get_schedules()?.into_iter().find(|s| s.id == id))
    }

    /// Insert a new schedule, or replace the stored one and bump `updatedAt`
    pub fn save_schedule(&self, schedule: &Schedule) -> Result<()> {
        let _guard = self.lock()?;
        let mut schedules = self.get_schedules()?;

        match schedules.iter().position(|s| s.id == schedule.id) {
            Some(index) => {
                let mut updated = schedule.clone();
                updated.updated_at = Utc::now();
                schedules[index] = updated;
            }
            None => schedules.push(schedule.clone()),
        }

        self.write_list(SCHEDULES_KEY, &schedules)
    }

    /// Record a finished run on the stored copy of `schedule`.
    ///
    /// Only the run metadata changes, so edits saved while the run was in
    /// progress survive. `schedule` itself is stored when no copy exists.
    pub fn record_schedule_run(
        &self,
        schedule: &Schedule,
        execution: &ScheduleExecution,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<Schedule> {
        let _guard = self.lock()?;
        let mut schedules = self.get_schedules()?;

        let recorded = match schedules.iter_mut().find(|s| s.id == schedule.id) {
            Some(stored) => {
                stored.record_run(execution, next_run);
                stored.clone()
            }
            None => {
                let mut recorded = schedule.clone();
                recorded.record_run(execution, next_run);
                schedules.push(recorded.clone());
                recorded
            }
        };

        self.write_list(SCHEDULES_KEY, &schedules)?;
        Ok(recorded)
    }

    /// Delete a schedule together with its execution history
    pub fn delete_schedule(&self, id: &str) -> Result<()> {
        let _guard = self.lock()?;

        let schedules: Vec<Schedule> = self
            .get_schedules()?
            .into_iter()
            .filter(|s| s.id != id)
            .collect();
        self.write_list(SCHEDULES_KEY, &schedules)?;

        let executions: Vec<ScheduleExecution> = self
            .get_schedule_executions()?
            .into_iter()
            .filter(|e| e.schedule_id != id)
            .collect();
        self.write_list(EXECUTIONS_KEY, &executions)
    }

    // Executions

    /// All executions, newest first
    pub fn get_schedule_executions(&self) -> Result<Vec<ScheduleExecution>> {
        self.read_list(EXECUTIONS_KEY)
    }

    pub fn get_schedule_executions_by_schedule(&self, schedule_id: &str) -> Result<Vec<ScheduleExecution>> {
        Ok(self
            .get_schedule_executions()?
            .into_iter()
            .filter(|e| e.schedule_id == schedule_id)
            .collect())
    }

    /// Prepend an execution; the oldest ones beyond the cap are dropped
    pub fn save_schedule_execution(&self, execution: &ScheduleExecution) -> Result<()> {
        let _guard = self.lock()?;
        let mut executions = self.get_schedule_executions()?;
        executions.insert(0, execution.clone());

        if executions.len() > self.max_executions {
            warn!(
                dropped = executions.len() - self.max_executions,
                "Execution history full, dropping oldest entries"
            );
            executions.truncate(self.max_executions);
        }

        self.write_list(EXECUTIONS_KEY, &executions)
    }

    pub fn delete_schedule_execution(&self, id: &str) -> Result<()> {
        let _guard = self.lock()?;
        let executions: Vec<ScheduleExecution> = self
            .get_schedule_executions()?
            .into_iter()
            .filter(|e| e.id != id)
            .collect();
        self.write_list(EXECUTIONS_KEY, &executions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExecutionStatus;

    fn execution(id: &str, schedule_id: &str) -> ScheduleExecution {
        let now = Utc::now();
        ScheduleExecution {
            id: id.to_string(),
            schedule_id: schedule_id.to_string(),
            schedule_name: "s".to_string(),
            start_time: now,
            end_time: now,
            status: ExecutionStatus::Success,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            error: None,
            collections: Vec::new(),
        }
    }

    #[test]
    fn test_save_schedule_inserts_then_replaces() {
        let storage = StorageService::in_memory();
        let mut schedule = Schedule::new("s1", "Nightly", vec!["c1".to_string()], 5);
        storage.save_schedule(&schedule).unwrap();

        schedule.name = "Hourly".to_string();
        let before = schedule.updated_at;
        storage.save_schedule(&schedule).unwrap();

        let stored = storage.get_schedules().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "Hourly");
        assert!(stored[0].updated_at >= before);
    }

    #[test]
    fn test_execution_history_cap_newest_first() {
        let storage = StorageService::new(Arc::new(MemoryStore::new()), "t_", 3);
        for i in 0..5 {
            storage.save_schedule_execution(&execution(&i.to_string(), "s1")).unwrap();
        }
        let ids: Vec<String> = storage
            .get_schedule_executions()
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["4", "3", "2"]);
    }

    #[test]
    fn test_delete_schedule_removes_its_executions() {
        let storage = StorageService::in_memory();
        storage.save_schedule(&Schedule::new("s1", "a", vec![], 1)).unwrap();
        storage.save_schedule(&Schedule::new("s2", "b", vec![], 1)).unwrap();
        storage.save_schedule_execution(&execution("e1", "s1")).unwrap();
        storage.save_schedule_execution(&execution("e2", "s2")).unwrap();

        storage.delete_schedule("s1").unwrap();

        assert!(storage.get_schedule("s1").unwrap().is_none());
        assert!(storage.get_schedule("s2").unwrap().is_some());
        assert!(storage.get_schedule_executions_by_schedule("s1").unwrap().is_empty());
        assert_eq!(storage.get_schedule_executions_by_schedule("s2").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_execution() {
        let storage = StorageService::in_memory();
        storage.save_schedule_execution(&execution("e1", "s1")).unwrap();
        storage.save_schedule_execution(&execution("e2", "s1")).unwrap();
        storage.delete_schedule_execution("e1").unwrap();
        let remaining = storage.get_schedule_executions().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "e2");
    }

    #[test]
    fn test_record_run_keeps_concurrent_edits() {
        let storage = StorageService::in_memory();
        let armed = Schedule::new("s1", "Original", vec!["c1".to_string()], 5);
        storage.save_schedule(&armed).unwrap();

        let mut edited = armed.clone();
        edited.name = "Renamed".to_string();
        edited.enabled = false;
        storage.save_schedule(&edited).unwrap();

        let mut run = execution("e1", "s1");
        run.status = ExecutionStatus::Partial;
        run.error = Some("boom".to_string());
        let recorded = storage.record_schedule_run(&armed, &run, None).unwrap();

        let stored = storage.get_schedule("s1").unwrap().unwrap();
        assert_eq!(stored, recorded);
        assert_eq!(stored.name, "Renamed");
        assert!(!stored.enabled);
        assert_eq!(stored.last_run, Some(run.end_time));
        assert_eq!(stored.last_result, Some(ExecutionStatus::Partial));
        assert_eq!(stored.last_error.as_deref(), Some("boom"));
        assert_eq!(stored.next_run, None);
    }

    #[test]
    fn test_record_run_stores_missing_schedule() {
        let storage = StorageService::in_memory();
        let armed = Schedule::new("s1", "Gone", vec![], 5);
        let next = Utc::now();

        storage
            .record_schedule_run(&armed, &execution("e1", "s1"), Some(next))
            .unwrap();

        let stored = storage.get_schedule("s1").unwrap().unwrap();
        assert_eq!(stored.name, "Gone");
        assert_eq!(stored.next_run, Some(next));
        assert_eq!(stored.last_result, Some(ExecutionStatus::Success));
    }

    #[test]
    fn test_changes_are_broadcast() {
        let storage = StorageService::in_memory();
        let mut rx = storage.subscribe();
        storage.save_schedule(&Schedule::new("s1", "a", vec![], 1)).unwrap();
        assert_eq!(rx.try_recv().unwrap().key, "open_request_api_schedules");
    }
}
