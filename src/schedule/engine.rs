//! Schedule lifecycle: arming, disarming and running schedules

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::runner::run_schedule;
use crate::api::CollectionSource;
use crate::errors::{OpenRequestError, Result};
use crate::models::{Environment, EnvironmentUpdate, Schedule, ScheduleExecution};
use crate::request::RequestExecutor;
use crate::storage::StorageService;

/// Called with every completed run
pub type ExecutionObserver = Arc<dyn Fn(&ScheduleExecution) + Send + Sync>;
/// Called whenever a schedule's run metadata changes
pub type ScheduleObserver = Arc<dyn Fn(&Schedule) + Send + Sync>;
/// Called with every environment write made by a scheduled script
pub type EnvironmentCallback = Arc<dyn Fn(&EnvironmentUpdate) + Send + Sync>;

/// Runs schedules on their interval.
///
/// Cheap to clone; clones share the same timers and observers. Each armed
/// schedule owns one background task that waits for the next tick, runs
/// the schedule to completion and only then waits again, so runs of the
/// same schedule never overlap. Stopping a schedule cancels its timer but
/// lets a run that has already started finish.
#[derive(Clone)]
pub struct ScheduleEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    executor: RequestExecutor,
    source: Arc<dyn CollectionSource>,
    storage: StorageService,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    environments: Mutex<Vec<Environment>>,
    on_environment_update: RwLock<Option<EnvironmentCallback>>,
    on_execution: RwLock<Option<ExecutionObserver>>,
    on_schedule: RwLock<Option<ScheduleObserver>>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Ok(timers) = self.timers.get_mut() {
            for (_, handle) in timers.drain() {
                handle.abort();
            }
        }
    }
}

impl std::fmt::Debug for ScheduleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleEngine")
            .field("running", &self.running_schedules())
            .finish()
    }
}

impl ScheduleEngine {
    pub fn new(
        executor: RequestExecutor,
        source: Arc<dyn CollectionSource>,
        storage: StorageService,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                executor,
                source,
                storage,
                timers: Mutex::new(HashMap::new()),
                environments: Mutex::new(Vec::new()),
                on_environment_update: RwLock::new(None),
                on_execution: RwLock::new(None),
                on_schedule: RwLock::new(None),
            }),
        }
    }

    pub fn storage(&self) -> &StorageService {
        &self.inner.storage
    }

    /// Replace the environments scheduled runs start from
    pub fn set_active_environments(&self, environments: Vec<Environment>) {
        if let Ok(mut current) = self.inner.environments.lock() {
            *current = environments;
        }
    }

    /// Current environment snapshot, including writes made by earlier runs
    pub fn active_environments(&self) -> Vec<Environment> {
        self.inner
            .environments
            .lock()
            .map(|envs| envs.clone())
            .unwrap_or_default()
    }

    pub fn set_environment_update_callback<F>(&self, callback: F)
    where
        F: Fn(&EnvironmentUpdate) + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.inner.on_environment_update.write() {
            *slot = Some(Arc::new(callback));
        }
    }

    pub fn set_execution_observer<F>(&self, observer: F)
    where
        F: Fn(&ScheduleExecution) + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.inner.on_execution.write() {
            *slot = Some(Arc::new(observer));
        }
    }

    pub fn set_schedule_observer<F>(&self, observer: F)
    where
        F: Fn(&Schedule) + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.inner.on_schedule.write() {
            *slot = Some(Arc::new(observer));
        }
    }

    pub fn is_running(&self, schedule_id: &str) -> bool {
        self.inner
            .timers
            .lock()
            .map(|timers| timers.contains_key(schedule_id))
            .unwrap_or(false)
    }

    /// Ids of all armed schedules
    pub fn running_schedules(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .timers
            .lock()
            .map(|timers| timers.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Arm a schedule: first run one interval from now, then every interval.
    ///
    /// An already armed schedule with the same id is disarmed first. Must be
    /// called from within a Tokio runtime.
    pub fn start_schedule(&self, schedule: &Schedule) -> Result<()> {
        let timing = ScheduleTiming::of(schedule)?;

        self.stop_schedule(&schedule.id);

        let weak = Arc::downgrade(&self.inner);
        let armed = schedule.clone();
        let handle = tokio::spawn(tick_loop(weak, armed, timing.first_tick, timing.period));

        self.inner
            .timers
            .lock()
            .map_err(|_| OpenRequestError::InvalidSchedule("Timer registry poisoned".to_string()))?
            .insert(schedule.id.clone(), handle);

        info!(schedule = %schedule.name, interval_minutes = schedule.interval, "Schedule started");

        let mut announced = schedule.clone();
        announced.next_run = Some(timing.next_run);
        self.notify_schedule(&announced);

        Ok(())
    }

    /// Disarm a schedule; returns whether it was armed
    pub fn stop_schedule(&self, schedule_id: &str) -> bool {
        let handle = match self.inner.timers.lock() {
            Ok(mut timers) => timers.remove(schedule_id),
            Err(_) => None,
        };

        match handle {
            Some(handle) => {
                handle.abort();
                debug!(schedule = %schedule_id, "Schedule stopped");
                true
            }
            None => false,
        }
    }

    /// Disarm, then re-arm when the schedule is enabled
    pub fn update_schedule(&self, schedule: &Schedule) -> Result<()> {
        self.stop_schedule(&schedule.id);
        if schedule.enabled {
            self.start_schedule(schedule)?;
        }
        Ok(())
    }

    /// Arm every enabled stored schedule; returns how many were armed
    pub fn initialize_schedules(&self) -> Result<usize> {
        let mut started = 0;
        for schedule in self.inner.storage.get_schedules()? {
            if !schedule.enabled {
                continue;
            }
            match self.start_schedule(&schedule) {
                Ok(()) => started += 1,
                Err(e) => warn!(schedule = %schedule.name, error = %e, "Skipping schedule"),
            }
        }
        info!(started, "Schedules initialized");
        Ok(started)
    }

    /// Disarm every schedule
    pub fn cleanup(&self) {
        let handles: Vec<JoinHandle<()>> = match self.inner.timers.lock() {
            Ok(mut timers) => timers.drain().map(|(_, handle)| handle).collect(),
            Err(_) => Vec::new(),
        };
        for handle in &handles {
            handle.abort();
        }
        debug!(stopped = handles.len(), "All schedules stopped");
    }

    /// Run a stored schedule now, outside of its timer
    pub async fn execute_schedule_once(&self, schedule_id: &str) -> Result<ScheduleExecution> {
        let schedule = self
            .inner
            .storage
            .get_schedule(schedule_id)?
            .ok_or_else(|| OpenRequestError::ScheduleNotFound(schedule_id.to_string()))?;
        Ok(self.execute_schedule(&schedule).await)
    }

    /// Run `schedule` once, record the result and notify observers.
    ///
    /// Storage failures are logged; the execution is returned regardless.
    pub async fn execute_schedule(&self, schedule: &Schedule) -> ScheduleExecution {
        let environments = self.active_environments();
        let mut on_update = |update: &EnvironmentUpdate| self.apply_environment_update(update);

        let execution = run_schedule(
            &self.inner.executor,
            self.inner.source.as_ref(),
            schedule,
            environments,
            &mut on_update,
        )
        .await;

        let next_run = if self.is_running(&schedule.id) {
            ScheduleTiming::of(schedule).ok().map(|timing| timing.next_run)
        } else {
            None
        };
        let updated = match self.inner.storage.record_schedule_run(schedule, &execution, next_run) {
            Ok(stored) => stored,
            Err(e) => {
                error!(schedule = %schedule.name, error = %e, "Failed to save schedule");
                let mut updated = schedule.clone();
                updated.record_run(&execution, next_run);
                updated
            }
        };
        if let Err(e) = self.inner.storage.save_schedule_execution(&execution) {
            error!(schedule = %schedule.name, error = %e, "Failed to save schedule execution");
        }

        self.notify_schedule(&updated);
        if let Some(observer) = read_slot(&self.inner.on_execution) {
            observer(&execution);
        }

        execution
    }

    fn apply_environment_update(&self, update: &EnvironmentUpdate) {
        if let Ok(mut environments) = self.inner.environments.lock() {
            update.apply_to(&mut environments);
        }
        if let Some(callback) = read_slot(&self.inner.on_environment_update) {
            callback(update);
        }
    }

    fn notify_schedule(&self, schedule: &Schedule) {
        if let Some(observer) = read_slot(&self.inner.on_schedule) {
            observer(schedule);
        }
    }
}

fn read_slot<T: Clone>(slot: &RwLock<Option<T>>) -> Option<T> {
    slot.read().ok().and_then(|guard| guard.clone())
}

/// Timer parameters of a schedule, computed without overflow
struct ScheduleTiming {
    period: Duration,
    first_tick: Instant,
    next_run: chrono::DateTime<Utc>,
}

impl ScheduleTiming {
    fn of(schedule: &Schedule) -> Result<Self> {
        let invalid = |reason: &str| {
            OpenRequestError::InvalidSchedule(format!(
                "Schedule '{}' has an interval of {} minutes{}",
                schedule.name, schedule.interval, reason
            ))
        };
        if schedule.interval == 0 {
            return Err(invalid(""));
        }

        let period = schedule
            .interval
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| invalid(", which is too large"))?;
        let now = Instant::now();
        let first_tick = now
            .checked_add(period)
            .filter(|first| first.checked_add(period).is_some())
            .ok_or_else(|| invalid(", which is too large"))?;
        let next_run = chrono::Duration::from_std(period)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .ok_or_else(|| invalid(", which is too large"))?;

        Ok(Self {
            period,
            first_tick,
            next_run,
        })
    }
}

async fn tick_loop(engine: Weak<EngineInner>, armed: Schedule, first_tick: Instant, period: Duration) {
    let mut ticker = interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(inner) = engine.upgrade() else {
            break;
        };
        let engine = ScheduleEngine { inner };

        let current = match engine.inner.storage.get_schedule(&armed.id) {
            Ok(Some(stored)) => stored,
            Ok(None) => armed.clone(),
            Err(e) => {
                warn!(schedule = %armed.name, error = %e, "Could not reload schedule");
                armed.clone()
            }
        };

        // A detached task so that disarming cancels only the timer,
        // never a run that has already started
        let run = tokio::spawn(async move {
            engine.execute_schedule(&current).await;
        });
        if let Err(e) = run.await {
            error!(schedule = %armed.name, error = %e, "Scheduled run panicked");
        }
    }
}
