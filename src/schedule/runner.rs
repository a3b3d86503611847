//! One schedule run over its collections

use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::CollectionSource;
use crate::models::{
    CollectionExecution, Environment, EnvironmentUpdate, ExecutionStatus, ItemStatus,
    RequestExecution, Schedule, ScheduleExecution,
};
use crate::request::{EnvironmentUpdateFn, FileRegistry, RequestExecutor};

/// Run every request of every collection of `schedule`, strictly in order.
///
/// Environment writes made by one request are applied to `environments`
/// before the next request runs, and each one is passed to `on_update`.
/// A collection that fails to load is marked `error` and contributes no
/// requests to the counts.
pub async fn run_schedule(
    executor: &RequestExecutor,
    source: &dyn CollectionSource,
    schedule: &Schedule,
    mut environments: Vec<Environment>,
    on_update: &mut EnvironmentUpdateFn<'_>,
) -> ScheduleExecution {
    let start_time = Utc::now();
    let files = FileRegistry::default();
    let mut collections = Vec::with_capacity(schedule.collections.len());
    let mut successful = 0usize;
    let mut failed = 0usize;

    info!(schedule = %schedule.name, collections = schedule.collections.len(), "Running schedule");

    for collection_id in &schedule.collections {
        let mut collection_execution = CollectionExecution {
            id: collection_id.clone(),
            name: collection_id.clone(),
            status: ItemStatus::Success,
            requests: Vec::new(),
        };

        let collection = match source.get_collection(collection_id).await {
            Ok(collection) => collection,
            Err(e) => {
                error!(collection = %collection_id, error = %e, "Failed to load collection");
                collection_execution.status = ItemStatus::Error;
                collections.push(collection_execution);
                continue;
            }
        };
        collection_execution.name = collection.name.clone();

        for request in &collection.requests {
            let started = Instant::now();
            let mut pending: Vec<EnvironmentUpdate> = Vec::new();

            let outcome = {
                let mut forward = |update: &EnvironmentUpdate| {
                    pending.push(update.clone());
                    on_update(update);
                };
                executor
                    .execute_with(request, &environments, &files, Some(&mut forward))
                    .await
            };

            for update in &pending {
                update.apply_to(&mut environments);
            }

            let response_time = started.elapsed().as_millis() as u64;
            let (status, error) = match outcome {
                Ok(_) => {
                    successful += 1;
                    (ItemStatus::Success, None)
                }
                Err(failure) => {
                    warn!(
                        schedule = %schedule.name,
                        request = %request.name,
                        error = %failure,
                        "Scheduled request failed"
                    );
                    failed += 1;
                    collection_execution.status = ItemStatus::Error;
                    (ItemStatus::Error, Some(failure.message().to_string()))
                }
            };

            collection_execution.requests.push(RequestExecution {
                id: request.id.clone(),
                name: request.name.clone(),
                status,
                error,
                response_time,
            });
        }

        collections.push(collection_execution);
    }

    let status = ExecutionStatus::from_counts(successful, failed);
    info!(
        schedule = %schedule.name,
        status = ?status,
        successful,
        failed,
        "Schedule run finished"
    );

    ScheduleExecution {
        id: Uuid::new_v4().to_string(),
        schedule_id: schedule.id.clone(),
        schedule_name: schedule.name.clone(),
        start_time,
        end_time: Utc::now(),
        status,
        total_requests: successful + failed,
        successful_requests: successful,
        failed_requests: failed,
        error: None,
        collections,
    }
}
