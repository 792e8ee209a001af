//! Running a plan's assignments, in parallel or as a chain.

use futures::future::join_all;
use tracing::{debug, error, warn};

use crate::error::WorkerError;
use crate::router::plan::Assignment;
use crate::util::truncate;
use crate::workers::{WorkerRegistry, WorkerResult};

/// Previous step's output carried into the next sequential task.
pub const CHAIN_EXCERPT: usize = 500;

/// Run every assignment concurrently, one spawned task each.
///
/// The result list always has one entry per assignment, in order. Unknown
/// worker ids and panicked workers become failed entries.
pub async fn run_parallel(
    registry: &WorkerRegistry,
    assignments: &[Assignment],
    session_id: &str,
) -> Vec<WorkerResult> {
    let runs = assignments.iter().map(|assignment| {
        let worker = registry.get(&assignment.worker_id);
        let worker_id = assignment.worker_id.clone();
        let task = assignment.task.clone();
        let session_id = session_id.to_string();

        async move {
            let Some(worker) = worker else {
                warn!(worker_id = %worker_id, "Plan names an unknown worker");
                let err = WorkerError::NotFound { id: worker_id.clone() };
                return WorkerResult::failure(worker_id.clone(), worker_id, err.to_string());
            };

            let name = worker.name();
            let handle = tokio::spawn(async move { worker.run(&task, &session_id).await });
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(worker_id = %worker_id, error = %e, "Worker task panicked");
                    WorkerResult::failure(worker_id.clone(), name, format!("Worker {worker_id} crashed: {e}"))
                }
            }
        }
    });

    join_all(runs).await
}

/// Run assignments strictly in order, feeding each output forward.
///
/// Unknown worker ids are skipped, so the result list can be shorter than the
/// plan.
pub async fn run_sequential(
    registry: &WorkerRegistry,
    assignments: &[Assignment],
    session_id: &str,
) -> Vec<WorkerResult> {
    let mut results = Vec::with_capacity(assignments.len());
    let mut previous = String::new();

    for assignment in assignments {
        let Some(worker) = registry.get(&assignment.worker_id) else {
            warn!(worker_id = %assignment.worker_id, "Skipping assignment for unknown worker");
            continue;
        };

        let task = chain_task(&assignment.task, &previous);
        debug!(worker_id = worker.id(), chained = !previous.is_empty(), "Running step");
        let result = worker.run(&task, session_id).await;
        previous = result.output.clone();
        results.push(result);
    }

    results
}

fn chain_task(task: &str, previous: &str) -> String {
    if previous.is_empty() {
        task.to_string()
    } else {
        format!(
            "{task}\n\nContext from previous step:\n{}",
            truncate(previous, CHAIN_EXCERPT)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_task_without_previous_is_unchanged() {
        assert_eq!(chain_task("draft it", ""), "draft it");
    }

    #[test]
    fn chain_task_caps_previous_output() {
        let previous = "q".repeat(2000);
        let task = chain_task("draft it", &previous);
        assert!(task.starts_with("draft it\n\nContext from previous step:\n"));
        assert_eq!(task.matches('q').count(), CHAIN_EXCERPT);
    }
}
