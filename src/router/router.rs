//! The router: plans a job, dispatches it, and keeps the session record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::error::{Error, JobError};
use crate::llm::{ChatMessage, CompletionRequest};
use crate::memory::MemoryManager;
use crate::router::dispatch::{run_parallel, run_sequential};
use crate::router::plan::RoutingPlan;
use crate::store::SessionStatus;
use crate::util::{truncate, truncate_with_ellipsis};
use crate::workers::{StatusEvent, WorkerDeps, WorkerRegistry, WorkerResult, WorkerStatus};

/// Memory scope of the router itself.
pub const ROUTER_ID: &str = "router";

const ROUTER_TEMPERATURE: f32 = 0.4;
/// Per-worker output excerpt in the router's own compressed summary.
const AGGREGATE_EXCERPT: usize = 200;

/// What a caller gets back for one submitted task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub session_id: String,
    pub needs_clarification: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
    /// The plan's one-line summary.
    pub plan: String,
    pub results: Vec<WorkerResult>,
}

/// Turns tasks into plans and runs them against the worker roster.
pub struct Router {
    workers: Arc<WorkerRegistry>,
    deps: WorkerDeps,
    fallback_worker: String,
}

impl Router {
    pub fn new(
        workers: Arc<WorkerRegistry>,
        deps: WorkerDeps,
        fallback_worker: impl Into<String>,
    ) -> Self {
        Self {
            workers,
            deps,
            fallback_worker: fallback_worker.into(),
        }
    }

    pub fn workers(&self) -> &WorkerRegistry {
        &self.workers
    }

    /// Tracker holding background compression tasks.
    pub fn tracker(&self) -> &TaskTracker {
        &self.deps.tracker
    }

    /// Process one task end to end.
    ///
    /// Plan and worker problems never fail the job. Only creating or
    /// updating the session record can, after a best-effort attempt to mark
    /// the session failed.
    pub async fn handle(&self, task: &str) -> Result<JobResponse, Error> {
        let session_id = self.create_session(task).await?;
        info!(session_id = %session_id, "Job received");

        let memory = self.deps.memory_for(ROUTER_ID, &session_id);
        self.status(&session_id, WorkerStatus::Thinking, None);

        match self.run_job(&memory, task).await {
            Ok(response) => Ok(response),
            Err(e) => {
                self.mark_failed(&session_id).await;
                self.status(&session_id, WorkerStatus::Error, Some(e.to_string()));
                Err(e.into())
            }
        }
    }

    async fn run_job(&self, memory: &MemoryManager, task: &str) -> Result<JobResponse, JobError> {
        let session_id = memory.session_id();
        let plan = self.plan(memory, task).await;

        let plan_json = serde_json::to_string(&plan).unwrap_or_default();
        if let Err(e) = memory
            .record_decision(&format!("Routing plan: {plan_json}"))
            .await
        {
            warn!(session_id, error = %e, "Failed to record routing decision");
        }

        self.persist_plan(session_id, &plan_json).await?;
        self.set_status(session_id, SessionStatus::Running).await?;
        self.status(session_id, WorkerStatus::Working, Some(plan.summary.clone()));

        if plan.needs_clarification {
            self.set_status(session_id, SessionStatus::Done).await?;
            self.status(session_id, WorkerStatus::Done, None);
            return Ok(JobResponse {
                session_id: session_id.to_string(),
                needs_clarification: true,
                clarification_question: plan.clarification_question,
                plan: plan.summary,
                results: Vec::new(),
            });
        }

        let parallel = plan.runs_in_parallel();
        info!(
            session_id,
            parallel,
            assignments = plan.assignments.len(),
            "Dispatching plan"
        );
        let results = if parallel {
            run_parallel(&self.workers, &plan.assignments, session_id).await
        } else {
            run_sequential(&self.workers, &plan.assignments, session_id).await
        };

        memory.compress_in_background(&self.deps.tracker, task.to_string(), aggregate(&results));

        self.set_status(session_id, SessionStatus::Done).await?;
        self.status(session_id, WorkerStatus::Done, None);
        info!(
            session_id,
            succeeded = results.iter().filter(|r| r.success).count(),
            failed = results.iter().filter(|r| !r.success).count(),
            "Job finished"
        );

        Ok(JobResponse {
            session_id: session_id.to_string(),
            needs_clarification: false,
            clarification_question: None,
            plan: plan.summary,
            results,
        })
    }

    /// Ask the model for a plan. Any failure yields the fallback plan.
    async fn plan(&self, memory: &MemoryManager, task: &str) -> RoutingPlan {
        let context = match memory.build_context().await {
            Ok(context) => context,
            Err(e) => {
                warn!(error = %e, "Router context unavailable, planning without memory");
                String::new()
            }
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(format!("{}\n{}", self.routing_prompt(), context)),
            ChatMessage::user(task),
        ])
        .with_temperature(ROUTER_TEMPERATURE);

        let reply = match self.deps.llm.complete(request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!(error = %e, fallback = %self.fallback_worker, "Routing call failed, using fallback plan");
                return RoutingPlan::fallback(task, &self.fallback_worker);
            }
        };

        match RoutingPlan::parse(&reply) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(
                    error = %e,
                    reply = %truncate_with_ellipsis(&reply, 200),
                    fallback = %self.fallback_worker,
                    "Rejected routing plan, using fallback"
                );
                RoutingPlan::fallback(task, &self.fallback_worker)
            }
        }
    }

    fn routing_prompt(&self) -> String {
        let roster: Vec<String> = self
            .workers
            .profiles()
            .iter()
            .map(|p| format!("- {} ({}): {}", p.id, p.name, p.specialty))
            .collect();

        format!(
            "You are the office router. You receive tasks and assign them to specialist workers.

Your team:
{}

Respond ONLY with valid JSON matching this schema:
{{
  \"needsClarification\": boolean,
  \"clarificationQuestion\": \"string (only when needsClarification is true)\",
  \"parallel\": boolean,
  \"assignments\": [
    {{ \"workerId\": \"one of the ids above\", \"task\": \"specific task description\", \"reason\": \"why this worker\" }}
  ],
  \"summary\": \"one sentence describing the plan\"
}}

Rules:
- Simple single-domain tasks go to ONE worker
- Split complex tasks into sub-tasks; set parallel=true when they do not depend on each other
- Use sequential order when a step needs the previous step's output
- Only ask for clarification when the task is genuinely ambiguous
- Keep task descriptions specific and actionable",
            roster.join("\n")
        )
    }

    // ── Session bookkeeping ─────────────────────────────────────────

    async fn create_session(&self, task: &str) -> Result<String, JobError> {
        match &self.deps.store {
            Some(store) => store
                .create_session(task)
                .await
                .map(|s| s.id)
                .map_err(|e| JobError::SessionCreate {
                    reason: e.to_string(),
                }),
            // Degraded mode: the id only scopes this run's events.
            None => Ok(uuid::Uuid::new_v4().to_string()),
        }
    }

    async fn persist_plan(&self, session_id: &str, plan_json: &str) -> Result<(), JobError> {
        let Some(store) = &self.deps.store else {
            return Ok(());
        };
        store
            .set_session_plan(session_id, plan_json)
            .await
            .map_err(|e| JobError::SessionUpdate {
                id: session_id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn set_status(&self, session_id: &str, status: SessionStatus) -> Result<(), JobError> {
        if let Some(store) = &self.deps.store {
            store
                .update_session_status(session_id, status)
                .await
                .map_err(|e| JobError::SessionUpdate {
                    id: session_id.to_string(),
                    reason: e.to_string(),
                })?;
        }
        self.deps.notify(StatusEvent::session(session_id, status));
        Ok(())
    }

    async fn mark_failed(&self, session_id: &str) {
        if let Err(e) = self.set_status(session_id, SessionStatus::Failed).await {
            warn!(session_id, error = %e, "Could not mark session failed");
        }
    }

    fn status(&self, session_id: &str, status: WorkerStatus, message: Option<String>) {
        self.deps
            .notify(StatusEvent::worker(ROUTER_ID, session_id, status, message));
    }
}

/// `name: output excerpt` per result, one per line.
fn aggregate(results: &[WorkerResult]) -> String {
    results
        .iter()
        .map(|r| format!("{}: {}", r.worker_name, truncate(&r.output, AGGREGATE_EXCERPT)))
        .collect::<Vec<_>>()
        .join("\n")
}
