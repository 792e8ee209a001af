//! Per-task worker execution.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::config::MemoryConfig;
use crate::error::WorkerError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::memory::MemoryManager;
use crate::store::Database;
use crate::tools::ToolRegistry;
use crate::util::truncate;
use crate::workers::kinds::WorkerKind;
use crate::workers::status::{StatusEvent, StatusObserver, WorkerStatus};

/// Task excerpt kept in the "Starting task" decision.
const START_TASK_EXCERPT: usize = 500;
/// Output excerpt kept in the result observation.
const RESULT_EXCERPT: usize = 1000;
/// Output excerpt attached to the `done` status event.
const STATUS_EXCERPT: usize = 100;

/// Shared dependencies for worker execution.
#[derive(Clone)]
pub struct WorkerDeps {
    pub store: Option<Arc<dyn Database>>,
    pub llm: Arc<dyn LlmProvider>,
    pub tools: Arc<ToolRegistry>,
    pub memory: MemoryConfig,
    /// Tracks background compression so shutdown can drain it.
    pub tracker: TaskTracker,
    pub observer: Option<Arc<dyn StatusObserver>>,
}

impl WorkerDeps {
    pub fn new(
        store: Option<Arc<dyn Database>>,
        llm: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        memory: MemoryConfig,
    ) -> Self {
        Self {
            store,
            llm,
            tools,
            memory,
            tracker: TaskTracker::new(),
            observer: None,
        }
    }

    pub fn with_tracker(mut self, tracker: TaskTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StatusObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Memory scoped to `worker_id` within `session_id`.
    pub fn memory_for(&self, worker_id: &str, session_id: &str) -> MemoryManager {
        MemoryManager::new(
            worker_id,
            session_id,
            self.store.clone(),
            Arc::clone(&self.llm),
            self.memory.clone(),
        )
    }

    pub(crate) fn notify(&self, event: StatusEvent) {
        if let Some(observer) = &self.observer {
            observer.notify(event);
        }
    }
}

/// Outcome of one worker run. Failures are carried inline, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResult {
    pub worker_id: String,
    pub worker_name: String,
    pub output: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerResult {
    pub fn success(worker_id: impl Into<String>, worker_name: impl Into<String>, output: String) -> Self {
        Self {
            worker_id: worker_id.into(),
            worker_name: worker_name.into(),
            output,
            success: true,
            error: None,
        }
    }

    pub fn failure(
        worker_id: impl Into<String>,
        worker_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            worker_name: worker_name.into(),
            output: String::new(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// What a worker kind sees while it executes.
pub struct RunContext<'a> {
    pub memory: &'a MemoryManager,
    pub llm: &'a dyn LlmProvider,
    pub tools: &'a ToolRegistry,
    pub system_prompt: &'a str,
    pub temperature: f32,
}

impl RunContext<'_> {
    /// One completion with the worker's system prompt and temperature.
    pub async fn think(&self, prompt: impl Into<String>) -> Result<String, WorkerError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(self.system_prompt),
            ChatMessage::user(prompt),
        ])
        .with_temperature(self.temperature);
        Ok(self.llm.complete(request).await?.content)
    }

    /// Invoke a registered tool; the call is recorded on success.
    pub async fn call_tool(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, WorkerError> {
        self.tools.invoke(self.memory, name, params).await
    }
}

/// A specialist worker: one kind plus the shared dependencies.
pub struct Worker {
    kind: WorkerKind,
    deps: WorkerDeps,
}

impl Worker {
    pub fn new(kind: WorkerKind, deps: WorkerDeps) -> Self {
        Self { kind, deps }
    }

    pub fn id(&self) -> &'static str {
        self.kind.id()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    /// Run `task` within `session_id`. Never fails: errors come back as a
    /// failed [`WorkerResult`] with exactly one error observation recorded.
    pub async fn run(&self, task: &str, session_id: &str) -> WorkerResult {
        let memory = self.deps.memory_for(self.id(), session_id);
        self.status(session_id, WorkerStatus::Thinking, None);

        match self.execute(&memory, task).await {
            Ok(output) => {
                memory.compress_in_background(&self.deps.tracker, task.to_string(), output.clone());
                info!(
                    worker_id = self.id(),
                    session_id,
                    output_len = output.len(),
                    "Worker finished"
                );
                self.status(
                    session_id,
                    WorkerStatus::Done,
                    Some(truncate(&output, STATUS_EXCERPT).to_string()),
                );
                WorkerResult::success(self.id(), self.name(), output)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(worker_id = self.id(), session_id, error = %message, "Worker failed");
                if let Err(db) = memory.record_error(&message).await {
                    warn!(worker_id = self.id(), error = %db, "Failed to record worker error");
                }
                self.status(session_id, WorkerStatus::Error, Some(message.clone()));
                WorkerResult::failure(self.id(), self.name(), message)
            }
        }
    }

    async fn execute(&self, memory: &MemoryManager, task: &str) -> Result<String, WorkerError> {
        let context = memory.build_context().await?;
        let system_prompt = format!("{}\n{}", self.kind.persona(), context);

        memory
            .record_decision(&format!(
                "Starting task: {}",
                truncate(task, START_TASK_EXCERPT)
            ))
            .await?;

        self.status(memory.session_id(), WorkerStatus::Working, None);

        let ctx = RunContext {
            memory,
            llm: self.deps.llm.as_ref(),
            tools: self.deps.tools.as_ref(),
            system_prompt: &system_prompt,
            temperature: self.kind.temperature(),
        };
        let output = self.kind.execute(&ctx, task).await?;

        memory
            .record_result(truncate(&output, RESULT_EXCERPT))
            .await?;
        Ok(output)
    }

    fn status(&self, session_id: &str, status: WorkerStatus, message: Option<String>) {
        self.deps
            .notify(StatusEvent::worker(self.id(), session_id, status, message));
    }
}
