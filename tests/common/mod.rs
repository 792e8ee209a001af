//! Shared fixtures: a scripted LLM, stub tools and an in-memory office.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use agent_office::config::MemoryConfig;
use agent_office::error::{LlmError, ToolError};
use agent_office::llm::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use agent_office::router::Router;
use agent_office::store::{Database, LibSqlBackend};
use agent_office::tools::{Tool, ToolRegistry};
use agent_office::workers::{StatusObserver, WorkerDeps, WorkerRegistry};

/// Maximum time any test is allowed to run before we consider it hung.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const ROUTER_PROMPT_PREFIX: &str = "You are the office router";
const COMPRESSION_PROMPT_PREFIX: &str = "You are a memory compression assistant";

/// One request seen by the stub.
#[derive(Debug, Clone)]
pub struct Call {
    pub system: Option<String>,
    pub user: String,
}

/// Answers routing calls with a scripted plan, compression calls with a
/// deterministic summary, and worker calls with `done: <first line>`.
pub struct ScriptedLlm {
    plan: Mutex<Option<String>>,
    delays: Vec<(String, Duration)>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedLlm {
    pub fn new(plan: &str) -> Self {
        Self {
            plan: Mutex::new(Some(plan.to_string())),
            delays: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Routing calls fail outright.
    pub fn offline_router() -> Self {
        Self {
            plan: Mutex::new(None),
            delays: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Worker calls whose prompt contains `needle` sleep for `delay` first.
    pub fn with_delay(mut self, needle: &str, delay: Duration) -> Self {
        self.delays.push((needle.to_string(), delay));
        self
    }

    pub fn set_plan(&self, plan: &str) {
        *self.plan.lock().unwrap() = Some(plan.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// User prompts of worker calls (not routing, not compression).
    pub fn worker_prompts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                !c.system
                    .as_deref()
                    .unwrap_or_default()
                    .starts_with(ROUTER_PROMPT_PREFIX)
                    && !c.user.starts_with(COMPRESSION_PROMPT_PREFIX)
            })
            .map(|c| c.user)
            .collect()
    }

    pub fn routing_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| {
                c.system
                    .as_deref()
                    .is_some_and(|s| s.starts_with(ROUTER_PROMPT_PREFIX))
            })
            .count()
    }
}

fn reply(content: String) -> CompletionResponse {
    CompletionResponse {
        content,
        input_tokens: 0,
        output_tokens: 0,
        finish_reason: FinishReason::Stop,
        response_id: None,
    }
}

/// Value of the `<label>: ` line in a compression prompt.
fn field<'a>(prompt: &'a str, label: &str) -> &'a str {
    prompt
        .lines()
        .find_map(|l| l.strip_prefix(label))
        .unwrap_or_default()
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let system = request.system_prompt().map(str::to_string);
        let user = request.last_user_message().unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(Call {
            system: system.clone(),
            user: user.clone(),
        });

        if system
            .as_deref()
            .is_some_and(|s| s.starts_with(ROUTER_PROMPT_PREFIX))
        {
            let plan = self.plan.lock().unwrap().clone();
            return match plan {
                Some(plan) => Ok(reply(plan)),
                None => Err(LlmError::RequestFailed {
                    provider: "scripted".into(),
                    reason: "router offline".into(),
                }),
            };
        }

        if user.starts_with(COMPRESSION_PROMPT_PREFIX) {
            return Ok(reply(format!(
                "{} handled: {}",
                field(&user, "Worker: "),
                field(&user, "Task: ")
            )));
        }

        if let Some((_, delay)) = self.delays.iter().find(|(n, _)| user.contains(n.as_str())) {
            tokio::time::sleep(*delay).await;
        }
        let first_line = user.lines().next().unwrap_or_default();
        Ok(reply(format!("done: {first_line}")))
    }
}

/// `web_search` that never answers within its 20ms budget.
pub struct StuckSearch;

#[async_trait]
impl Tool for StuckSearch {
    fn name(&self) -> &str {
        "web_search"
    }
    fn description(&self) -> &str {
        "never answers"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _params: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(serde_json::Value::Null)
    }
    fn execution_timeout(&self) -> Duration {
        Duration::from_millis(20)
    }
}

/// `github_list_repos` returning two fixed repositories.
pub struct FakeGithub;

#[async_trait]
impl Tool for FakeGithub {
    fn name(&self) -> &str {
        "github_list_repos"
    }
    fn description(&self) -> &str {
        "fixed repo list"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _params: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        Ok(serde_json::json!({
            "count": 2,
            "repos": [
                {"full_name": "octo/alpha", "description": "First"},
                {"full_name": "octo/beta", "description": null}
            ]
        }))
    }
}

pub struct Office {
    pub router: Arc<Router>,
    pub store: Arc<dyn Database>,
    pub llm: Arc<ScriptedLlm>,
    pub tools: Arc<ToolRegistry>,
}

impl Office {
    /// Wait for background compression, then accept new tasks again.
    pub async fn drain(&self) {
        let tracker = self.router.tracker();
        tracker.close();
        tracker.wait().await;
        tracker.reopen();
    }
}

pub async fn office(llm: ScriptedLlm) -> Office {
    let store: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    office_with_store(llm, store, None).await
}

pub async fn office_with_store(
    llm: ScriptedLlm,
    store: Arc<dyn Database>,
    observer: Option<Arc<dyn StatusObserver>>,
) -> Office {
    let llm = Arc::new(llm);
    let tools = Arc::new(ToolRegistry::new());
    let mut deps = WorkerDeps::new(
        Some(Arc::clone(&store)),
        llm.clone(),
        Arc::clone(&tools),
        MemoryConfig::default(),
    );
    if let Some(observer) = observer {
        deps = deps.with_observer(observer);
    }
    let workers = Arc::new(WorkerRegistry::with_all(deps.clone()));
    let router = Arc::new(Router::new(workers, deps, "researcher"));
    Office {
        router,
        store,
        llm,
        tools,
    }
}

/// A sequential or parallel plan from `(worker_id, task)` pairs.
pub fn plan(parallel: bool, assignments: &[(&str, &str)]) -> String {
    let assignments: Vec<serde_json::Value> = assignments
        .iter()
        .map(|(worker, task)| {
            serde_json::json!({"workerId": worker, "task": task, "reason": "test"})
        })
        .collect();
    serde_json::json!({
        "needsClarification": false,
        "parallel": parallel,
        "assignments": assignments,
        "summary": "test plan",
    })
    .to_string()
}
