//! Tool registry and the runner that invokes tools on a worker's behalf.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{ToolError, WorkerError};
use crate::memory::MemoryManager;
use crate::tools::tool::Tool;

/// Registry of available tools, keyed by name.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool, replacing any existing tool with the same name.
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.write().await.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replaced existing tool registration");
        } else {
            tracing::debug!("Registered tool: {}", name);
        }
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    /// Sorted tool names.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Invoke `name` under its hard timeout and record the call.
    ///
    /// A successful call is recorded as one tool_call observation before this
    /// returns. Failures and timeouts are returned without recording anything;
    /// the worker records the single error observation for its run.
    pub async fn invoke(
        &self,
        memory: &MemoryManager,
        name: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, WorkerError> {
        let tool = self.get(name).await.ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
        })?;

        let timeout = tool.execution_timeout();
        let started = std::time::Instant::now();
        let output = match tokio::time::timeout(timeout, tool.execute(params.clone())).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    tool = %name,
                    worker_id = %memory.worker_id(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Tool timed out"
                );
                return Err(ToolError::Timeout {
                    name: name.to_string(),
                    timeout,
                }
                .into());
            }
        };

        tracing::debug!(
            tool = %name,
            worker_id = %memory.worker_id(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tool call finished"
        );

        memory.record_tool_call(name, &params, &output).await?;
        Ok(output)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::config::MemoryConfig;
    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::store::{Database, LibSqlBackend, ObservationKind};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the input back"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            Ok(serde_json::json!({ "echo": params }))
        }
    }

    struct SleepyTool;

    #[async_trait]
    impl Tool for SleepyTool {
        fn name(&self) -> &str {
            "sleepy"
        }
        fn description(&self) -> &str {
            "Never finishes in time"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _params: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(serde_json::Value::Null)
        }
        fn execution_timeout(&self) -> Duration {
            Duration::from_millis(20)
        }
    }

    struct NoLlm;

    #[async_trait]
    impl LlmProvider for NoLlm {
        fn model_name(&self) -> &str {
            "none"
        }
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            unimplemented!("not used in tool tests")
        }
    }

    async fn memory() -> (Arc<dyn Database>, MemoryManager) {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let session = db.create_session("job").await.unwrap();
        let memory = MemoryManager::new(
            "developer",
            session.id,
            Some(Arc::clone(&db)),
            Arc::new(NoLlm),
            MemoryConfig::default(),
        );
        (db, memory)
    }

    #[tokio::test]
    async fn register_get_and_list() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SleepyTool)).await;
        registry.register(Arc::new(EchoTool)).await;

        assert!(registry.has("echo").await);
        assert!(!registry.has("nonexistent").await);
        assert_eq!(registry.get("echo").await.unwrap().name(), "echo");
        assert_eq!(registry.list().await, vec!["echo", "sleepy"]);
    }

    #[tokio::test]
    async fn successful_call_records_one_observation() {
        let (db, memory) = memory().await;
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await;

        let out = registry
            .invoke(&memory, "echo", serde_json::json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(out["echo"]["x"], 1);

        let observations = db.session_observations(memory.session_id()).await.unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].kind, ObservationKind::ToolCall);
        assert_eq!(observations[0].tool_name.as_deref(), Some("echo"));
    }

    #[tokio::test]
    async fn timeout_is_an_error_and_records_nothing() {
        let (db, memory) = memory().await;
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SleepyTool)).await;

        let err = registry
            .invoke(&memory, "sleepy", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Tool(ToolError::Timeout { .. })));
        assert!(err.to_string().contains("timed out"));
        assert!(
            db.session_observations(memory.session_id())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let (_db, memory) = memory().await;
        let registry = ToolRegistry::new();
        let err = registry
            .invoke(&memory, "missing", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Tool(ToolError::NotFound { .. })));
    }
}
