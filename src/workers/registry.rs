//! Id-keyed lookup of the worker roster.

use std::collections::HashMap;
use std::sync::Arc;

use crate::workers::kinds::{WorkerKind, WorkerProfile};
use crate::workers::worker::{Worker, WorkerDeps};

/// Registered workers, keyed by id.
pub struct WorkerRegistry {
    workers: HashMap<&'static str, Arc<Worker>>,
}

impl WorkerRegistry {
    pub fn empty() -> Self {
        Self {
            workers: HashMap::new(),
        }
    }

    /// Every [`WorkerKind`], sharing one set of dependencies.
    pub fn with_all(deps: WorkerDeps) -> Self {
        let mut registry = Self::empty();
        for kind in WorkerKind::ALL {
            registry.register(Worker::new(kind, deps.clone()));
        }
        tracing::info!(
            count = registry.workers.len(),
            ids = %registry.ids().join(", "),
            "Loaded workers"
        );
        registry
    }

    pub fn register(&mut self, worker: Worker) {
        self.workers.insert(worker.id(), Arc::new(worker));
    }

    pub fn get(&self, id: &str) -> Option<Arc<Worker>> {
        self.workers.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.workers.contains_key(id)
    }

    /// Ids in roster order.
    pub fn ids(&self) -> Vec<&'static str> {
        WorkerKind::ALL
            .iter()
            .map(|k| k.id())
            .filter(|id| self.workers.contains_key(id))
            .collect()
    }

    pub fn profiles(&self) -> Vec<WorkerProfile> {
        WorkerKind::ALL
            .iter()
            .filter(|k| self.workers.contains_key(k.id()))
            .map(|k| k.profile())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::config::MemoryConfig;
    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::tools::ToolRegistry;

    struct NoLlm;

    #[async_trait]
    impl LlmProvider for NoLlm {
        fn model_name(&self) -> &str {
            "none"
        }
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            unimplemented!("not used in registry tests")
        }
    }

    fn deps() -> WorkerDeps {
        WorkerDeps::new(
            None,
            Arc::new(NoLlm),
            Arc::new(ToolRegistry::new()),
            MemoryConfig::default(),
        )
    }

    #[test]
    fn full_roster() {
        let registry = WorkerRegistry::with_all(deps());
        assert_eq!(registry.len(), 5);
        assert_eq!(
            registry.ids(),
            vec!["researcher", "developer", "writer", "analyst", "assistant"]
        );
        assert_eq!(registry.get("analyst").unwrap().name(), "Ada");
        assert!(registry.get("reseacher").is_none());
    }

    #[test]
    fn partial_roster() {
        let mut registry = WorkerRegistry::empty();
        assert!(registry.is_empty());
        registry.register(Worker::new(WorkerKind::Writer, deps()));
        assert!(registry.contains("writer"));
        assert!(!registry.contains("developer"));
        assert_eq!(registry.profiles().len(), 1);
        assert_eq!(registry.profiles()[0].role, "Writer");
    }
}
