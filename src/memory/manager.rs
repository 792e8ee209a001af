//! Per-worker, per-session memory.
//!
//! A `MemoryManager` is created for every (worker, session) pair. At the start
//! of a run it builds the context block injected into the worker's system
//! prompt; during the run it appends observations; at the end it compresses
//! the session into a single durable summary.
//!
//! Without a store (degraded mode) every operation is a no-op: context is
//! empty, records are dropped, searches return nothing.

use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::error::DatabaseError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::store::{Database, NewObservation, Observation, ObservationKind, SEARCH_LIMIT, Summary};
use crate::util::truncate;

/// Excerpt of the tool input embedded in a tool_call observation's content.
pub const TOOL_INPUT_EXCERPT: usize = 300;
/// Excerpt of the tool output embedded in a tool_call observation's content.
pub const TOOL_OUTPUT_EXCERPT: usize = 500;
/// Cap for the stored tool_input / tool_output columns.
pub const TOOL_FIELD_LIMIT: usize = 4000;
/// Cap for the stored tool_name column.
pub const TOOL_NAME_LIMIT: usize = 100;
/// Cap for any observation's free-text content.
pub const CONTENT_LIMIT: usize = 2000;
/// How much of the final result the compressor sees.
pub const COMPRESS_RESULT_EXCERPT: usize = 1000;
/// Cap for a stored summary.
pub const SUMMARY_LIMIT: usize = 2000;

/// Memory scoped to one worker's one session.
#[derive(Clone)]
pub struct MemoryManager {
    worker_id: String,
    session_id: String,
    store: Option<Arc<dyn Database>>,
    llm: Arc<dyn LlmProvider>,
    config: MemoryConfig,
}

impl MemoryManager {
    pub fn new(
        worker_id: impl Into<String>,
        session_id: impl Into<String>,
        store: Option<Arc<dyn Database>>,
        llm: Arc<dyn LlmProvider>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            session_id: session_id.into(),
            store,
            llm,
            config,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether a store is attached.
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    // ── Context injection ───────────────────────────────────────────

    /// Build the block appended to a worker's persona prompt.
    ///
    /// Shared facts come first, then up to `summary_limit` of this worker's
    /// summaries, newest first, labelled `[Session 1]`, `[Session 2]`, ...
    /// Sections with nothing in them are left out entirely.
    pub async fn build_context(&self) -> Result<String, DatabaseError> {
        let Some(store) = &self.store else {
            return Ok(String::new());
        };

        let facts = store.list_shared_facts().await?;
        let summaries = store
            .recent_summaries(&self.worker_id, self.config.summary_limit)
            .await?;

        let mut context = String::new();

        if !facts.is_empty() {
            context.push_str("\n<shared_memory>\n");
            for fact in &facts {
                context.push_str(&format!("  {}: {}\n", fact.key, fact.value));
            }
            context.push_str("</shared_memory>\n");
        }

        if !summaries.is_empty() {
            context.push_str("\n<your_memory>\n");
            context.push_str(
                "The following are compressed summaries of your previous work sessions.\n\
                 Use these to maintain continuity and avoid repeating mistakes.\n\n",
            );
            for (i, summary) in summaries.iter().enumerate() {
                context.push_str(&format!("[Session {}]\n{}\n\n", i + 1, summary.summary));
            }
            context.push_str("</your_memory>\n");
        }

        Ok(context)
    }

    // ── Observation recording ───────────────────────────────────────

    /// Record a tool invocation. Input and output are JSON-encoded and
    /// truncated before they are stored.
    pub async fn record_tool_call(
        &self,
        tool_name: &str,
        input: &serde_json::Value,
        output: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        let tool_name = truncate(tool_name, TOOL_NAME_LIMIT);
        let input_json = input.to_string();
        let output_json = output.to_string();
        let content = format!(
            "Used tool \"{tool_name}\". Input: {}. Output: {}",
            truncate(&input_json, TOOL_INPUT_EXCERPT),
            truncate(&output_json, TOOL_OUTPUT_EXCERPT),
        );

        let obs = self.observation(ObservationKind::ToolCall, &content).with_tool(
            tool_name,
            truncate(&input_json, TOOL_FIELD_LIMIT),
            truncate(&output_json, TOOL_FIELD_LIMIT),
        );
        self.append(obs).await
    }

    pub async fn record_decision(&self, content: &str) -> Result<(), DatabaseError> {
        self.append(self.observation(ObservationKind::Decision, content))
            .await
    }

    pub async fn record_result(&self, content: &str) -> Result<(), DatabaseError> {
        self.append(self.observation(ObservationKind::Result, content))
            .await
    }

    pub async fn record_error(&self, content: &str) -> Result<(), DatabaseError> {
        self.append(self.observation(ObservationKind::Error, content))
            .await
    }

    fn observation(&self, kind: ObservationKind, content: &str) -> NewObservation {
        NewObservation::new(
            &self.session_id,
            &self.worker_id,
            kind,
            truncate(content, CONTENT_LIMIT),
        )
    }

    async fn append(&self, obs: NewObservation) -> Result<(), DatabaseError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let id = store.insert_observation(&obs).await?;
        debug!(
            worker_id = %self.worker_id,
            session_id = %self.session_id,
            kind = %obs.kind,
            id,
            "Observation recorded"
        );
        Ok(())
    }

    // ── Search ──────────────────────────────────────────────────────

    /// Full-text search over this worker's own observations.
    pub async fn search(&self, query: &str) -> Result<Vec<Observation>, DatabaseError> {
        match &self.store {
            Some(store) => {
                store
                    .search_observations(&self.worker_id, query, SEARCH_LIMIT)
                    .await
            }
            None => Ok(Vec::new()),
        }
    }

    /// Full-text search over this worker's summaries.
    pub async fn search_summaries(&self, query: &str) -> Result<Vec<Summary>, DatabaseError> {
        match &self.store {
            Some(store) => {
                store
                    .search_summaries(&self.worker_id, query, SEARCH_LIMIT)
                    .await
            }
            None => Ok(Vec::new()),
        }
    }

    // ── Compression ─────────────────────────────────────────────────

    /// Compress this session into a summary. Never fails; problems are logged.
    pub async fn compress(&self, task: &str, final_result: &str) {
        let Some(store) = &self.store else {
            return;
        };

        if let Err(e) = self.try_compress(store.as_ref(), task, final_result).await {
            warn!(
                worker_id = %self.worker_id,
                session_id = %self.session_id,
                error = %e,
                "Memory compression failed"
            );
        }
    }

    /// Spawn [`compress`](Self::compress) on `tracker` without waiting for it.
    pub fn compress_in_background(&self, tracker: &TaskTracker, task: String, final_result: String) {
        if !self.is_enabled() {
            return;
        }
        let memory = self.clone();
        tracker.spawn(async move {
            memory.compress(&task, &final_result).await;
        });
    }

    async fn try_compress(
        &self,
        store: &dyn Database,
        task: &str,
        final_result: &str,
    ) -> Result<(), crate::error::Error> {
        let previous = store.recent_summaries(&self.worker_id, 1).await?;
        let prompt = compression_prompt(
            &self.worker_id,
            task,
            final_result,
            previous.first().map(|s| s.summary.as_str()),
        );

        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)])
            .with_max_tokens(self.config.compress_max_tokens)
            .with_temperature(self.config.compress_temperature);
        let response = self.llm.complete(request).await?;

        let summary = response.content.trim();
        if summary.is_empty() {
            warn!(worker_id = %self.worker_id, "Compression returned empty summary, skipping");
            return Ok(());
        }

        let inserted = store
            .insert_summary(
                &self.worker_id,
                &self.session_id,
                truncate(summary, SUMMARY_LIMIT),
                volume_saved(final_result, self.config.compress_max_tokens),
            )
            .await?;

        if inserted {
            info!(
                worker_id = %self.worker_id,
                session_id = %self.session_id,
                "Compressed session into memory"
            );
        }
        Ok(())
    }

    // ── Shared facts ────────────────────────────────────────────────

    /// Write a fact visible to every worker, tagged with this worker's id.
    pub async fn set_shared(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        match &self.store {
            Some(store) => store.set_shared_fact(key, value, &self.worker_id).await,
            None => Ok(()),
        }
    }

    pub async fn get_shared(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        match &self.store {
            Some(store) => Ok(store.get_shared_fact(key).await?.map(|f| f.value)),
            None => Ok(None),
        }
    }
}

/// Rough token count the summary displaces: chars / 4 minus the summary budget.
fn volume_saved(final_result: &str, summary_tokens: u32) -> i64 {
    let approx_tokens = (final_result.chars().count() / 4) as i64;
    (approx_tokens - i64::from(summary_tokens)).max(0)
}

fn compression_prompt(
    worker_id: &str,
    task: &str,
    final_result: &str,
    previous: Option<&str>,
) -> String {
    let continuity = previous
        .map(|p| format!("Previous context:\n{p}\n"))
        .unwrap_or_default();

    format!(
        "You are a memory compression assistant. Compress the following work session into a \
         concise summary (max 200 words) that will help the worker remember what happened and \
         what was learned.\n\n\
         Worker: {worker_id}\n\
         Task: {task}\n\
         Result: {result}\n\n\
         {continuity}\n\
         Write a third-person summary covering:\n\
         1. What the task was\n\
         2. Key steps taken or tools used\n\
         3. The outcome\n\
         4. Any important facts learned (URLs, file paths, decisions made)\n\
         5. Any errors or issues encountered\n\n\
         Be specific and factual. Avoid filler words.",
        result = truncate(final_result, COMPRESS_RESULT_EXCERPT),
    )
}
