//! Unified `Database` trait: a single async interface for office persistence.
//!
//! Sessions, the append-only observation log, per-worker summaries and the
//! shared fact table all live behind this trait so the router and memory
//! manager never touch SQL directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

/// How many summaries the memory viewer returns.
pub const VIEW_SUMMARY_LIMIT: usize = 20;
/// How many observations the memory viewer returns.
pub const VIEW_OBSERVATION_LIMIT: usize = 50;
/// How many sessions the history viewer returns.
pub const HISTORY_LIMIT: usize = 50;
/// Maximum hits for a full-text search.
pub const SEARCH_LIMIT: usize = 5;

/// Lifecycle of a job session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, routing not yet decided.
    Pending,
    /// Plan persisted, workers dispatched.
    Running,
    /// Finished (including clarification replies).
    Done,
    /// Aborted by an unrecoverable internal error.
    Failed,
}

impl SessionStatus {
    /// Status only ever moves forward.
    pub fn can_transition_to(&self, target: SessionStatus) -> bool {
        use SessionStatus::*;

        matches!(
            (self, target),
            (Pending, Running) | (Pending, Failed) | (Running, Done) | (Running, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// States from which `target` is reachable in one step.
    pub fn predecessors(target: SessionStatus) -> &'static [SessionStatus] {
        use SessionStatus::*;

        match target {
            Pending => &[],
            Running => &[Pending],
            Done => &[Running],
            Failed => &[Pending, Running],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One submitted job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub job: String,
    /// Serialized routing plan, once decided.
    pub plan: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Kind of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    ToolCall,
    Decision,
    Result,
    Error,
}

impl ObservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolCall => "tool_call",
            Self::Decision => "decision",
            Self::Result => "result",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tool_call" => Some(Self::ToolCall),
            "decision" => Some(Self::Decision),
            "result" => Some(Self::Result),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An observation about to be appended.
#[derive(Debug, Clone)]
pub struct NewObservation {
    pub session_id: String,
    pub worker_id: String,
    pub kind: ObservationKind,
    pub content: String,
    pub tool_name: Option<String>,
    pub tool_input: Option<String>,
    pub tool_output: Option<String>,
}

impl NewObservation {
    pub fn new(
        session_id: impl Into<String>,
        worker_id: impl Into<String>,
        kind: ObservationKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            worker_id: worker_id.into(),
            kind,
            content: content.into(),
            tool_name: None,
            tool_input: None,
            tool_output: None,
        }
    }

    pub fn with_tool(
        mut self,
        name: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.tool_name = Some(name.into());
        self.tool_input = Some(input.into());
        self.tool_output = Some(output.into());
        self
    }
}

/// A persisted observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: i64,
    pub session_id: String,
    pub worker_id: String,
    pub kind: ObservationKind,
    pub content: String,
    pub tool_name: Option<String>,
    pub tool_input: Option<String>,
    pub tool_output: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A compressed account of one worker's session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: i64,
    pub worker_id: String,
    pub session_id: String,
    pub summary: String,
    /// Advisory estimate of context volume displaced (approximate tokens).
    pub volume_saved: i64,
    pub created_at: DateTime<Utc>,
}

/// A cross-worker key/value fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedFact {
    pub key: String,
    pub value: String,
    pub source_worker: String,
    pub updated_at: DateTime<Utc>,
}

/// A session plus how many observations it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHistoryEntry {
    #[serde(flatten)]
    pub session: Session,
    pub observation_count: i64,
}

/// Read-only snapshot of one worker's memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerMemoryView {
    pub summaries: Vec<Summary>,
    pub observations: Vec<Observation>,
    pub shared_facts: Vec<SharedFact>,
}

/// Backend-agnostic persistence for sessions, observations, summaries and facts.
#[async_trait]
pub trait Database: Send + Sync {
    /// Apply pragmas and run pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Sessions ────────────────────────────────────────────────────

    /// Create a new session in `pending` state.
    async fn create_session(&self, job: &str) -> Result<Session, DatabaseError>;

    async fn get_session(&self, id: &str) -> Result<Option<Session>, DatabaseError>;

    /// Persist the serialized routing plan.
    async fn set_session_plan(&self, id: &str, plan: &str) -> Result<(), DatabaseError>;

    /// Move a session forward. Backward or repeated transitions are rejected
    /// with `DatabaseError::Constraint`. Terminal states stamp `finished_at`.
    async fn update_session_status(
        &self,
        id: &str,
        status: SessionStatus,
    ) -> Result<(), DatabaseError>;

    /// Most recent sessions with observation counts.
    async fn session_history(&self, limit: usize)
    -> Result<Vec<SessionHistoryEntry>, DatabaseError>;

    // ── Observations ────────────────────────────────────────────────

    /// Append one observation; it is searchable as soon as this returns.
    async fn insert_observation(&self, obs: &NewObservation) -> Result<i64, DatabaseError>;

    async fn recent_observations(
        &self,
        worker_id: &str,
        limit: usize,
    ) -> Result<Vec<Observation>, DatabaseError>;

    async fn session_observations(
        &self,
        session_id: &str,
    ) -> Result<Vec<Observation>, DatabaseError>;

    /// Full-text search over one worker's observations, best match first.
    async fn search_observations(
        &self,
        worker_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Observation>, DatabaseError>;

    // ── Summaries ───────────────────────────────────────────────────

    /// Insert a summary. Returns `false` if one already exists for
    /// (worker, session); the existing row is left untouched.
    async fn insert_summary(
        &self,
        worker_id: &str,
        session_id: &str,
        summary: &str,
        volume_saved: i64,
    ) -> Result<bool, DatabaseError>;

    /// Newest first.
    async fn recent_summaries(
        &self,
        worker_id: &str,
        limit: usize,
    ) -> Result<Vec<Summary>, DatabaseError>;

    async fn search_summaries(
        &self,
        worker_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Summary>, DatabaseError>;

    // ── Shared facts ────────────────────────────────────────────────

    /// Upsert a fact. Last write wins.
    async fn set_shared_fact(
        &self,
        key: &str,
        value: &str,
        source_worker: &str,
    ) -> Result<(), DatabaseError>;

    async fn get_shared_fact(&self, key: &str) -> Result<Option<SharedFact>, DatabaseError>;

    async fn list_shared_facts(&self) -> Result<Vec<SharedFact>, DatabaseError>;

    // ── Viewer ──────────────────────────────────────────────────────

    /// Recent summaries, recent observations and every shared fact.
    async fn worker_memory(&self, worker_id: &str) -> Result<WorkerMemoryView, DatabaseError> {
        Ok(WorkerMemoryView {
            summaries: self.recent_summaries(worker_id, VIEW_SUMMARY_LIMIT).await?,
            observations: self
                .recent_observations(worker_id, VIEW_OBSERVATION_LIMIT)
                .await?,
            shared_facts: self.list_shared_facts().await?,
        })
    }
}
