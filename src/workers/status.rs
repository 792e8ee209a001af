//! Worker lifecycle signals.
//!
//! Workers and the router report lifecycle changes to an optional
//! [`StatusObserver`]. Nothing in the orchestration path reads these back, so
//! running with no observer attached is always valid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::store::SessionStatus;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// The five-state worker lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Thinking,
    Working,
    Done,
    Error,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Thinking => "thinking",
            Self::Working => "working",
            Self::Done => "done",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Events pushed to status subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEvent {
    /// A worker (or the router) changed lifecycle state.
    Worker {
        worker_id: String,
        session_id: String,
        status: WorkerStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        at: DateTime<Utc>,
    },
    /// A session changed status.
    Session {
        session_id: String,
        status: SessionStatus,
        at: DateTime<Utc>,
    },
}

impl StatusEvent {
    pub fn worker(
        worker_id: impl Into<String>,
        session_id: impl Into<String>,
        status: WorkerStatus,
        message: Option<String>,
    ) -> Self {
        Self::Worker {
            worker_id: worker_id.into(),
            session_id: session_id.into(),
            status,
            message,
            at: Utc::now(),
        }
    }

    pub fn session(session_id: impl Into<String>, status: SessionStatus) -> Self {
        Self::Session {
            session_id: session_id.into(),
            status,
            at: Utc::now(),
        }
    }
}

/// Receives lifecycle events. Must not block.
pub trait StatusObserver: Send + Sync {
    fn notify(&self, event: StatusEvent);
}

/// Fans events out to any number of subscribers (the WebSocket viewer).
pub struct BroadcastObserver {
    tx: broadcast::Sender<StatusEvent>,
}

impl BroadcastObserver {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusObserver for BroadcastObserver {
    fn notify(&self, event: StatusEvent) {
        // No subscribers is the normal headless case.
        let _ = self.tx.send(event);
    }
}
