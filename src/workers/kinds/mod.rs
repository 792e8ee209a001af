//! The fixed roster of specialist kinds.

mod analyst;
mod assistant;
mod developer;
mod researcher;
mod writer;

use serde::Serialize;

use crate::error::WorkerError;
use crate::workers::worker::RunContext;

/// Excerpt of the task used in per-kind decision observations.
pub(crate) const DECISION_TASK_EXCERPT: usize = 100;

/// A specialist kind. Closed set; each maps to one `execute` routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    Researcher,
    Developer,
    Writer,
    Analyst,
    Assistant,
}

impl WorkerKind {
    pub const ALL: [WorkerKind; 5] = [
        Self::Researcher,
        Self::Developer,
        Self::Writer,
        Self::Analyst,
        Self::Assistant,
    ];

    /// Stable id used in plans, observations and summaries.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Researcher => "researcher",
            Self::Developer => "developer",
            Self::Writer => "writer",
            Self::Analyst => "analyst",
            Self::Assistant => "assistant",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Researcher => "Rowan",
            Self::Developer => "Dev",
            Self::Writer => "Wren",
            Self::Analyst => "Ada",
            Self::Assistant => "Aria",
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::Researcher => "Researcher",
            Self::Developer => "Developer",
            Self::Writer => "Writer",
            Self::Analyst => "Analyst",
            Self::Assistant => "Assistant",
        }
    }

    /// One line for the router's roster listing.
    pub fn specialty(&self) -> &'static str {
        match self {
            Self::Researcher => "research, fact-finding, web search, briefings",
            Self::Developer => "writing and debugging code, scripts, running commands",
            Self::Writer => "emails, reports, copywriting, editing",
            Self::Analyst => "data analysis, CSV/JSON files, calculations",
            Self::Assistant => "integrations, scheduling, reminders, GitHub",
        }
    }

    pub fn persona(&self) -> &'static str {
        match self {
            Self::Researcher => researcher::PERSONA,
            Self::Developer => developer::PERSONA,
            Self::Writer => writer::PERSONA,
            Self::Analyst => analyst::PERSONA,
            Self::Assistant => assistant::PERSONA,
        }
    }

    pub fn temperature(&self) -> f32 {
        match self {
            Self::Researcher => 0.6,
            Self::Developer => 0.4,
            Self::Writer => 0.75,
            Self::Analyst => 0.3,
            Self::Assistant => 0.5,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    pub(crate) async fn execute(
        &self,
        ctx: &RunContext<'_>,
        task: &str,
    ) -> Result<String, WorkerError> {
        match self {
            Self::Researcher => researcher::execute(ctx, task).await,
            Self::Developer => developer::execute(ctx, task).await,
            Self::Writer => writer::execute(ctx, task).await,
            Self::Analyst => analyst::execute(ctx, task).await,
            Self::Assistant => assistant::execute(ctx, task).await,
        }
    }

    pub fn profile(&self) -> WorkerProfile {
        WorkerProfile {
            id: self.id(),
            name: self.name(),
            role: self.role(),
            specialty: self.specialty(),
        }
    }
}

impl std::fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Public description of a worker, as listed by the viewer API.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub role: &'static str,
    pub specialty: &'static str,
}
