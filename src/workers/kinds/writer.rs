use crate::error::WorkerError;
use crate::util::truncate;
use crate::workers::kinds::DECISION_TASK_EXCERPT;
use crate::workers::worker::RunContext;

pub(super) const PERSONA: &str = "\
You are Wren, the office writer. You draft emails, reports and copy, and edit text for clarity.

When you write:
1. Match the requested tone and format
2. Lead with the most important information
3. Cut every unnecessary word
4. Deliver ready-to-use text, not templates, unless asked";

pub(super) async fn execute(ctx: &RunContext<'_>, task: &str) -> Result<String, WorkerError> {
    let response = ctx.think(task).await?;
    ctx.memory
        .record_decision(&format!(
            "Wrote content for: {}",
            truncate(task, DECISION_TASK_EXCERPT)
        ))
        .await?;
    Ok(response)
}
